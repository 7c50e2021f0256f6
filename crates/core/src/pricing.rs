//! Cart totals: subtotal, shipping and tax.
//!
//! Shipping is a flat rate waived above an optional threshold. Tax is a
//! percentage of the merchandise subtotal (shipping is not taxed), rounded to
//! cents with midpoints away from zero.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Store-wide pricing rules, read from settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRules {
    pub flat_shipping_rate: Decimal,
    /// Orders at or above this subtotal ship free.
    pub free_shipping_threshold: Option<Decimal>,
    /// Percentage, e.g. `8.25` for 8.25%.
    pub tax_rate_percent: Decimal,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            flat_shipping_rate: Decimal::new(500, 2),
            free_shipping_threshold: Some(Decimal::new(7500, 2)),
            tax_rate_percent: Decimal::ZERO,
        }
    }
}

impl PricingRules {
    /// Shipping charged for a given subtotal.
    #[must_use]
    pub fn shipping_for(&self, subtotal: Decimal, is_empty: bool) -> Decimal {
        if is_empty {
            return Decimal::ZERO;
        }
        match self.free_shipping_threshold {
            Some(threshold) if subtotal >= threshold => Decimal::ZERO,
            _ => self.flat_shipping_rate,
        }
    }

    /// Tax on a subtotal, rounded to cents.
    #[must_use]
    pub fn tax_for(&self, subtotal: Decimal) -> Decimal {
        (subtotal * self.tax_rate_percent / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Amount still needed to qualify for free shipping, if any.
    #[must_use]
    pub fn remaining_for_free_shipping(&self, subtotal: Decimal) -> Option<Decimal> {
        self.free_shipping_threshold
            .filter(|threshold| subtotal < *threshold)
            .map(|threshold| threshold - subtotal)
    }
}

/// Computed totals for a set of cart lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub item_count: u32,
}

impl CartTotals {
    /// Compute totals from `(unit_price, quantity)` pairs.
    ///
    /// ```
    /// use meridian_core::pricing::{CartTotals, PricingRules};
    /// use rust_decimal::Decimal;
    ///
    /// let rules = PricingRules {
    ///     flat_shipping_rate: Decimal::new(500, 2),
    ///     free_shipping_threshold: None,
    ///     tax_rate_percent: Decimal::new(10, 0),
    /// };
    /// let totals = CartTotals::compute([(Decimal::new(1000, 2), 2)], &rules);
    /// assert_eq!(totals.subtotal, Decimal::new(2000, 2));
    /// assert_eq!(totals.tax, Decimal::new(200, 2));
    /// assert_eq!(totals.total, Decimal::new(2700, 2));
    /// ```
    pub fn compute<I>(lines: I, rules: &PricingRules) -> Self
    where
        I: IntoIterator<Item = (Decimal, u32)>,
    {
        let (subtotal, item_count) = lines.into_iter().fold(
            (Decimal::ZERO, 0_u32),
            |(subtotal, count), (unit_price, quantity)| {
                (
                    subtotal + unit_price * Decimal::from(quantity),
                    count.saturating_add(quantity),
                )
            },
        );

        let shipping = rules.shipping_for(subtotal, item_count == 0);
        let tax = rules.tax_for(subtotal);

        Self {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
            item_count,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.item_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(threshold: Option<i64>, tax_percent: Decimal) -> PricingRules {
        PricingRules {
            flat_shipping_rate: Decimal::new(599, 2),
            free_shipping_threshold: threshold.map(|t| Decimal::new(t, 0)),
            tax_rate_percent: tax_percent,
        }
    }

    #[test]
    fn test_empty_cart_has_no_shipping() {
        let totals = CartTotals::compute(Vec::new(), &rules(None, Decimal::TEN));
        assert_eq!(totals, CartTotals::default());
        assert!(totals.is_empty());
    }

    #[test]
    fn test_total_is_sum_of_parts() {
        let lines = vec![(Decimal::new(1250, 2), 3), (Decimal::new(499, 2), 1)];
        let totals = CartTotals::compute(lines, &rules(None, Decimal::new(8, 0)));

        assert_eq!(totals.subtotal, Decimal::new(4249, 2));
        assert_eq!(totals.shipping, Decimal::new(599, 2));
        // 42.49 * 8% = 3.3992
        assert_eq!(totals.tax, Decimal::new(340, 2));
        assert_eq!(totals.total, totals.subtotal + totals.shipping + totals.tax);
        assert_eq!(totals.item_count, 4);
    }

    #[test]
    fn test_free_shipping_at_threshold() {
        let lines = vec![(Decimal::new(50, 0), 1)];
        let totals = CartTotals::compute(lines.clone(), &rules(Some(50), Decimal::ZERO));
        assert_eq!(totals.shipping, Decimal::ZERO);

        let totals = CartTotals::compute(lines, &rules(Some(51), Decimal::ZERO));
        assert_eq!(totals.shipping, Decimal::new(599, 2));
    }

    #[test]
    fn test_tax_rounds_midpoint_away_from_zero() {
        // 0.25 * 10% = 0.025 -> 0.03
        let totals = CartTotals::compute([(Decimal::new(25, 2), 1)], &rules(None, Decimal::TEN));
        assert_eq!(totals.tax, Decimal::new(3, 2));
    }

    #[test]
    fn test_remaining_for_free_shipping() {
        let r = rules(Some(75), Decimal::ZERO);
        assert_eq!(
            r.remaining_for_free_shipping(Decimal::new(60, 0)),
            Some(Decimal::new(15, 0))
        );
        assert_eq!(r.remaining_for_free_shipping(Decimal::new(80, 0)), None);
    }
}
