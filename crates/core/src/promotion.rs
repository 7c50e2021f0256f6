//! Product badge heuristics.
//!
//! Badges are derived from catalog data at render time; nothing is stored.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

/// Products created within this many days get the "New" badge.
pub const NEW_PRODUCT_DAYS: i64 = 14;

/// Stock at or below this count shows "Only N left".
pub const LOW_STOCK_THRESHOLD: i32 = 5;

/// Discounts smaller than this percentage are not advertised.
pub const MIN_SALE_PERCENT: u32 = 5;

/// A promotional badge shown on product cards and detail pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Badge {
    Sale { percent_off: u32 },
    New,
    LowStock { remaining: i32 },
    SoldOut,
}

impl Badge {
    /// Text shown to shoppers.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Sale { percent_off } => format!("{percent_off}% off"),
            Self::New => "New".to_owned(),
            Self::LowStock { remaining } => format!("Only {remaining} left"),
            Self::SoldOut => "Sold out".to_owned(),
        }
    }

    /// CSS modifier class.
    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        match self {
            Self::Sale { .. } => "badge--sale",
            Self::New => "badge--new",
            Self::LowStock { .. } => "badge--low-stock",
            Self::SoldOut => "badge--sold-out",
        }
    }
}

/// The product fields badges are computed from.
#[derive(Debug, Clone, Copy)]
pub struct BadgeInput {
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
}

/// Whole-percent discount of `price` against `compare_at`, rounded down.
#[must_use]
pub fn percent_off(price: Decimal, compare_at: Decimal) -> Option<u32> {
    if compare_at <= Decimal::ZERO || price >= compare_at {
        return None;
    }
    ((compare_at - price) * Decimal::ONE_HUNDRED / compare_at)
        .floor()
        .to_u32()
}

/// Compute the badges for a product at time `now`.
#[must_use]
pub fn badges(input: &BadgeInput, now: DateTime<Utc>) -> Vec<Badge> {
    let mut badges = Vec::new();

    if let Some(percent) = input
        .compare_at_price
        .and_then(|compare_at| percent_off(input.price, compare_at))
        .filter(|p| *p >= MIN_SALE_PERCENT)
    {
        badges.push(Badge::Sale {
            percent_off: percent,
        });
    }

    let age = now.signed_duration_since(input.created_at);
    if age >= Duration::zero() && age <= Duration::days(NEW_PRODUCT_DAYS) {
        badges.push(Badge::New);
    }

    if input.stock <= 0 {
        badges.push(Badge::SoldOut);
    } else if input.stock <= LOW_STOCK_THRESHOLD {
        badges.push(Badge::LowStock {
            remaining: input.stock,
        });
    }

    badges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(price: i64, compare_at: Option<i64>, stock: i32, age_days: i64) -> (BadgeInput, DateTime<Utc>) {
        let now = Utc::now();
        (
            BadgeInput {
                price: Decimal::new(price, 2),
                compare_at_price: compare_at.map(|c| Decimal::new(c, 2)),
                stock,
                created_at: now - Duration::days(age_days),
            },
            now,
        )
    }

    #[test]
    fn test_sale_percent_rounds_down() {
        let (i, now) = input(6700, Some(10_000), 50, 30);
        assert_eq!(badges(&i, now), vec![Badge::Sale { percent_off: 33 }]);
    }

    #[test]
    fn test_small_discount_not_shown() {
        let (i, now) = input(9600, Some(10_000), 50, 30);
        assert!(badges(&i, now).is_empty());
    }

    #[test]
    fn test_compare_at_below_price_ignored() {
        let (i, now) = input(10_000, Some(9_000), 50, 30);
        assert!(badges(&i, now).is_empty());
    }

    #[test]
    fn test_new_within_fourteen_days() {
        let (i, now) = input(1000, None, 50, 3);
        assert_eq!(badges(&i, now), vec![Badge::New]);

        let (i, now) = input(1000, None, 50, 15);
        assert!(badges(&i, now).is_empty());
    }

    #[test]
    fn test_stock_badges() {
        let (i, now) = input(1000, None, 5, 30);
        assert_eq!(badges(&i, now), vec![Badge::LowStock { remaining: 5 }]);

        let (i, now) = input(1000, None, 0, 30);
        assert_eq!(badges(&i, now), vec![Badge::SoldOut]);

        let (i, now) = input(1000, None, 6, 30);
        assert!(badges(&i, now).is_empty());
    }

    #[test]
    fn test_labels() {
        assert_eq!(Badge::Sale { percent_off: 20 }.label(), "20% off");
        assert_eq!(Badge::LowStock { remaining: 2 }.label(), "Only 2 left");
    }
}
