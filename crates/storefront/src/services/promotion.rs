//! Promotional copy: product badges, the site banner and the free-shipping nudge.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use meridian_core::promotion;
use meridian_core::types::money::format_amount;
use meridian_db::StoreSettings;
use meridian_db::models::Product;

/// A badge ready for a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeView {
    pub label: String,
    pub css_class: &'static str,
}

/// Badges for a product at `now`.
#[must_use]
pub fn badges_for(product: &Product, now: DateTime<Utc>) -> Vec<BadgeView> {
    promotion::badges(&product.badge_input(), now)
        .iter()
        .map(|badge| BadgeView {
            label: badge.label(),
            css_class: badge.css_class(),
        })
        .collect()
}

/// Site-wide banner text, if one is set.
#[must_use]
pub fn promo_banner(settings: &StoreSettings) -> Option<String> {
    settings
        .promo_banner
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// "Spend $X more" message for the cart page.
#[must_use]
pub fn free_shipping_message(settings: &StoreSettings, subtotal: Decimal) -> Option<String> {
    if subtotal.is_zero() {
        return None;
    }
    settings
        .pricing_rules()
        .remaining_for_free_shipping(subtotal)
        .map(|remaining| {
            format!(
                "Add {} more for free shipping.",
                format_amount(remaining, settings.currency)
            )
        })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use meridian_core::{CategoryId, ProductId};

    use super::*;

    fn product(price: i64, compare_at: Option<i64>, stock: i32, age_days: i64) -> Product {
        let created = Utc::now() - Duration::days(age_days);
        Product {
            id: ProductId::new(1),
            category_id: CategoryId::new(1),
            name: "Rain Shell".to_string(),
            slug: "rain-shell".to_string(),
            sku: "RS-1".to_string(),
            description: String::new(),
            price: Decimal::new(price, 2),
            compare_at_price: compare_at.map(|c| Decimal::new(c, 2)),
            stock,
            image_path: None,
            is_active: true,
            is_featured: false,
            subscription_price_id: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_badges_for_sale_product() {
        let badges = badges_for(&product(7500, Some(10000), 50, 90), Utc::now());
        assert_eq!(
            badges,
            vec![BadgeView {
                label: "25% off".to_string(),
                css_class: "badge--sale",
            }]
        );
    }

    #[test]
    fn test_sold_out_badge() {
        let badges = badges_for(&product(1000, None, 0, 90), Utc::now());
        assert!(badges.iter().any(|b| b.label == "Sold out"));
    }

    #[test]
    fn test_promo_banner_blank_is_hidden() {
        let mut settings = StoreSettings {
            promo_banner: Some("   ".to_string()),
            ..StoreSettings::default()
        };
        assert_eq!(promo_banner(&settings), None);

        settings.promo_banner = Some(" Free returns all month ".to_string());
        assert_eq!(
            promo_banner(&settings).as_deref(),
            Some("Free returns all month")
        );
    }

    #[test]
    fn test_free_shipping_message() {
        let settings = StoreSettings {
            free_shipping_threshold: Some(Decimal::new(75, 0)),
            ..StoreSettings::default()
        };
        assert_eq!(
            free_shipping_message(&settings, Decimal::new(6000, 2)).as_deref(),
            Some("Add $15.00 more for free shipping.")
        );
        assert_eq!(free_shipping_message(&settings, Decimal::new(80, 0)), None);
        assert_eq!(free_shipping_message(&settings, Decimal::ZERO), None);
    }
}
