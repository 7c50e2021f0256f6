//! Integration tests for admin form validation feeding shared types.
//!
//! Settings saved in the back office drive storefront pricing, and product
//! forms produce the same repository input the catalog seeder writes.

#![allow(clippy::unwrap_used)]

use meridian_admin::forms::{CategoryForm, ProductForm, SettingsForm, SizeForm};
use meridian_core::pricing::CartTotals;
use meridian_core::{CurrencyCode, SizeId};
use rust_decimal::Decimal;

fn settings_form() -> SettingsForm {
    SettingsForm {
        store_name: " Meridian Supply ".to_string(),
        currency: "eur".to_string(),
        flat_shipping_rate: "4.90".to_string(),
        free_shipping_threshold: "60".to_string(),
        tax_rate_percent: "20".to_string(),
        promo_banner: String::new(),
        low_stock_threshold: "3".to_string(),
    }
}

#[test]
fn test_saved_settings_drive_cart_totals() {
    let settings = settings_form().validate().unwrap();
    assert_eq!(settings.store_name, "Meridian Supply");
    assert_eq!(settings.currency, CurrencyCode::EUR);
    assert_eq!(settings.promo_banner, None);

    let rules = settings.pricing_rules();
    let small = CartTotals::compute([(Decimal::new(2500, 2), 1)], &rules);
    assert_eq!(small.shipping, Decimal::new(490, 2));
    assert_eq!(small.tax, Decimal::new(500, 2));
    assert_eq!(small.total, Decimal::new(3490, 2));

    let large = CartTotals::compute([(Decimal::new(3000, 2), 2)], &rules);
    assert_eq!(large.shipping, Decimal::ZERO);
}

#[test]
fn test_settings_reject_out_of_range_tax() {
    let mut form = settings_form();
    form.tax_rate_percent = "120".to_string();
    form.currency = "JPY".to_string();

    let errors = form.validate().unwrap_err();
    assert!(errors.get("tax_rate_percent").is_some());
    assert!(errors.get("currency").is_some());
    assert!(errors.get("store_name").is_none());
}

#[test]
fn test_product_form_round_trips_through_body() {
    let form = ProductForm::from_body(
        b"name=Stoneware+Mug&slug=&sku=mug-1&description=++Glazed++&price=%2418.00\
          &compare_at_price=24&stock=40&category_id=2&is_featured=on\
          &subscription_price_id=&size_ids=5",
    );
    let (input, sizes) = form.validate().unwrap();

    assert_eq!(input.slug, "stoneware-mug");
    assert_eq!(input.sku, "MUG-1");
    assert_eq!(input.description, "Glazed");
    assert_eq!(input.price, Decimal::from(18));
    assert_eq!(input.compare_at_price, Some(Decimal::from(24)));
    assert_eq!(input.stock, 40);
    assert!(!input.is_active);
    assert!(input.is_featured);
    assert_eq!(input.subscription_price_id, None);
    assert_eq!(sizes, vec![SizeId::new(5)]);
}

#[test]
fn test_category_and_size_forms() {
    let category = CategoryForm {
        name: "Home Goods".to_string(),
        slug: String::new(),
        description: "Mugs and more".to_string(),
    }
    .validate()
    .unwrap();
    assert_eq!(category.slug, "home-goods");

    let (name, sort_order) = SizeForm {
        name: " XL ".to_string(),
        sort_order: String::new(),
    }
    .validate()
    .unwrap();
    assert_eq!((name.as_str(), sort_order), ("XL", 0));

    let errors = SizeForm {
        name: "XL".to_string(),
        sort_order: "first".to_string(),
    }
    .validate()
    .unwrap_err();
    assert_eq!(errors.summary(), "sort order: Enter a whole number.");
}
