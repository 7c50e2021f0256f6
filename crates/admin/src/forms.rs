//! Form parsing and validation for the admin editors.
//!
//! Forms keep every submitted value as text so a failed submission can be
//! re-rendered exactly as typed, with messages keyed by field name.

use std::borrow::Cow;
use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Deserialize;

use meridian_core::slug::{is_valid_slug, slugify};
use meridian_core::{CategoryId, CurrencyCode, SizeId};
use meridian_db::models::{Category, Product, ProductInput, Size};
use meridian_db::{RepositoryError, StoreSettings};

const MAX_NAME_CHARS: usize = 200;
const MAX_BANNER_CHARS: usize = 280;

/// Largest stock change accepted in one adjustment, either way.
pub const MAX_STOCK_ADJUSTMENT: i32 = 1_000_000;

/// Validation messages keyed by form field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    /// Message for `field`, if it failed.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All messages on one line, for flash messages.
    #[must_use]
    pub fn summary(&self) -> String {
        self.0
            .iter()
            .map(|(field, msg)| format!("{}: {msg}", field.replace('_', " ")))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, Self> {
        if self.is_empty() { Ok(value()) } else { Err(self) }
    }

    /// Turn a unique-constraint conflict into a message on the offending
    /// field. Other errors are handed back.
    ///
    /// # Errors
    ///
    /// Returns `err` unchanged when it is not a conflict.
    pub fn from_conflict(
        err: RepositoryError,
        fields: &[&'static str],
    ) -> Result<Self, RepositoryError> {
        let Some(column) = err.conflict_field() else {
            return Err(err);
        };
        let mut errors = Self::default();
        match fields.iter().find(|f| **f == column) {
            Some(field) => errors.add(field, format!("This {column} is already in use.")),
            None => errors.add("general", err.to_string()),
        }
        Ok(errors)
    }
}

fn required(errors: &mut FieldErrors, field: &'static str, value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, "Required.");
    } else if value.chars().count() > MAX_NAME_CHARS {
        errors.add(field, format!("At most {MAX_NAME_CHARS} characters."));
    }
    value.to_string()
}

/// Blank slugs are derived from the name.
fn slug_field(errors: &mut FieldErrors, raw: &str, name: &str) -> String {
    let raw = raw.trim();
    let slug = if raw.is_empty() {
        slugify(name)
    } else {
        raw.to_string()
    };
    if !is_valid_slug(&slug) {
        errors.add(
            "slug",
            "Use lowercase letters, digits and single dashes only.",
        );
    }
    slug
}

/// Parse a non-negative amount with at most two decimal places.
fn parse_money(raw: &str) -> Result<Decimal, &'static str> {
    let amount: Decimal = raw
        .trim()
        .trim_start_matches('$')
        .parse()
        .map_err(|_| "Enter an amount like 19.99.")?;
    if amount.is_sign_negative() {
        return Err("Cannot be negative.");
    }
    if amount.scale() > 2 {
        return Err("At most two decimal places.");
    }
    Ok(amount.normalize())
}

fn optional_text(raw: &str) -> Option<String> {
    Some(raw.trim().to_string()).filter(|s| !s.is_empty())
}

/// Product editor values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductForm {
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: String,
    pub price: String,
    pub compare_at_price: String,
    pub stock: String,
    pub category_id: String,
    pub is_active: bool,
    pub is_featured: bool,
    pub subscription_price_id: String,
    pub size_ids: Vec<i32>,
}

impl ProductForm {
    /// Fields that carry database uniqueness constraints.
    pub const UNIQUE_FIELDS: &'static [&'static str] = &["slug", "sku"];

    /// Collect URL-encoded pairs. Repeated `size_ids` keys accumulate.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (Cow<'a, str>, Cow<'a, str>)>) -> Self {
        let mut form = Self::default();
        for (key, value) in pairs {
            let value = value.into_owned();
            match key.as_ref() {
                "name" => form.name = value,
                "slug" => form.slug = value,
                "sku" => form.sku = value,
                "description" => form.description = value,
                "price" => form.price = value,
                "compare_at_price" => form.compare_at_price = value,
                "stock" => form.stock = value,
                "category_id" => form.category_id = value,
                "is_active" => form.is_active = true,
                "is_featured" => form.is_featured = true,
                "subscription_price_id" => form.subscription_price_id = value,
                "size_ids" => {
                    if let Ok(id) = value.trim().parse() {
                        form.size_ids.push(id);
                    }
                }
                _ => {}
            }
        }
        form
    }

    /// Parse a raw `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn from_body(body: &[u8]) -> Self {
        Self::from_pairs(url::form_urlencoded::parse(body))
    }

    /// Blank form for a new product.
    #[must_use]
    pub fn new_product() -> Self {
        Self {
            stock: "0".to_string(),
            is_active: true,
            ..Self::default()
        }
    }

    /// Editor values for an existing product.
    #[must_use]
    pub fn from_product(product: &Product, sizes: &[Size]) -> Self {
        Self {
            name: product.name.clone(),
            slug: product.slug.clone(),
            sku: product.sku.clone(),
            description: product.description.clone(),
            price: product.price.to_string(),
            compare_at_price: product
                .compare_at_price
                .map(|p| p.to_string())
                .unwrap_or_default(),
            stock: product.stock.to_string(),
            category_id: product.category_id.to_string(),
            is_active: product.is_active,
            is_featured: product.is_featured,
            subscription_price_id: product.subscription_price_id.clone().unwrap_or_default(),
            size_ids: sizes.iter().map(|s| s.id.as_i32()).collect(),
        }
    }

    /// Whether the size checkbox for `id` is ticked.
    #[must_use]
    pub fn has_size(&self, id: &i32) -> bool {
        self.size_ids.contains(id)
    }

    /// Whether `id` is the selected category.
    #[must_use]
    pub fn is_category(&self, id: &i32) -> bool {
        self.category_id.trim() == id.to_string()
    }

    /// Validate into repository input plus the offered sizes.
    ///
    /// # Errors
    ///
    /// Returns every failing field at once.
    pub fn validate(&self) -> Result<(ProductInput, Vec<SizeId>), FieldErrors> {
        let mut errors = FieldErrors::default();

        let name = required(&mut errors, "name", &self.name);
        let slug = slug_field(&mut errors, &self.slug, &name);
        let sku = self.sku.trim().to_uppercase();
        if sku.is_empty() {
            errors.add("sku", "Required.");
        } else if sku.chars().any(char::is_whitespace) {
            errors.add("sku", "Cannot contain spaces.");
        }

        let price = parse_money(&self.price).unwrap_or_else(|msg| {
            errors.add("price", msg);
            Decimal::ZERO
        });
        let compare_at_price = if self.compare_at_price.trim().is_empty() {
            None
        } else {
            match parse_money(&self.compare_at_price) {
                Ok(compare) if compare <= price => {
                    errors.add("compare_at_price", "Must be higher than the price.");
                    None
                }
                Ok(compare) => Some(compare),
                Err(msg) => {
                    errors.add("compare_at_price", msg);
                    None
                }
            }
        };

        let stock = match self.stock.trim().parse::<i32>() {
            Ok(n) if n >= 0 => n,
            Ok(_) => {
                errors.add("stock", "Cannot be negative.");
                0
            }
            Err(_) => {
                errors.add("stock", "Enter a whole number.");
                0
            }
        };

        let category_id = match self.category_id.trim().parse::<i32>() {
            Ok(id) if id > 0 => CategoryId::new(id),
            _ => {
                errors.add("category_id", "Choose a category.");
                CategoryId::new(0)
            }
        };

        let mut size_ids: Vec<SizeId> = self.size_ids.iter().copied().map(SizeId::new).collect();
        size_ids.sort_by_key(SizeId::as_i32);
        size_ids.dedup();

        errors.into_result(|| {
            (
                ProductInput {
                    category_id,
                    name,
                    slug,
                    sku,
                    description: self.description.trim().to_string(),
                    price,
                    compare_at_price,
                    stock,
                    is_active: self.is_active,
                    is_featured: self.is_featured,
                    subscription_price_id: optional_text(&self.subscription_price_id),
                },
                size_ids,
            )
        })
    }
}

/// Category editor values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

/// Validated category fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryInput {
    pub name: String,
    pub slug: String,
    pub description: String,
}

impl CategoryForm {
    pub const UNIQUE_FIELDS: &'static [&'static str] = &["name", "slug"];

    #[must_use]
    pub fn from_category(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            slug: category.slug.clone(),
            description: category.description.clone(),
        }
    }

    /// # Errors
    ///
    /// Returns every failing field at once.
    pub fn validate(&self) -> Result<CategoryInput, FieldErrors> {
        let mut errors = FieldErrors::default();
        let name = required(&mut errors, "name", &self.name);
        let slug = slug_field(&mut errors, &self.slug, &name);
        errors.into_result(|| CategoryInput {
            name,
            slug,
            description: self.description.trim().to_string(),
        })
    }
}

/// Signed stock adjustment, like `5`, `+5` or `-2`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockForm {
    #[serde(default)]
    pub delta: String,
}

impl StockForm {
    /// # Errors
    ///
    /// Returns a `delta` error for zero, non-numbers and changes beyond
    /// [`MAX_STOCK_ADJUSTMENT`].
    pub fn validate(&self) -> Result<i32, FieldErrors> {
        let mut errors = FieldErrors::default();
        let delta = match self.delta.trim().trim_start_matches('+').parse::<i32>() {
            Ok(0) | Err(_) => {
                errors.add("delta", "Enter a non-zero whole number, like 5 or -2.");
                0
            }
            Ok(delta) if delta.unsigned_abs() > MAX_STOCK_ADJUSTMENT.unsigned_abs() => {
                errors.add(
                    "delta",
                    format!("Adjust by at most {MAX_STOCK_ADJUSTMENT} units at a time."),
                );
                0
            }
            Ok(delta) => delta,
        };
        errors.into_result(|| delta)
    }
}

/// Size editor values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SizeForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sort_order: String,
}

impl SizeForm {
    pub const UNIQUE_FIELDS: &'static [&'static str] = &["name"];

    /// # Errors
    ///
    /// Returns every failing field at once.
    pub fn validate(&self) -> Result<(String, i32), FieldErrors> {
        let mut errors = FieldErrors::default();
        let name = required(&mut errors, "name", &self.name);
        let sort_order = if self.sort_order.trim().is_empty() {
            0
        } else {
            self.sort_order.trim().parse::<i32>().unwrap_or_else(|_| {
                errors.add("sort_order", "Enter a whole number.");
                0
            })
        };
        errors.into_result(|| (name, sort_order))
    }
}

/// Store settings editor values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsForm {
    #[serde(default)]
    pub store_name: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub flat_shipping_rate: String,
    #[serde(default)]
    pub free_shipping_threshold: String,
    #[serde(default)]
    pub tax_rate_percent: String,
    #[serde(default)]
    pub promo_banner: String,
    #[serde(default)]
    pub low_stock_threshold: String,
}

impl SettingsForm {
    #[must_use]
    pub fn from_settings(settings: &StoreSettings) -> Self {
        Self {
            store_name: settings.store_name.clone(),
            currency: settings.currency.code().to_string(),
            flat_shipping_rate: settings.flat_shipping_rate.to_string(),
            free_shipping_threshold: settings
                .free_shipping_threshold
                .map(|t| t.to_string())
                .unwrap_or_default(),
            tax_rate_percent: settings.tax_rate_percent.to_string(),
            promo_banner: settings.promo_banner.clone().unwrap_or_default(),
            low_stock_threshold: settings.low_stock_threshold.to_string(),
        }
    }

    /// # Errors
    ///
    /// Returns every failing field at once.
    pub fn validate(&self) -> Result<StoreSettings, FieldErrors> {
        let mut errors = FieldErrors::default();

        let store_name = required(&mut errors, "store_name", &self.store_name);
        let currency = self
            .currency
            .trim()
            .to_uppercase()
            .parse::<CurrencyCode>()
            .unwrap_or_else(|_| {
                errors.add("currency", "Unsupported currency.");
                CurrencyCode::default()
            });
        let flat_shipping_rate = parse_money(&self.flat_shipping_rate).unwrap_or_else(|msg| {
            errors.add("flat_shipping_rate", msg);
            Decimal::ZERO
        });
        let free_shipping_threshold = if self.free_shipping_threshold.trim().is_empty() {
            None
        } else {
            parse_money(&self.free_shipping_threshold)
                .map_err(|msg| errors.add("free_shipping_threshold", msg))
                .ok()
        };
        let tax_rate_percent = match self.tax_rate_percent.trim().parse::<Decimal>() {
            Ok(rate) if !rate.is_sign_negative() && rate <= Decimal::ONE_HUNDRED => rate,
            _ => {
                errors.add("tax_rate_percent", "Enter a percentage between 0 and 100.");
                Decimal::ZERO
            }
        };
        let promo_banner = optional_text(&self.promo_banner);
        if promo_banner
            .as_deref()
            .is_some_and(|b| b.chars().count() > MAX_BANNER_CHARS)
        {
            errors.add(
                "promo_banner",
                format!("At most {MAX_BANNER_CHARS} characters."),
            );
        }
        let low_stock_threshold = match self.low_stock_threshold.trim().parse::<i32>() {
            Ok(n) if n >= 0 => n,
            _ => {
                errors.add("low_stock_threshold", "Enter a whole number of 0 or more.");
                0
            }
        };

        errors.into_result(|| StoreSettings {
            store_name,
            currency,
            flat_shipping_rate,
            free_shipping_threshold,
            tax_rate_percent,
            promo_banner,
            low_stock_threshold,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid_product() -> ProductForm {
        ProductForm::from_body(
            b"name=Linen+Shirt&sku=ls-01&price=49.50&compare_at_price=&stock=12\
              &category_id=3&is_active=on&size_ids=2&size_ids=1&size_ids=2",
        )
    }

    #[test]
    fn test_product_form_from_body() {
        let form = valid_product();
        assert_eq!(form.name, "Linen Shirt");
        assert!(form.is_active);
        assert!(!form.is_featured);
        assert_eq!(form.size_ids, vec![2, 1, 2]);
    }

    #[test]
    fn test_product_validate_derives_slug_and_normalizes() {
        let (input, sizes) = valid_product().validate().unwrap();
        assert_eq!(input.slug, "linen-shirt");
        assert_eq!(input.sku, "LS-01");
        assert_eq!(input.price, Decimal::new(495, 1));
        assert_eq!(input.compare_at_price, None);
        assert_eq!(input.category_id, CategoryId::new(3));
        assert_eq!(sizes, vec![SizeId::new(1), SizeId::new(2)]);
    }

    #[test]
    fn test_product_validate_reports_every_field() {
        let form = ProductForm::from_body(
            b"name=&slug=Bad+Slug&sku=a+b&price=-1&compare_at_price=x&stock=-2",
        );
        let errors = form.validate().unwrap_err();
        for field in ["name", "slug", "sku", "price", "compare_at_price", "stock", "category_id"] {
            assert!(errors.get(field).is_some(), "missing error for {field}");
        }
    }

    #[test]
    fn test_compare_at_price_must_exceed_price() {
        let mut form = valid_product();
        form.compare_at_price = "49.50".to_string();
        let errors = form.validate().unwrap_err();
        assert_eq!(
            errors.get("compare_at_price"),
            Some("Must be higher than the price.")
        );

        form.compare_at_price = "60".to_string();
        let (input, _) = form.validate().unwrap();
        assert_eq!(input.compare_at_price, Some(Decimal::from(60)));
    }

    #[test]
    fn test_parse_money() {
        assert_eq!(parse_money("$12.30"), Ok(Decimal::new(123, 1)));
        assert_eq!(parse_money(" 0 "), Ok(Decimal::ZERO));
        assert!(parse_money("1.999").is_err());
        assert!(parse_money("-3").is_err());
        assert!(parse_money("twelve").is_err());
    }

    #[test]
    fn test_conflict_maps_to_field() {
        let errors = FieldErrors::from_conflict(
            RepositoryError::Conflict("sku already exists".to_string()),
            ProductForm::UNIQUE_FIELDS,
        )
        .unwrap();
        assert_eq!(errors.get("sku"), Some("This sku is already in use."));

        let other = FieldErrors::from_conflict(RepositoryError::NotFound, &["sku"]);
        assert!(matches!(other, Err(RepositoryError::NotFound)));
    }

    #[test]
    fn test_stock_form_bounds_delta() {
        let form = |delta: &str| StockForm {
            delta: delta.to_string(),
        };
        assert_eq!(form("+5").validate().unwrap(), 5);
        assert_eq!(form(" -2 ").validate().unwrap(), -2);
        assert_eq!(form("1000000").validate().unwrap(), MAX_STOCK_ADJUSTMENT);

        for bad in ["0", "", "two", "1000001", "-2147483648", "99999999999"] {
            let errors = form(bad).validate().unwrap_err();
            assert!(errors.get("delta").is_some(), "{bad:?} should be rejected");
        }
        assert!(
            form("-1000001")
                .validate()
                .unwrap_err()
                .get("delta")
                .unwrap()
                .contains("at most")
        );
    }

    #[test]
    fn test_size_form_defaults_sort_order() {
        let form = SizeForm {
            name: " XL ".to_string(),
            sort_order: String::new(),
        };
        assert_eq!(form.validate().unwrap(), ("XL".to_string(), 0));

        let form = SizeForm {
            name: "M".to_string(),
            sort_order: "second".to_string(),
        };
        assert!(form.validate().unwrap_err().get("sort_order").is_some());
    }

    #[test]
    fn test_settings_form_round_trip_and_limits() {
        let defaults = StoreSettings::default();
        let form = SettingsForm::from_settings(&defaults);
        assert_eq!(form.validate().unwrap(), defaults);

        let form = SettingsForm {
            tax_rate_percent: "150".to_string(),
            currency: "XYZ".to_string(),
            ..SettingsForm::from_settings(&defaults)
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.get("tax_rate_percent").is_some());
        assert!(errors.get("currency").is_some());
    }

    #[test]
    fn test_blank_free_shipping_threshold_disables_it() {
        let form = SettingsForm {
            free_shipping_threshold: "  ".to_string(),
            ..SettingsForm::from_settings(&StoreSettings::default())
        };
        assert_eq!(form.validate().unwrap().free_shipping_threshold, None);
    }

    #[test]
    fn test_summary_names_fields() {
        let mut errors = FieldErrors::default();
        errors.add("sort_order", "Enter a whole number.");
        errors.add("name", "Required.");
        assert_eq!(errors.summary(), "name: Required. sort order: Enter a whole number.");
    }
}
