//! Store settings.
//!
//! Settings are stored one JSONB value per key. [`StoreSettings`] is the typed
//! view the applications use; missing or malformed keys fall back to
//! defaults so a fresh database works without seeding.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use meridian_core::CurrencyCode;
use meridian_core::pricing::PricingRules;
use meridian_core::promotion::LOW_STOCK_THRESHOLD;

use crate::RepositoryError;

pub const KEY_STORE_NAME: &str = "store_name";
pub const KEY_CURRENCY: &str = "currency";
pub const KEY_FLAT_SHIPPING_RATE: &str = "flat_shipping_rate";
pub const KEY_FREE_SHIPPING_THRESHOLD: &str = "free_shipping_threshold";
pub const KEY_TAX_RATE_PERCENT: &str = "tax_rate_percent";
pub const KEY_PROMO_BANNER: &str = "promo_banner";
pub const KEY_LOW_STOCK_THRESHOLD: &str = "low_stock_threshold";

/// Typed store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    pub store_name: String,
    pub currency: CurrencyCode,
    pub flat_shipping_rate: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
    pub tax_rate_percent: Decimal,
    /// Site-wide banner text; hidden when `None`.
    pub promo_banner: Option<String>,
    /// Admin dashboard warns at or below this stock level.
    pub low_stock_threshold: i32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        let pricing = PricingRules::default();
        Self {
            store_name: "Meridian".to_owned(),
            currency: CurrencyCode::default(),
            flat_shipping_rate: pricing.flat_shipping_rate,
            free_shipping_threshold: pricing.free_shipping_threshold,
            tax_rate_percent: pricing.tax_rate_percent,
            promo_banner: None,
            low_stock_threshold: LOW_STOCK_THRESHOLD,
        }
    }
}

impl StoreSettings {
    /// Build settings from raw key/value rows, using defaults for anything
    /// missing or unparseable.
    #[must_use]
    pub fn from_values(values: &HashMap<String, JsonValue>) -> Self {
        let defaults = Self::default();
        let text = |key: &str| {
            values
                .get(key)
                .and_then(JsonValue::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        let decimal = |key: &str| values.get(key).and_then(json_decimal);

        Self {
            store_name: text(KEY_STORE_NAME).unwrap_or(defaults.store_name),
            currency: text(KEY_CURRENCY)
                .and_then(|c| c.parse().ok())
                .unwrap_or(defaults.currency),
            flat_shipping_rate: decimal(KEY_FLAT_SHIPPING_RATE)
                .filter(|d| !d.is_sign_negative())
                .unwrap_or(defaults.flat_shipping_rate),
            free_shipping_threshold: match values.get(KEY_FREE_SHIPPING_THRESHOLD) {
                Some(JsonValue::Null) => None,
                Some(v) => json_decimal(v).or(defaults.free_shipping_threshold),
                None => defaults.free_shipping_threshold,
            },
            tax_rate_percent: decimal(KEY_TAX_RATE_PERCENT)
                .filter(|d| !d.is_sign_negative())
                .unwrap_or(defaults.tax_rate_percent),
            promo_banner: text(KEY_PROMO_BANNER),
            low_stock_threshold: values
                .get(KEY_LOW_STOCK_THRESHOLD)
                .and_then(JsonValue::as_i64)
                .and_then(|n| i32::try_from(n).ok())
                .filter(|n| *n >= 0)
                .unwrap_or(defaults.low_stock_threshold),
        }
    }

    /// Key/value pairs for persisting these settings.
    #[must_use]
    pub fn to_values(&self) -> Vec<(&'static str, JsonValue)> {
        vec![
            (KEY_STORE_NAME, JsonValue::from(self.store_name.clone())),
            (KEY_CURRENCY, JsonValue::from(self.currency.code())),
            (
                KEY_FLAT_SHIPPING_RATE,
                JsonValue::from(self.flat_shipping_rate.to_string()),
            ),
            (
                KEY_FREE_SHIPPING_THRESHOLD,
                self.free_shipping_threshold
                    .map_or(JsonValue::Null, |t| JsonValue::from(t.to_string())),
            ),
            (
                KEY_TAX_RATE_PERCENT,
                JsonValue::from(self.tax_rate_percent.to_string()),
            ),
            (
                KEY_PROMO_BANNER,
                self.promo_banner
                    .clone()
                    .map_or(JsonValue::Null, JsonValue::from),
            ),
            (
                KEY_LOW_STOCK_THRESHOLD,
                JsonValue::from(self.low_stock_threshold),
            ),
        ]
    }

    #[must_use]
    pub fn pricing_rules(&self) -> PricingRules {
        PricingRules {
            flat_shipping_rate: self.flat_shipping_rate,
            free_shipping_threshold: self.free_shipping_threshold,
            tax_rate_percent: self.tax_rate_percent,
        }
    }
}

/// Decimals are stored as strings but numbers are accepted too.
fn json_decimal(value: &JsonValue) -> Option<Decimal> {
    match value {
        JsonValue::String(s) => s.trim().parse().ok(),
        JsonValue::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a raw setting value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, key: &str) -> Result<Option<JsonValue>, RepositoryError> {
        let value = sqlx::query_scalar::<_, JsonValue>("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(self.pool)
            .await?;

        Ok(value)
    }

    /// Set a raw setting value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set(&self, key: &str, value: &JsonValue) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
        )
        .bind(key)
        .bind(value)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// All stored settings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn all(&self) -> Result<HashMap<String, JsonValue>, RepositoryError> {
        let rows = sqlx::query_as::<_, (String, JsonValue)>("SELECT key, value FROM settings")
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().collect())
    }

    /// Load the typed store settings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn store_settings(&self) -> Result<StoreSettings, RepositoryError> {
        Ok(StoreSettings::from_values(&self.all().await?))
    }

    /// Persist every store setting in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn save_store_settings(&self, settings: &StoreSettings) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for (key, value) in settings.to_values() {
            sqlx::query(
                "INSERT INTO settings (key, value) VALUES ($1, $2)
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
            )
            .bind(key)
            .bind(&value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        assert_eq!(StoreSettings::from_values(&HashMap::new()), StoreSettings::default());
    }

    #[test]
    fn test_parses_stored_values() {
        let values: HashMap<String, JsonValue> = [
            (KEY_STORE_NAME, json!("Harbor Goods")),
            (KEY_CURRENCY, json!("eur")),
            (KEY_FLAT_SHIPPING_RATE, json!("7.50")),
            (KEY_FREE_SHIPPING_THRESHOLD, JsonValue::Null),
            (KEY_TAX_RATE_PERCENT, json!(20)),
            (KEY_PROMO_BANNER, json!("  Free returns  ")),
            (KEY_LOW_STOCK_THRESHOLD, json!(3)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect();

        let settings = StoreSettings::from_values(&values);
        assert_eq!(settings.store_name, "Harbor Goods");
        assert_eq!(settings.currency, CurrencyCode::EUR);
        assert_eq!(settings.flat_shipping_rate, Decimal::new(750, 2));
        assert_eq!(settings.free_shipping_threshold, None);
        assert_eq!(settings.tax_rate_percent, Decimal::new(20, 0));
        assert_eq!(settings.promo_banner.as_deref(), Some("Free returns"));
        assert_eq!(settings.low_stock_threshold, 3);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let values: HashMap<String, JsonValue> = [
            (KEY_FLAT_SHIPPING_RATE.to_owned(), json!("-1")),
            (KEY_CURRENCY.to_owned(), json!("XYZ")),
            (KEY_LOW_STOCK_THRESHOLD.to_owned(), json!("lots")),
        ]
        .into_iter()
        .collect();

        let settings = StoreSettings::from_values(&values);
        let defaults = StoreSettings::default();
        assert_eq!(settings.flat_shipping_rate, defaults.flat_shipping_rate);
        assert_eq!(settings.currency, defaults.currency);
        assert_eq!(settings.low_stock_threshold, defaults.low_stock_threshold);
    }

    #[test]
    fn test_values_round_trip() {
        let settings = StoreSettings {
            promo_banner: Some("Spring sale".to_owned()),
            free_shipping_threshold: None,
            ..StoreSettings::default()
        };
        let values: HashMap<String, JsonValue> = settings
            .to_values()
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect();
        assert_eq!(StoreSettings::from_values(&values), settings);
    }
}
