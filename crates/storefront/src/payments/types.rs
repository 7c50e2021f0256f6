//! Request and response types for the payment provider API.
//!
//! Requests are form-encoded with bracketed keys
//! (`line_items[0][price_data][currency]=usd`). Responses are JSON; every
//! field the storefront does not strictly need is optional so that provider
//! API additions never break deserialization.

use std::collections::HashMap;

use serde::Deserialize;

/// Countries a shipping address may be collected for.
pub const SHIPPING_COUNTRIES: &[&str] = &["US", "CA", "GB", "IE", "AU", "NZ", "DE", "FR", "NL"];

/// Checkout mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    /// One-time payment.
    Payment,
    /// Recurring subscription.
    Subscription,
}

impl CheckoutMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Subscription => "subscription",
        }
    }
}

/// One line of a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutLineItem {
    /// Ad-hoc price: name and amount in minor units.
    Amount {
        name: String,
        unit_amount: i64,
        quantity: u32,
    },
    /// A price already defined at the provider (used for subscriptions).
    Price { price_id: String, quantity: u32 },
}

/// Parameters for creating a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub mode: CheckoutMode,
    /// Lower-case ISO currency code.
    pub currency: String,
    pub line_items: Vec<CheckoutLineItem>,
    pub customer_email: String,
    /// Opaque reference echoed back on the session (the user id, or `guest`).
    pub client_reference_id: String,
    /// Must contain the `{CHECKOUT_SESSION_ID}` placeholder.
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: Vec<(String, String)>,
    pub collect_shipping_address: bool,
    pub allow_promotion_codes: bool,
}

impl CheckoutSessionRequest {
    /// Form-encoded body for `POST /v1/checkout/sessions`.
    #[must_use]
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), self.mode.as_str().into()),
            ("success_url".into(), self.success_url.clone()),
            ("cancel_url".into(), self.cancel_url.clone()),
            ("customer_email".into(), self.customer_email.clone()),
            ("client_reference_id".into(), self.client_reference_id.clone()),
        ];

        for (i, item) in self.line_items.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            match item {
                CheckoutLineItem::Amount {
                    name,
                    unit_amount,
                    quantity,
                } => {
                    form.push((
                        format!("{prefix}[price_data][currency]"),
                        self.currency.clone(),
                    ));
                    form.push((
                        format!("{prefix}[price_data][product_data][name]"),
                        name.clone(),
                    ));
                    form.push((
                        format!("{prefix}[price_data][unit_amount]"),
                        unit_amount.to_string(),
                    ));
                    form.push((format!("{prefix}[quantity]"), quantity.to_string()));
                }
                CheckoutLineItem::Price { price_id, quantity } => {
                    form.push((format!("{prefix}[price]"), price_id.clone()));
                    form.push((format!("{prefix}[quantity]"), quantity.to_string()));
                }
            }
        }

        for (key, value) in &self.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
            if self.mode == CheckoutMode::Payment {
                form.push((
                    format!("payment_intent_data[metadata][{key}]"),
                    value.clone(),
                ));
            }
        }

        if self.collect_shipping_address {
            for (i, country) in SHIPPING_COUNTRIES.iter().enumerate() {
                form.push((
                    format!("shipping_address_collection[allowed_countries][{i}]"),
                    (*country).to_string(),
                ));
            }
        }

        if self.allow_promotion_codes {
            form.push(("allow_promotion_codes".into(), "true".into()));
        }

        form
    }
}

/// A hosted checkout session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Redirect target while the session is open.
    pub url: Option<String>,
    /// `open`, `complete` or `expired`.
    pub status: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: Option<String>,
    pub mode: Option<String>,
    pub payment_intent: Option<String>,
    pub subscription: Option<String>,
    pub client_reference_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_details: Option<CustomerDetails>,
    pub currency: Option<String>,
    pub amount_subtotal: Option<i64>,
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub shipping_details: Option<ShippingDetails>,
    pub collected_information: Option<CollectedInformation>,
    pub line_items: Option<List<SessionLineItem>>,
}

impl CheckoutSession {
    /// Whether the provider has captured payment for this session.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        matches!(
            self.payment_status.as_deref(),
            Some("paid" | "no_payment_required")
        )
    }

    /// Buyer email as entered at checkout, falling back to the prefilled one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.as_deref())
            .or(self.customer_email.as_deref())
    }

    /// Shipping details from either the current or legacy response shape.
    #[must_use]
    pub fn shipping(&self) -> Option<&ShippingDetails> {
        self.collected_information
            .as_ref()
            .and_then(|c| c.shipping_details.as_ref())
            .or(self.shipping_details.as_ref())
    }

    /// Expanded line items, or an empty slice when not expanded.
    #[must_use]
    pub fn items(&self) -> &[SessionLineItem] {
        self.line_items.as_ref().map_or(&[], |l| l.data.as_slice())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectedInformation {
    pub shipping_details: Option<ShippingDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShippingDetails {
    pub name: Option<String>,
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Address {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// A paginated list wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct List<T> {
    pub data: Vec<T>,
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

/// A line item as reported back by the provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionLineItem {
    pub description: Option<String>,
    pub quantity: Option<u32>,
    pub amount_total: Option<i64>,
    pub price: Option<Price>,
}

impl SessionLineItem {
    /// Unit amount in minor units, derived from the total when the price is absent.
    #[must_use]
    pub fn unit_amount(&self) -> i64 {
        if let Some(amount) = self.price.as_ref().and_then(|p| p.unit_amount) {
            return amount;
        }
        match (self.amount_total, self.quantity) {
            (Some(total), Some(quantity)) if quantity > 0 => total / i64::from(quantity),
            (Some(total), _) => total,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Price {
    pub id: Option<String>,
    pub unit_amount: Option<i64>,
}

/// A payment intent, as carried by `payment_intent.*` events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub last_payment_error: Option<ApiErrorBody>,
}

/// A subscription.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub status: Option<String>,
}

/// Error envelope returned with non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub code: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(mode: CheckoutMode) -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            mode,
            currency: "usd".into(),
            line_items: vec![],
            customer_email: "ada@example.org".into(),
            client_reference_id: "42".into(),
            success_url: "https://shop.test/checkout/success?session_id={CHECKOUT_SESSION_ID}"
                .into(),
            cancel_url: "https://shop.test/checkout/cancel".into(),
            metadata: vec![("user_id".into(), "42".into())],
            collect_shipping_address: false,
            allow_promotion_codes: true,
        }
    }

    fn value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_payment_form_encodes_amount_lines() {
        let mut req = request(CheckoutMode::Payment);
        req.line_items = vec![
            CheckoutLineItem::Amount {
                name: "Field Jacket".into(),
                unit_amount: 12_900,
                quantity: 2,
            },
            CheckoutLineItem::Amount {
                name: "Shipping".into(),
                unit_amount: 500,
                quantity: 1,
            },
        ];
        let form = req.to_form();

        assert_eq!(value(&form, "mode"), Some("payment"));
        assert_eq!(value(&form, "line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(
            value(&form, "line_items[0][price_data][product_data][name]"),
            Some("Field Jacket")
        );
        assert_eq!(value(&form, "line_items[0][price_data][unit_amount]"), Some("12900"));
        assert_eq!(value(&form, "line_items[0][quantity]"), Some("2"));
        assert_eq!(value(&form, "line_items[1][price_data][unit_amount]"), Some("500"));
        assert_eq!(value(&form, "metadata[user_id]"), Some("42"));
        assert_eq!(value(&form, "payment_intent_data[metadata][user_id]"), Some("42"));
        assert_eq!(value(&form, "allow_promotion_codes"), Some("true"));
    }

    #[test]
    fn test_subscription_form_uses_price_ids() {
        let mut req = request(CheckoutMode::Subscription);
        req.line_items = vec![CheckoutLineItem::Price {
            price_id: "price_123".into(),
            quantity: 1,
        }];
        req.collect_shipping_address = true;
        let form = req.to_form();

        assert_eq!(value(&form, "mode"), Some("subscription"));
        assert_eq!(value(&form, "line_items[0][price]"), Some("price_123"));
        assert_eq!(value(&form, "payment_intent_data[metadata][user_id]"), None);
        assert_eq!(
            value(&form, "shipping_address_collection[allowed_countries][0]"),
            Some("US")
        );
    }

    #[test]
    fn test_session_deserializes_with_expanded_items() {
        let json = r#"{
            "id": "cs_test_1",
            "url": null,
            "status": "complete",
            "payment_status": "paid",
            "payment_intent": "pi_1",
            "customer_details": {"email": "ada@example.org", "name": "Ada"},
            "metadata": {"user_id": "42"},
            "collected_information": {
                "shipping_details": {
                    "name": "Ada Lovelace",
                    "address": {"line1": "1 Analytical Way", "city": "London", "country": "GB"}
                }
            },
            "line_items": {"object": "list", "data": [
                {"description": "Field Jacket", "quantity": 2, "amount_total": 25800,
                 "price": {"id": "price_x", "unit_amount": 12900}}
            ]},
            "unknown_field": true
        }"#;

        let session: CheckoutSession = serde_json::from_str(json).unwrap();
        assert!(session.is_paid());
        assert_eq!(session.email(), Some("ada@example.org"));
        assert_eq!(
            session.shipping().and_then(|s| s.name.as_deref()),
            Some("Ada Lovelace")
        );
        assert_eq!(session.items().len(), 1);
        assert_eq!(session.items()[0].unit_amount(), 12_900);
    }

    #[test]
    fn test_unit_amount_falls_back_to_total() {
        let item = SessionLineItem {
            description: Some("Tote".into()),
            quantity: Some(3),
            amount_total: Some(3000),
            price: None,
        };
        assert_eq!(item.unit_amount(), 1000);
    }

    #[test]
    fn test_unpaid_session() {
        let session = CheckoutSession {
            payment_status: Some("unpaid".into()),
            ..CheckoutSession::default()
        };
        assert!(!session.is_paid());
        assert!(session.items().is_empty());
    }
}
