//! Orders and order items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use meridian_core::{Email, OrderId, OrderItemId, OrderStatus, ProductId, UserId};

use crate::Paging;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    /// `None` for guest checkouts.
    pub user_id: Option<UserId>,
    pub email: Email,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub checkout_session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub subscription_id: Option<String>,
    pub shipping_name: Option<String>,
    pub shipping_line1: Option<String>,
    pub shipping_line2: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_postal_code: Option<String>,
    pub shipping_country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
    /// The shipping address collected at checkout, if any.
    #[must_use]
    pub fn shipping_address(&self) -> Option<ShippingAddress> {
        let line1 = self.shipping_line1.clone()?;
        Some(ShippingAddress {
            name: self.shipping_name.clone(),
            line1,
            line2: self.shipping_line2.clone(),
            city: self.shipping_city.clone(),
            postal_code: self.shipping_postal_code.clone(),
            country: self.shipping_country.clone(),
        })
    }

    /// Order number shown to customers.
    #[must_use]
    pub fn number(&self) -> String {
        format!("#{:06}", self.id.as_i32())
    }
}

/// Postal address returned by the payment provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingAddress {
    pub name: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl ShippingAddress {
    /// Non-empty address lines, for display.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let city_line = [self.postal_code.as_deref(), self.city.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        [
            self.name.clone(),
            Some(self.line1.clone()),
            self.line2.clone(),
            Some(city_line),
            self.country.clone(),
        ]
        .into_iter()
        .flatten()
        .filter(|l| !l.trim().is_empty())
        .collect()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    /// `None` once the product has been deleted.
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub size_name: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A pending order to be written when a checkout session is created.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Option<UserId>,
    pub email: Email,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub checkout_session_id: String,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub size_name: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// Filter for the admin order list.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub paging: Paging,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipping_address_lines_skip_blanks() {
        let address = ShippingAddress {
            name: Some("Ada Lovelace".to_owned()),
            line1: "12 St James's Square".to_owned(),
            line2: Some(String::new()),
            city: Some("London".to_owned()),
            postal_code: Some("SW1Y 4JH".to_owned()),
            country: Some("GB".to_owned()),
        };
        assert_eq!(
            address.lines(),
            vec![
                "Ada Lovelace",
                "12 St James's Square",
                "SW1Y 4JH London",
                "GB"
            ]
        );
    }
}
