//! Persistent carts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use meridian_core::cart::CartLine;
use meridian_core::{CartId, CartItemId, ProductId, SizeId, UserId};

/// A signed-in customer's cart. Each user has at most one.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart line joined with the product and size it refers to.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartLineRow {
    pub item_id: CartItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_slug: String,
    pub image_path: Option<String>,
    pub unit_price: Decimal,
    pub stock: i32,
    pub is_active: bool,
    pub size_id: Option<SizeId>,
    pub size_name: Option<String>,
    pub quantity: i32,
}

impl CartLineRow {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// The bare line, without product details.
    #[must_use]
    pub fn as_line(&self) -> CartLine {
        CartLine::new(
            self.product_id,
            self.size_id,
            u32::try_from(self.quantity).unwrap_or(0),
        )
    }
}
