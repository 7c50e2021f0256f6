//! Catalog rows: categories, sizes and products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use meridian_core::promotion::BadgeInput;
use meridian_core::{CategoryId, ProductId, SizeId};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A category with the number of products assigned to it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryWithCount {
    #[sqlx(flatten)]
    pub category: Category,
    pub product_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Size {
    pub id: SizeId,
    pub name: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub category_id: CategoryId,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: String,
    pub price: Decimal,
    /// Original price shown struck through when on sale.
    pub compare_at_price: Option<Decimal>,
    pub stock: i32,
    /// Path relative to the uploads directory.
    pub image_path: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
    /// Provider price ID for recurring purchases.
    pub subscription_price_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    #[must_use]
    pub const fn is_subscribable(&self) -> bool {
        self.subscription_price_id.is_some()
    }

    #[must_use]
    pub const fn badge_input(&self) -> BadgeInput {
        BadgeInput {
            price: self.price,
            compare_at_price: self.compare_at_price,
            stock: self.stock,
            created_at: self.created_at,
        }
    }
}

/// Editable product fields, used for both create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInput {
    pub category_id: CategoryId,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub stock: i32,
    pub is_active: bool,
    pub is_featured: bool,
    pub subscription_price_id: Option<String>,
}

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    pub const ALL: [Self; 4] = [Self::Newest, Self::PriceAsc, Self::PriceDesc, Self::Name];

    /// Query-string value.
    #[must_use]
    pub const fn as_param(&self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Name => "name",
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Newest => "Newest",
            Self::PriceAsc => "Price: low to high",
            Self::PriceDesc => "Price: high to low",
            Self::Name => "Name",
        }
    }

    /// Parse a query-string value, falling back to [`ProductSort::Newest`].
    #[must_use]
    pub fn from_param(value: Option<&str>) -> Self {
        value
            .and_then(|v| Self::ALL.into_iter().find(|s| s.as_param() == v))
            .unwrap_or_default()
    }

    pub(crate) const fn order_by(&self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id DESC",
            Self::Name => "p.name ASC, p.id ASC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_from_param() {
        assert_eq!(ProductSort::from_param(Some("price_desc")), ProductSort::PriceDesc);
        assert_eq!(ProductSort::from_param(Some("bogus")), ProductSort::Newest);
        assert_eq!(ProductSort::from_param(None), ProductSort::Newest);
    }
}
