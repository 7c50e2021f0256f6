//! View models shared by page templates.
//!
//! Money is formatted here so templates only print strings.

use chrono::Utc;
use tower_sessions::Session;

use meridian_core::{CurrencyCode, OrderStatus};
use meridian_core::types::money::format_amount;
use meridian_db::Page;
use meridian_db::models::{Order, OrderItem, Product};

use crate::error::AppError;
use crate::middleware::take_flash;
use crate::models::{CurrentUser, Flash};
use crate::services::cart::{CartOwner, CartService};
use crate::services::promotion::{self, BadgeView};
use crate::state::AppState;

/// Category link in the site navigation.
#[derive(Debug, Clone)]
pub struct NavCategory {
    pub name: String,
    pub slug: String,
}

/// Data every page layout needs.
#[derive(Debug, Clone)]
pub struct LayoutView {
    pub store_name: String,
    pub promo_banner: Option<String>,
    pub cart_count: u32,
    pub user: Option<CurrentUser>,
    pub flash: Option<Flash>,
    pub categories: Vec<NavCategory>,
}

impl LayoutView {
    /// Load layout data and consume the pending flash message.
    ///
    /// # Errors
    ///
    /// Returns an error if settings, categories or the cart cannot be read.
    pub async fn load(
        state: &AppState,
        session: &Session,
        user: Option<CurrentUser>,
    ) -> Result<Self, AppError> {
        let settings = state.store_settings().await?;
        let categories = state.nav_categories().await?;
        let cart_count = CartService::new(state.pool())
            .item_count(CartOwner::resolve(user.as_ref(), session))
            .await?;

        Ok(Self {
            store_name: settings.store_name.clone(),
            promo_banner: promotion::promo_banner(&settings),
            cart_count,
            user,
            flash: take_flash(session).await,
            categories: categories
                .iter()
                .filter(|c| c.product_count > 0)
                .map(|c| NavCategory {
                    name: c.category.name.clone(),
                    slug: c.category.slug.clone(),
                })
                .collect(),
        })
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }
}

/// Public URL of an uploaded image.
#[must_use]
pub fn upload_url(path: &str) -> String {
    format!("/uploads/{}", path.trim_start_matches('/'))
}

/// A product in a grid.
#[derive(Debug, Clone)]
pub struct ProductCardView {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub price: String,
    pub compare_at_price: Option<String>,
    pub image_url: Option<String>,
    pub badges: Vec<BadgeView>,
    pub in_stock: bool,
}

impl ProductCardView {
    #[must_use]
    pub fn new(product: &Product, currency: CurrencyCode) -> Self {
        Self {
            id: product.id.as_i32(),
            name: product.name.clone(),
            slug: product.slug.clone(),
            price: format_amount(product.price, currency),
            compare_at_price: product
                .compare_at_price
                .filter(|c| *c > product.price)
                .map(|c| format_amount(c, currency)),
            image_url: product.image_path.as_deref().map(upload_url),
            badges: promotion::badges_for(product, Utc::now()),
            in_stock: product.in_stock(),
        }
    }

    #[must_use]
    pub fn list(products: &[Product], currency: CurrencyCode) -> Vec<Self> {
        products.iter().map(|p| Self::new(p, currency)).collect()
    }
}

/// Previous/next links for a paged listing.
#[derive(Debug, Clone, Default)]
pub struct PaginationView {
    pub page: u32,
    pub total_pages: u32,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
}

impl PaginationView {
    /// Build links with `url_for(page)` producing the URL of a page.
    pub fn new<T>(page: &Page<T>, url_for: impl Fn(u32) -> String) -> Self {
        Self {
            page: page.page,
            total_pages: page.total_pages(),
            prev_url: page.has_prev().then(|| url_for(page.page - 1)),
            next_url: page.has_next().then(|| url_for(page.page + 1)),
        }
    }

    #[must_use]
    pub fn is_needed(&self) -> bool {
        self.total_pages > 1
    }
}

/// One purchased line on an order page.
#[derive(Debug, Clone)]
pub struct OrderLineView {
    pub name: String,
    pub size_name: Option<String>,
    pub quantity: i32,
    pub unit_price: String,
    pub line_total: String,
}

/// A labelled amount under an order's lines.
#[derive(Debug, Clone)]
pub struct TotalRow {
    pub label: &'static str,
    pub amount: String,
}

/// An order as shown to its customer.
#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: i32,
    pub number: String,
    pub email: String,
    pub status: String,
    pub status_class: &'static str,
    pub placed_on: String,
    pub lines: Vec<OrderLineView>,
    pub totals: Vec<TotalRow>,
    pub total: String,
    pub shipping_address: Vec<String>,
    pub has_subscription: bool,
    pub can_cancel_subscription: bool,
}

impl OrderView {
    #[must_use]
    pub fn new(order: &Order, items: &[OrderItem]) -> Self {
        let currency: CurrencyCode = order.currency.parse().unwrap_or_default();
        let has_subscription = order.subscription_id.is_some();
        Self {
            id: order.id.as_i32(),
            number: order.number(),
            email: order.email.to_string(),
            status: order.status.label().to_string(),
            status_class: status_class(order.status),
            placed_on: order.created_at.format("%B %-d, %Y").to_string(),
            lines: items
                .iter()
                .map(|item| OrderLineView {
                    name: item.product_name.clone(),
                    size_name: item.size_name.clone(),
                    quantity: item.quantity,
                    unit_price: format_amount(item.unit_price, currency),
                    line_total: format_amount(item.line_total(), currency),
                })
                .collect(),
            totals: vec![
                TotalRow {
                    label: "Subtotal",
                    amount: format_amount(order.subtotal, currency),
                },
                TotalRow {
                    label: "Shipping",
                    amount: format_amount(order.shipping, currency),
                },
                TotalRow {
                    label: "Tax",
                    amount: format_amount(order.tax, currency),
                },
            ],
            total: format_amount(order.total, currency),
            shipping_address: order
                .shipping_address()
                .map(|a| a.lines())
                .unwrap_or_default(),
            has_subscription,
            can_cancel_subscription: has_subscription && !order.status.is_terminal(),
        }
    }
}

/// CSS modifier for an order status pill.
#[must_use]
pub const fn status_class(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending | OrderStatus::Processing => "status-pending",
        OrderStatus::Paid | OrderStatus::Shipped | OrderStatus::Delivered => "status-ok",
        OrderStatus::PaymentFailed | OrderStatus::Cancelled => "status-bad",
        OrderStatus::Refunded => "status-muted",
    }
}

/// Append `key=value` pairs with non-empty values to a path as a query string.
#[must_use]
pub fn with_query(path: &str, params: &[(&str, Option<&str>)]) -> String {
    let query: Vec<String> = params
        .iter()
        .filter_map(|(key, value)| {
            value
                .filter(|v| !v.is_empty())
                .map(|v| format!("{key}={}", urlencoding::encode(v)))
        })
        .collect();
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{}", query.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_query_skips_empty_values() {
        assert_eq!(
            with_query(
                "/products",
                &[("q", Some("wool hat")), ("category", None), ("sort", Some(""))]
            ),
            "/products?q=wool%20hat"
        );
        assert_eq!(with_query("/products", &[]), "/products");
    }

    #[test]
    fn test_pagination_links() {
        let page = Page {
            items: Vec::<u8>::new(),
            page: 2,
            per_page: 10,
            total: 35,
        };
        let view = PaginationView::new(&page, |p| format!("/products?page={p}"));
        assert_eq!(view.total_pages, 4);
        assert_eq!(view.prev_url.as_deref(), Some("/products?page=1"));
        assert_eq!(view.next_url.as_deref(), Some("/products?page=3"));
        assert!(view.is_needed());
    }

    #[test]
    fn test_upload_url() {
        assert_eq!(upload_url("products/a.jpg"), "/uploads/products/a.jpg");
        assert_eq!(upload_url("/products/a.jpg"), "/uploads/products/a.jpg");
    }
}
