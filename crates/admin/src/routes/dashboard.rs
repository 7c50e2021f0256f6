//! Dashboard route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Router, extract::State, routing::get};
use tower_sessions::Session;
use tracing::instrument;

use meridian_core::types::money::format_amount;
use meridian_core::{CurrencyCode, OrderStatus};
use meridian_db::models::{Order, Product};
use meridian_db::{
    OrderRepository, ProductRepository, ReviewRepository, SettingsRepository, UserRepository,
};

use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::state::AppState;
use crate::views::{LayoutView, Section, status_class};

/// Orders shown in the recent list.
const RECENT_ORDERS: i64 = 8;

/// Low-stock products shown.
const LOW_STOCK_ROWS: i64 = 10;

/// Headline numbers.
#[derive(Debug, Clone)]
pub struct DashboardMetrics {
    pub revenue: String,
    pub orders: i64,
    pub awaiting_fulfilment: i64,
    pub products: i64,
    pub customers: i64,
    pub pending_reviews: i64,
}

/// Recent order row.
#[derive(Debug, Clone)]
pub struct RecentOrderView {
    pub id: i32,
    pub number: String,
    pub email: String,
    pub total: String,
    pub status: &'static str,
    pub status_class: &'static str,
    pub placed_at: String,
}

impl RecentOrderView {
    fn new(order: &Order) -> Self {
        let currency: CurrencyCode = order.currency.parse().unwrap_or_default();
        Self {
            id: order.id.as_i32(),
            number: order.number(),
            email: order.email.to_string(),
            total: format_amount(order.total, currency),
            status: order.status.label(),
            status_class: status_class(order.status),
            placed_at: order.created_at.format("%b %-d, %H:%M").to_string(),
        }
    }
}

/// Low-stock row.
#[derive(Debug, Clone)]
pub struct LowStockView {
    pub id: i32,
    pub name: String,
    pub sku: String,
    pub stock: i32,
}

impl From<&Product> for LowStockView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.as_i32(),
            name: product.name.clone(),
            sku: product.sku.clone(),
            stock: product.stock,
        }
    }
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub layout: LayoutView,
    pub metrics: DashboardMetrics,
    pub recent_orders: Vec<RecentOrderView>,
    pub low_stock: Vec<LowStockView>,
    pub low_stock_threshold: i32,
}

/// Build the dashboard router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(dashboard))
}

/// Dashboard page handler.
///
/// GET /
#[instrument(skip(admin, state, session))]
async fn dashboard(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<DashboardTemplate> {
    let pool = state.pool();
    let settings = SettingsRepository::new(pool).store_settings().await?;
    let orders = OrderRepository::new(pool);
    let products = ProductRepository::new(pool);

    let metrics = DashboardMetrics {
        revenue: format_amount(orders.revenue_total().await?, settings.currency),
        orders: orders.count(None).await?,
        awaiting_fulfilment: orders.count(Some(OrderStatus::Paid)).await?
            + orders.count(Some(OrderStatus::Processing)).await?,
        products: products.count().await?,
        customers: UserRepository::new(pool).count_customers().await?,
        pending_reviews: ReviewRepository::new(pool).count_pending().await?,
    };

    let recent_orders = orders
        .recent(RECENT_ORDERS)
        .await?
        .iter()
        .map(RecentOrderView::new)
        .collect();
    let low_stock = products
        .low_stock(settings.low_stock_threshold, LOW_STOCK_ROWS)
        .await?
        .iter()
        .map(LowStockView::from)
        .collect();

    Ok(DashboardTemplate {
        layout: LayoutView::load(&session, &admin, Section::Dashboard).await,
        metrics,
        recent_orders,
        low_stock,
        low_stock_threshold: settings.low_stock_threshold,
    })
}
