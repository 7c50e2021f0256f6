//! Order management route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Path, Query, State},
    response::Redirect,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use meridian_core::types::money::format_amount;
use meridian_core::{CurrencyCode, OrderId, OrderStatus};
use meridian_db::models::{Order, OrderFilter};
use meridian_db::{OrderRepository, Paging, RepositoryError};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{RequireAdminAuth, set_flash};
use crate::models::Flash;
use crate::state::AppState;
use crate::views::{LayoutView, PaginationView, Section, status_class};

const PER_PAGE: u32 = 30;

/// Order row in the listing.
#[derive(Debug, Clone)]
pub struct OrderRowView {
    pub id: i32,
    pub number: String,
    pub email: String,
    pub total: String,
    pub status: &'static str,
    pub status_class: &'static str,
    pub is_subscription: bool,
    pub placed_at: String,
}

impl OrderRowView {
    fn new(order: &Order) -> Self {
        Self {
            id: order.id.as_i32(),
            number: order.number(),
            email: order.email.to_string(),
            total: format_amount(order.total, currency_of(order)),
            status: order.status.label(),
            status_class: status_class(order.status),
            is_subscription: order.subscription_id.is_some(),
            placed_at: order.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Status filter link.
#[derive(Debug, Clone)]
pub struct StatusTabView {
    pub label: &'static str,
    pub url: String,
    pub active: bool,
}

/// Status choice in the update form.
#[derive(Debug, Clone)]
pub struct StatusOptionView {
    pub value: &'static str,
    pub label: &'static str,
}

/// Order line on the detail page.
#[derive(Debug, Clone)]
pub struct OrderLineView {
    pub product_name: String,
    pub product_id: Option<i32>,
    pub size_name: Option<String>,
    pub unit_price: String,
    pub quantity: i32,
    pub line_total: String,
}

/// Order detail with money already formatted.
#[derive(Debug, Clone)]
pub struct OrderDetailView {
    pub id: i32,
    pub number: String,
    pub email: String,
    pub status: &'static str,
    pub status_class: &'static str,
    pub subtotal: String,
    pub shipping: String,
    pub tax: String,
    pub total: String,
    pub placed_at: String,
    pub paid_at: Option<String>,
    pub checkout_session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub subscription_id: Option<String>,
    pub address: Vec<String>,
}

/// Order listing template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub layout: LayoutView,
    pub orders: Vec<OrderRowView>,
    pub tabs: Vec<StatusTabView>,
    pub pagination: PaginationView,
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub layout: LayoutView,
    pub order: OrderDetailView,
    pub lines: Vec<OrderLineView>,
    pub next_statuses: Vec<StatusOptionView>,
}

/// Query parameters for the order listing.
#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
}

/// Status update form.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

/// Build the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(index))
        .route("/orders/{id}", get(show))
        .route("/orders/{id}/status", post(update_status))
}

/// Order listing, newest first, optionally filtered by status.
///
/// GET /orders
#[instrument(skip(admin, state, session))]
async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<OrdersQuery>,
) -> Result<OrdersIndexTemplate> {
    // Unknown statuses show everything rather than an error page
    let status = query
        .status
        .as_deref()
        .and_then(|s| s.parse::<OrderStatus>().ok());

    let page = OrderRepository::new(state.pool())
        .list(&OrderFilter {
            status,
            paging: Paging::new(query.page, PER_PAGE),
        })
        .await?;

    let pagination = PaginationView::new(&page, |p| match status {
        Some(s) => format!("/orders?status={}&page={p}", s.as_str()),
        None => format!("/orders?page={p}"),
    });

    let tabs = std::iter::once(StatusTabView {
        label: "All",
        url: "/orders".to_string(),
        active: status.is_none(),
    })
    .chain(OrderStatus::ALL.into_iter().map(|s| StatusTabView {
        label: s.label(),
        url: format!("/orders?status={}", s.as_str()),
        active: status == Some(s),
    }))
    .collect();

    Ok(OrdersIndexTemplate {
        layout: LayoutView::load(&session, &admin, Section::Orders).await,
        orders: page.items.iter().map(OrderRowView::new).collect(),
        tabs,
        pagination,
    })
}

/// Order detail page.
///
/// GET /orders/{id}
#[instrument(skip(admin, state, session))]
async fn show(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<OrderShowTemplate> {
    let orders = OrderRepository::new(state.pool());
    let order = orders
        .get_by_id(OrderId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    let items = orders.items(order.id).await?;
    let currency = currency_of(&order);

    let lines = items
        .iter()
        .map(|item| OrderLineView {
            product_name: item.product_name.clone(),
            product_id: item.product_id.map(|p| p.as_i32()),
            size_name: item.size_name.clone(),
            unit_price: format_amount(item.unit_price, currency),
            quantity: item.quantity,
            line_total: format_amount(item.line_total(), currency),
        })
        .collect();

    let next_statuses = order
        .status
        .next_statuses()
        .into_iter()
        .map(|s| StatusOptionView {
            value: s.as_str(),
            label: s.label(),
        })
        .collect();

    let detail = OrderDetailView {
        id: order.id.as_i32(),
        number: order.number(),
        email: order.email.to_string(),
        status: order.status.label(),
        status_class: status_class(order.status),
        subtotal: format_amount(order.subtotal, currency),
        shipping: format_amount(order.shipping, currency),
        tax: format_amount(order.tax, currency),
        total: format_amount(order.total, currency),
        placed_at: order.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
        paid_at: order
            .paid_at
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string()),
        address: order
            .shipping_address()
            .map(|a| a.lines())
            .unwrap_or_default(),
        checkout_session_id: order.checkout_session_id,
        payment_intent_id: order.payment_intent_id,
        subscription_id: order.subscription_id,
    };

    Ok(OrderShowTemplate {
        layout: LayoutView::load(&session, &admin, Section::Orders).await,
        order: detail,
        lines,
        next_statuses,
    })
}

/// Move an order to a new status.
///
/// Stock is returned when a paid order is cancelled or refunded.
///
/// POST /orders/{id}/status
#[instrument(skip(admin, state, session, form))]
async fn update_status(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
    Form(form): Form<StatusForm>,
) -> Result<Redirect> {
    let back = format!("/orders/{id}");
    let Ok(next) = form.status.parse::<OrderStatus>() else {
        return Err(AppError::BadRequest(format!(
            "unknown order status: {}",
            form.status
        )));
    };

    match OrderRepository::new(state.pool())
        .update_status(OrderId::new(id), next)
        .await
    {
        Ok(previous) => {
            tracing::info!(
                order_id = id,
                admin_id = %admin.id,
                from = %previous,
                to = %next,
                "order status changed"
            );
            set_flash(
                &session,
                Flash::success(format!("Order marked {}.", next.label())),
            )
            .await;
        }
        Err(RepositoryError::Conflict(msg)) => {
            set_flash(&session, Flash::error(format!("Not updated: {msg}."))).await;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Redirect::to(&back))
}

fn currency_of(order: &Order) -> CurrencyCode {
    order.currency.parse().unwrap_or_default()
}
