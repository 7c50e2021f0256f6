//! Account route handlers.
//!
//! These routes require authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::Redirect,
};
use tower_sessions::Session;
use tracing::instrument;

use meridian_core::types::money::format_amount;
use meridian_core::{CurrencyCode, OrderId};
use meridian_db::models::Order;
use meridian_db::{OrderRepository, WishlistRepository};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{RequireAuth, set_flash};
use crate::models::Flash;
use crate::services::subscription::{Cancellation, SubscriptionService};
use crate::state::AppState;
use crate::views::{LayoutView, OrderView, status_class};

/// Orders listed on the overview page.
const RECENT_ORDERS: usize = 3;

/// Row in the order history table.
#[derive(Clone)]
pub struct OrderRowView {
    pub id: i32,
    pub number: String,
    pub placed_on: String,
    pub status: String,
    pub status_class: &'static str,
    pub total: String,
    pub is_subscription: bool,
}

impl OrderRowView {
    fn new(order: &Order) -> Self {
        let currency: CurrencyCode = order.currency.parse().unwrap_or_default();
        Self {
            id: order.id.as_i32(),
            number: order.number(),
            placed_on: order.created_at.format("%b %-d, %Y").to_string(),
            status: order.status.label().to_string(),
            status_class: status_class(order.status),
            total: format_amount(order.total, currency),
            is_subscription: order.subscription_id.is_some(),
        }
    }
}

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub layout: LayoutView,
    pub name: String,
    pub email: String,
    /// Most recent orders only.
    pub orders: Vec<OrderRowView>,
    pub order_count: usize,
    pub wishlist_count: usize,
}

/// Order history page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/orders.html")]
pub struct OrdersTemplate {
    pub layout: LayoutView,
    pub orders: Vec<OrderRowView>,
}

/// Order detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/order.html")]
pub struct OrderDetailTemplate {
    pub layout: LayoutView,
    pub order: OrderView,
}

/// Display account overview page.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<AccountIndexTemplate> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    let wishlist_count = WishlistRepository::new(state.pool())
        .list_for_user(user.id)
        .await?
        .len();

    Ok(AccountIndexTemplate {
        name: user.name.clone(),
        email: user.email.to_string(),
        orders: orders
            .iter()
            .take(RECENT_ORDERS)
            .map(OrderRowView::new)
            .collect(),
        order_count: orders.len(),
        wishlist_count,
        layout: LayoutView::load(&state, &session, Some(user)).await?,
    })
}

/// Display order history.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn orders(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<OrdersTemplate> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;

    Ok(OrdersTemplate {
        orders: orders.iter().map(OrderRowView::new).collect(),
        layout: LayoutView::load(&state, &session, Some(user)).await?,
    })
}

/// Display one of the customer's orders.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn order(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<OrderDetailTemplate> {
    let orders = OrderRepository::new(state.pool());
    // Someone else's order is reported as missing
    let order = orders
        .get_for_user(OrderId::new(id), user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    let items = orders.items(order.id).await?;

    Ok(OrderDetailTemplate {
        order: OrderView::new(&order, &items),
        layout: LayoutView::load(&state, &session, Some(user)).await?,
    })
}

/// Cancel the subscription attached to an order.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn cancel_subscription(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Redirect> {
    let target = format!("/account/orders/{id}");
    let flash = match SubscriptionService::new(&state)
        .cancel(&user, OrderId::new(id))
        .await
    {
        Ok(Cancellation::OrderCancelled) => {
            Flash::success("Your subscription and this order have been cancelled.")
        }
        Ok(Cancellation::SubscriptionOnly) => Flash::info(
            "Your subscription has been cancelled. This order has already shipped.",
        ),
        Err(e) => Flash::error(e.into_flash_message()?),
    };
    set_flash(&session, flash).await;
    Ok(Redirect::to(&target))
}
