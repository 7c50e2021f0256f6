//! Checkout route handlers.
//!
//! Checkout hands the buyer to the hosted payment page. The provider sends
//! them back to `/checkout/success` or `/checkout/cancel`.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use meridian_core::Email;
use meridian_core::types::money::format_amount;
use rust_decimal::Decimal;

use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{OptionalAuth, set_flash};
use crate::models::Flash;
use crate::services::cart::{CartOwner, GuestCart};
use crate::services::checkout::{CheckoutError, CheckoutOutcome, CheckoutService};
use crate::state::AppState;
use crate::views::{LayoutView, OrderLineView, OrderView};

/// Checkout form. Guests supply an email; signed-in customers use theirs.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutForm {
    pub email: Option<String>,
}

/// Query parameters on the success redirect.
#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

/// Order confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/success.html")]
pub struct CheckoutSuccessTemplate {
    pub layout: LayoutView,
    /// Recorded order, when one exists for the session.
    pub order: Option<OrderView>,
    /// Lines read back from the provider when no order was recorded.
    pub provisional_lines: Vec<OrderLineView>,
    pub provisional_total: Option<String>,
    pub email: Option<String>,
    pub paid: bool,
}

/// Start checkout for the current cart.
#[instrument(skip(state, session, user, form))]
pub async fn start(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<CheckoutForm>,
) -> Result<Redirect> {
    let email = match &user {
        Some(user) => user.email.clone(),
        None => match form.email.as_deref().map(str::trim).map(Email::parse) {
            Some(Ok(email)) => email,
            Some(Err(e)) => {
                set_flash(&session, Flash::error(format!("Email: {e}"))).await;
                return Ok(Redirect::to("/cart"));
            }
            None => {
                set_flash(&session, Flash::error("Enter an email for your receipt.")).await;
                return Ok(Redirect::to("/cart"));
            }
        },
    };

    let owner = CartOwner::resolve(user.as_ref(), &session);
    match CheckoutService::new(&state).start_checkout(owner, &email).await {
        Ok(url) => {
            add_breadcrumb("checkout", "Redirecting to payment page", None);
            Ok(Redirect::to(&url))
        }
        Err(e) => {
            let message = e.into_flash_message()?;
            set_flash(&session, Flash::error(message)).await;
            Ok(Redirect::to("/cart"))
        }
    }
}

/// Order confirmation after the hosted payment page.
#[instrument(skip(state, session, user, query))]
pub async fn success(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<SuccessQuery>,
) -> Result<Response> {
    let Some(session_id) = query.session_id.filter(|s| !s.is_empty()) else {
        return Ok(Redirect::to("/cart").into_response());
    };

    let outcome = CheckoutService::new(&state)
        .complete_from_success(&session_id)
        .await?;

    let paid = match &outcome {
        CheckoutOutcome::Order { order, .. } => order.status.is_paid(),
        CheckoutOutcome::Provisional(p) => p.paid,
    };
    if paid && user.is_none() {
        clear_guest_cart(&session).await?;
    }

    let layout = LayoutView::load(&state, &session, user).await?;
    let template = match outcome {
        CheckoutOutcome::Order { order, items } => CheckoutSuccessTemplate {
            layout,
            email: Some(order.email.to_string()),
            order: Some(OrderView::new(&order, &items)),
            provisional_lines: Vec::new(),
            provisional_total: None,
            paid,
        },
        CheckoutOutcome::Provisional(p) => CheckoutSuccessTemplate {
            layout,
            order: None,
            provisional_lines: p
                .lines
                .iter()
                .map(|line| OrderLineView {
                    name: line.name.clone(),
                    size_name: None,
                    quantity: i32::try_from(line.quantity).unwrap_or(i32::MAX),
                    unit_price: format_amount(line.unit_price, p.currency),
                    line_total: format_amount(
                        line.unit_price * Decimal::from(line.quantity),
                        p.currency,
                    ),
                })
                .collect(),
            provisional_total: Some(format_amount(p.total, p.currency)),
            email: p.email.clone(),
            paid,
        },
    };
    Ok(template.into_response())
}

/// The buyer backed out of the payment page.
#[instrument(skip(session))]
pub async fn cancel(session: Session) -> Redirect {
    set_flash(
        &session,
        Flash::info("Checkout cancelled. Your cart is still here."),
    )
    .await;
    Redirect::to("/cart")
}

async fn clear_guest_cart(session: &Session) -> std::result::Result<(), CheckoutError> {
    let mut cart = GuestCart::load(session).await?;
    if !cart.is_empty() {
        cart.clear();
        cart.save(session).await?;
    }
    Ok(())
}
