//! Hosted checkout.
//!
//! A pending order is written as soon as the provider session exists, keyed
//! by the session id. The order becomes `Paid` when either the success
//! redirect or the `checkout.session.completed` webhook reports payment,
//! whichever arrives first; the other finds the order already paid and does
//! nothing.

use meridian_core::{CurrencyCode, Email, Money, OrderStatus, UserId};
use meridian_db::models::{NewOrder, NewOrderItem, Order, OrderItem, ShippingAddress};
use meridian_db::orders::PaymentDetails;
use meridian_db::{CartRepository, OrderRepository, RepositoryError};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::instrument;

use super::cart::{CartError, CartOwner, CartService, CartSummary};
use super::email::OrderConfirmation;
use crate::payments::types::{SessionLineItem, ShippingDetails};
use crate::payments::{
    CheckoutLineItem, CheckoutMode, CheckoutSession, CheckoutSessionRequest, PaymentError,
    PaymentIntent, WebhookEvent,
};
use crate::state::AppState;

/// Placeholder the provider replaces with the session id on redirect.
const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Shown in place of payment provider errors.
pub const PAYMENT_UNAVAILABLE: &str =
    "We couldn't reach our payment provider. Nothing was charged; please try again shortly.";

/// Errors from checkout and subscription purchases.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Your cart is empty.")]
    EmptyCart,

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("An amount in your cart could not be charged.")]
    InvalidAmount,

    #[error("That product is not available as a subscription.")]
    NotSubscribable,

    #[error("This order has no active subscription.")]
    NoSubscription,

    #[error("Order not found.")]
    OrderNotFound,

    #[error("checkout session {0} has no redirect URL")]
    MissingRedirect(String),

    #[error("payment provider error: {0}")]
    Payment(#[from] PaymentError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl CheckoutError {
    /// Whether this is a server-side failure rather than a shopper mistake.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        match self {
            Self::Cart(err) => err.is_internal(),
            Self::MissingRedirect(_)
            | Self::Payment(_)
            | Self::Repository(_)
            | Self::Session(_) => true,
            _ => false,
        }
    }

    /// The message to flash to the shopper, or the error back when the
    /// request should fail instead.
    ///
    /// Payment provider failures are captured and logged here and flashed
    /// as [`PAYMENT_UNAVAILABLE`].
    ///
    /// # Errors
    ///
    /// Returns `self` for internal failures other than the provider's.
    pub fn into_flash_message(self) -> Result<String, Self> {
        match self {
            Self::Payment(err) => {
                let event_id = sentry::capture_error(&err);
                tracing::error!(
                    error = %err,
                    sentry_event_id = %event_id,
                    "Payment provider request failed"
                );
                Ok(PAYMENT_UNAVAILABLE.to_string())
            }
            e if e.is_internal() => Err(e),
            e => Ok(e.to_string()),
        }
    }
}

/// What the success page shows.
#[derive(Debug)]
pub enum CheckoutOutcome {
    /// The stored order, reloaded after any status change.
    Order { order: Order, items: Vec<OrderItem> },
    /// No stored order matches the session; built from the provider's copy.
    Provisional(ProvisionalOrder),
}

/// Order view reconstructed from a provider session.
#[derive(Debug, Clone)]
pub struct ProvisionalOrder {
    pub session_id: String,
    pub email: Option<String>,
    pub currency: CurrencyCode,
    pub lines: Vec<ProvisionalLine>,
    pub total: Decimal,
    pub paid: bool,
}

#[derive(Debug, Clone)]
pub struct ProvisionalLine {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl ProvisionalOrder {
    #[must_use]
    pub fn from_session(session: &CheckoutSession) -> Self {
        let currency: CurrencyCode = session
            .currency
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or_default();
        let lines: Vec<ProvisionalLine> = session
            .items()
            .iter()
            .map(|item| provisional_line(item, currency))
            .collect();
        let total = session.amount_total.map_or_else(
            || {
                lines
                    .iter()
                    .map(|l| l.unit_price * Decimal::from(l.quantity))
                    .sum()
            },
            |minor| Money::from_minor_units(minor, currency).amount,
        );

        Self {
            session_id: session.id.clone(),
            email: session.email().map(str::to_string),
            currency,
            lines,
            total,
            paid: session.is_paid(),
        }
    }
}

fn provisional_line(item: &SessionLineItem, currency: CurrencyCode) -> ProvisionalLine {
    ProvisionalLine {
        name: item
            .description
            .clone()
            .unwrap_or_else(|| "Item".to_string()),
        quantity: item.quantity.unwrap_or(1),
        unit_price: Money::from_minor_units(item.unit_amount(), currency).amount,
    }
}

/// Checkout operations over shared application state.
pub struct CheckoutService<'a> {
    state: &'a AppState,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Create a hosted session for the cart and record a pending order.
    ///
    /// Returns the provider URL to redirect the buyer to.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` or `CheckoutError::Cart` when the
    /// cart cannot be bought as is, and `CheckoutError::Payment` if the
    /// provider rejects the session.
    #[instrument(skip(self, owner, email), fields(user_id = ?owner.user_id()))]
    pub async fn start_checkout(
        &self,
        owner: CartOwner<'_>,
        email: &Email,
    ) -> Result<String, CheckoutError> {
        let settings = self.state.store_settings().await?;
        let summary = CartService::new(self.state.pool())
            .summary(owner, &settings.pricing_rules())
            .await?;

        if summary.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        if let Some(problem) = summary.first_problem() {
            return Err(problem.into());
        }

        let user_id = owner.user_id();
        let request = CheckoutSessionRequest {
            mode: CheckoutMode::Payment,
            currency: settings.currency.provider_code(),
            line_items: payment_line_items(&summary, settings.currency)?,
            customer_email: email.as_str().to_string(),
            client_reference_id: reference_for(user_id),
            success_url: self.success_url(),
            cancel_url: self.state.config().url_for("/checkout/cancel"),
            metadata: vec![("customer".to_string(), reference_for(user_id))],
            collect_shipping_address: true,
            allow_promotion_codes: false,
        };

        let session = self.state.payments().create_checkout_session(&request).await?;
        let url = session
            .url
            .clone()
            .ok_or_else(|| CheckoutError::MissingRedirect(session.id.clone()))?;

        let totals = summary.totals;
        let order = OrderRepository::new(self.state.pool())
            .create_pending(&NewOrder {
                user_id,
                email: email.clone(),
                subtotal: totals.subtotal,
                shipping: totals.shipping,
                tax: totals.tax,
                total: totals.total,
                currency: settings.currency.code().to_string(),
                checkout_session_id: session.id.clone(),
                items: summary
                    .items
                    .iter()
                    .map(|item| NewOrderItem {
                        product_id: item.product_id,
                        product_name: item.product_name.clone(),
                        size_name: item.size_name.clone(),
                        unit_price: item.unit_price,
                        quantity: i32::try_from(item.quantity).unwrap_or(i32::MAX),
                    })
                    .collect(),
            })
            .await?;

        tracing::info!(
            order_id = %order.id,
            session_id = %session.id,
            total = %totals.total,
            "pending order created"
        );
        Ok(url)
    }

    /// Resolve the success redirect for a session.
    ///
    /// Finalizes the order if the provider reports it paid.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Payment` if the session cannot be retrieved.
    #[instrument(skip(self))]
    pub async fn complete_from_success(
        &self,
        session_id: &str,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let session = self
            .state
            .payments()
            .retrieve_checkout_session(session_id)
            .await?;
        let orders = OrderRepository::new(self.state.pool());

        let Some(order) = orders.get_by_checkout_session(&session.id).await? else {
            tracing::warn!(session_id = %session.id, "no order for checkout session");
            return Ok(CheckoutOutcome::Provisional(ProvisionalOrder::from_session(
                &session,
            )));
        };

        if session.is_paid() {
            self.finalize_paid(&order, &payment_details(&session)).await?;
        }

        let order = orders
            .get_by_id(order.id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;
        let items = orders.items(order.id).await?;
        Ok(CheckoutOutcome::Order { order, items })
    }

    /// Mark an order paid, clear the buyer's saved cart and send the
    /// confirmation email.
    ///
    /// Returns `false` if the order was already paid.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if the order cannot be updated.
    /// Email failures are logged, not returned.
    pub async fn finalize_paid(
        &self,
        order: &Order,
        details: &PaymentDetails,
    ) -> Result<bool, CheckoutError> {
        let orders = OrderRepository::new(self.state.pool());
        if !orders.mark_paid(order.id, details).await? {
            tracing::debug!(order_id = %order.id, "order already finalized");
            return Ok(false);
        }
        tracing::info!(order_id = %order.id, total = %order.total, "order paid");

        if let Some(user_id) = order.user_id {
            CartRepository::new(self.state.pool())
                .clear_for_user(user_id)
                .await?;
        }

        self.send_confirmation(order.id).await;
        Ok(true)
    }

    /// Apply a verified webhook event.
    ///
    /// Events that match no order are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if an order cannot be updated.
    #[instrument(skip(self, event), fields(kind = event.kind()))]
    pub async fn handle_event(&self, event: WebhookEvent) -> Result<(), CheckoutError> {
        let orders = OrderRepository::new(self.state.pool());

        match event {
            WebhookEvent::CheckoutCompleted(session) => {
                let Some(order) = orders.get_by_checkout_session(&session.id).await? else {
                    tracing::warn!(session_id = %session.id, "no order for completed session");
                    return Ok(());
                };
                if session.is_paid() {
                    self.finalize_paid(&order, &payment_details(&session)).await?;
                } else if let Some(intent) = session.payment_intent.as_deref() {
                    // Delayed payment methods settle later via payment_intent.succeeded
                    orders.set_payment_intent(order.id, intent).await?;
                }
            }
            WebhookEvent::CheckoutExpired(session) => {
                let Some(order) = orders.get_by_checkout_session(&session.id).await? else {
                    tracing::warn!(session_id = %session.id, "no order for expired session");
                    return Ok(());
                };
                self.move_if_pending(&order, OrderStatus::Cancelled).await?;
            }
            WebhookEvent::PaymentSucceeded(intent) => {
                let Some(order) = self.order_for_intent(&intent).await? else {
                    return Ok(());
                };
                let details = PaymentDetails {
                    payment_intent_id: Some(intent.id.clone()),
                    ..PaymentDetails::default()
                };
                self.finalize_paid(&order, &details).await?;
            }
            WebhookEvent::PaymentFailed(intent) => {
                let Some(order) = self.order_for_intent(&intent).await? else {
                    return Ok(());
                };
                let reason = intent
                    .last_payment_error
                    .as_ref()
                    .and_then(|e| e.message.as_deref())
                    .unwrap_or("unknown");
                tracing::info!(order_id = %order.id, reason, "payment failed");
                self.move_if_pending(&order, OrderStatus::PaymentFailed)
                    .await?;
            }
            WebhookEvent::Ignored(kind) => {
                tracing::debug!(kind = %kind, "ignoring webhook event");
            }
        }

        Ok(())
    }

    async fn order_for_intent(
        &self,
        intent: &PaymentIntent,
    ) -> Result<Option<Order>, CheckoutError> {
        let order = OrderRepository::new(self.state.pool())
            .get_by_payment_intent(&intent.id)
            .await?;
        if order.is_none() {
            tracing::warn!(payment_intent = %intent.id, "no order for payment intent");
        }
        Ok(order)
    }

    async fn move_if_pending(&self, order: &Order, next: OrderStatus) -> Result<(), CheckoutError> {
        if order.status != OrderStatus::Pending {
            return Ok(());
        }
        match OrderRepository::new(self.state.pool())
            .update_status(order.id, next)
            .await
        {
            Ok(_) => {
                tracing::info!(order_id = %order.id, status = next.as_str(), "order updated");
                Ok(())
            }
            // Another delivery moved it first
            Err(RepositoryError::Conflict(msg)) => {
                tracing::debug!(order_id = %order.id, %msg, "status change skipped");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Send the confirmation email in the background.
    async fn send_confirmation(&self, order_id: meridian_core::OrderId) {
        let Some(email) = self.state.email().cloned() else {
            return;
        };

        let orders = OrderRepository::new(self.state.pool());
        let loaded = async {
            let order = orders.get_by_id(order_id).await?;
            let items = orders.items(order_id).await?;
            Ok::<_, RepositoryError>(order.map(|o| (o, items)))
        }
        .await;

        let (order, items) = match loaded {
            Ok(Some(found)) => found,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(order_id = %order_id, error = %e, "failed to load order for email");
                return;
            }
        };

        let store_name = match self.state.store_settings().await {
            Ok(settings) => settings.store_name.clone(),
            Err(_) => "Meridian".to_string(),
        };
        let order_url = self
            .state
            .config()
            .url_for(&format!("/account/orders/{}", order.id));
        let confirmation = OrderConfirmation::new(&order, &items, &store_name, order_url);
        let to = order.email.as_str().to_string();

        tokio::spawn(async move {
            if let Err(e) = email.send_order_confirmation(&to, &confirmation).await {
                tracing::error!(order_id = %order_id, error = %e, "failed to send order confirmation");
            }
        });
    }

    fn success_url(&self) -> String {
        self.state
            .config()
            .url_for(&format!("/checkout/success?session_id={SESSION_ID_PLACEHOLDER}"))
    }
}

/// `client_reference_id` for a buyer.
pub(crate) fn reference_for(user_id: Option<UserId>) -> String {
    user_id.map_or_else(|| "guest".to_string(), |id| id.to_string())
}

/// Provider line items for a cart: one per product line, then shipping and
/// tax as their own lines so the provider total matches ours.
fn payment_line_items(
    summary: &CartSummary,
    currency: CurrencyCode,
) -> Result<Vec<CheckoutLineItem>, CheckoutError> {
    let minor = |amount: Decimal| {
        Money::new(amount, currency)
            .to_minor_units()
            .ok_or(CheckoutError::InvalidAmount)
    };

    let mut lines = Vec::with_capacity(summary.items.len() + 2);
    for item in &summary.items {
        let name = match &item.size_name {
            Some(size) => format!("{} ({size})", item.product_name),
            None => item.product_name.clone(),
        };
        lines.push(CheckoutLineItem::Amount {
            name,
            unit_amount: minor(item.unit_price)?,
            quantity: item.quantity,
        });
    }

    let totals = summary.totals;
    if totals.shipping > Decimal::ZERO {
        lines.push(CheckoutLineItem::Amount {
            name: "Shipping".to_string(),
            unit_amount: minor(totals.shipping)?,
            quantity: 1,
        });
    }
    if totals.tax > Decimal::ZERO {
        lines.push(CheckoutLineItem::Amount {
            name: "Tax".to_string(),
            unit_amount: minor(totals.tax)?,
            quantity: 1,
        });
    }

    Ok(lines)
}

/// Payment details to record from a completed session.
pub(crate) fn payment_details(session: &CheckoutSession) -> PaymentDetails {
    PaymentDetails {
        payment_intent_id: session.payment_intent.clone(),
        subscription_id: session.subscription.clone(),
        shipping: session.shipping().and_then(shipping_address),
    }
}

fn shipping_address(details: &ShippingDetails) -> Option<ShippingAddress> {
    let address = details.address.as_ref()?;
    Some(ShippingAddress {
        name: details.name.clone(),
        line1: address.line1.clone()?,
        line2: address.line2.clone().filter(|l| !l.is_empty()),
        city: address.city.clone(),
        postal_code: address.postal_code.clone(),
        country: address.country.clone(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use meridian_core::ProductId;
    use meridian_core::pricing::PricingRules;

    use super::*;
    use crate::services::cart::CartItem;

    fn item(name: &str, size: Option<&str>, cents: i64, quantity: u32) -> CartItem {
        CartItem {
            product_id: ProductId::new(1),
            product_name: name.to_string(),
            product_slug: "slug".to_string(),
            image_path: None,
            unit_price: Decimal::new(cents, 2),
            size_id: None,
            size_name: size.map(str::to_string),
            quantity,
            stock: 10,
            is_active: true,
        }
    }

    fn session(json: &str) -> CheckoutSession {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_provider_errors_become_generic_flash() {
        let err = CheckoutError::Payment(PaymentError::Api {
            status: 402,
            message: "card_declined: sk_live details".to_string(),
        });
        assert_eq!(err.into_flash_message().unwrap(), PAYMENT_UNAVAILABLE);

        assert_eq!(
            CheckoutError::EmptyCart.into_flash_message().unwrap(),
            "Your cart is empty."
        );
        assert!(matches!(
            CheckoutError::Repository(RepositoryError::NotFound).into_flash_message(),
            Err(CheckoutError::Repository(_))
        ));
    }

    #[test]
    fn test_line_items_include_shipping_and_tax() {
        let rules = PricingRules {
            flat_shipping_rate: Decimal::new(500, 2),
            free_shipping_threshold: None,
            tax_rate_percent: Decimal::new(10, 0),
        };
        let summary = CartSummary::new(
            vec![item("Linen Shirt", Some("M"), 4000, 2)],
            &rules,
        );
        let lines = payment_line_items(&summary, CurrencyCode::USD).unwrap();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            CheckoutLineItem::Amount {
                name: "Linen Shirt (M)".to_string(),
                unit_amount: 4000,
                quantity: 2,
            }
        );
        assert!(matches!(&lines[1], CheckoutLineItem::Amount { name, unit_amount: 500, .. } if name == "Shipping"));
        assert!(matches!(&lines[2], CheckoutLineItem::Amount { name, unit_amount: 800, .. } if name == "Tax"));

        let provider_total: i64 = lines
            .iter()
            .map(|l| match l {
                CheckoutLineItem::Amount {
                    unit_amount,
                    quantity,
                    ..
                } => unit_amount * i64::from(*quantity),
                CheckoutLineItem::Price { .. } => 0,
            })
            .sum();
        assert_eq!(
            Decimal::from(provider_total),
            summary.totals.total * Decimal::ONE_HUNDRED
        );
    }

    #[test]
    fn test_free_shipping_and_zero_tax_add_no_lines() {
        let rules = PricingRules {
            flat_shipping_rate: Decimal::new(500, 2),
            free_shipping_threshold: Some(Decimal::new(50, 0)),
            tax_rate_percent: Decimal::ZERO,
        };
        let summary = CartSummary::new(vec![item("Boots", None, 12000, 1)], &rules);
        let lines = payment_line_items(&summary, CurrencyCode::USD).unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_provisional_order_from_session() {
        let session = session(
            r#"{
                "id": "cs_test_9",
                "payment_status": "paid",
                "currency": "usd",
                "amount_total": 4500,
                "customer_details": {"email": "guest@example.com"},
                "line_items": {"data": [
                    {"description": "Canvas Tote", "quantity": 2, "amount_total": 4000},
                    {"description": "Shipping", "quantity": 1, "price": {"unit_amount": 500}}
                ]}
            }"#,
        );
        let view = ProvisionalOrder::from_session(&session);
        assert!(view.paid);
        assert_eq!(view.email.as_deref(), Some("guest@example.com"));
        assert_eq!(view.lines.len(), 2);
        assert_eq!(view.lines[0].unit_price, Decimal::new(2000, 2));
        assert_eq!(view.total, Decimal::new(4500, 2));
    }

    #[test]
    fn test_payment_details_from_session() {
        let session = session(
            r#"{
                "id": "cs_1",
                "payment_intent": "pi_1",
                "collected_information": {"shipping_details": {
                    "name": "Ada Byron",
                    "address": {"line1": "12 Harbour St", "line2": "", "city": "Bristol",
                                "postal_code": "BS1 4RN", "country": "GB"}
                }}
            }"#,
        );
        let details = payment_details(&session);
        assert_eq!(details.payment_intent_id.as_deref(), Some("pi_1"));
        let shipping = details.shipping.unwrap();
        assert_eq!(shipping.line1, "12 Harbour St");
        assert_eq!(shipping.line2, None);
    }

    #[test]
    fn test_address_without_street_is_dropped() {
        let details = ShippingDetails {
            name: Some("Ada".to_string()),
            address: None,
        };
        assert!(shipping_address(&details).is_none());
    }

    #[test]
    fn test_error_visibility() {
        assert!(!CheckoutError::EmptyCart.is_internal());
        assert!(!CheckoutError::Cart(CartError::SizeRequired).is_internal());
        assert!(CheckoutError::Payment(PaymentError::Parse("x".into())).is_internal());
        assert_eq!(reference_for(None), "guest");
        assert_eq!(reference_for(Some(UserId::new(5))), "5");
    }
}
