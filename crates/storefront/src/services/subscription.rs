//! Subscription purchases.
//!
//! Products with a provider price id can be bought as a recurring
//! subscription. The first period is recorded as a one-item order; the
//! subscription id is stored on it once checkout completes.

use meridian_core::{OrderId, OrderStatus};
use meridian_db::models::{NewOrder, NewOrderItem};
use meridian_db::{OrderRepository, ProductRepository};
use rust_decimal::Decimal;
use tracing::instrument;

use super::checkout::{CheckoutError, reference_for};
use crate::models::CurrentUser;
use crate::payments::{CheckoutLineItem, CheckoutMode, CheckoutSessionRequest};
use crate::services::cart::CartError;
use crate::state::AppState;

/// Result of a customer cancelling a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancellation {
    /// The order had not shipped and is now cancelled.
    OrderCancelled,
    /// The subscription stopped but the order had already shipped.
    SubscriptionOnly,
}

pub struct SubscriptionService<'a> {
    state: &'a AppState,
}

impl<'a> SubscriptionService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Start a subscription checkout for one product.
    ///
    /// Returns the provider URL to redirect the buyer to.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NotSubscribable` if the product has no
    /// subscription price, `CheckoutError::Cart` if it is inactive or out of
    /// stock, and `CheckoutError::Payment` if the provider rejects the session.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn start(&self, user: &CurrentUser, slug: &str) -> Result<String, CheckoutError> {
        let product = ProductRepository::new(self.state.pool())
            .get_by_slug(slug)
            .await?
            .ok_or(CartError::ProductNotFound)?;
        if !product.is_active {
            return Err(CartError::ProductUnavailable(product.name).into());
        }
        let Some(price_id) = product.subscription_price_id.clone() else {
            return Err(CheckoutError::NotSubscribable);
        };
        if !product.in_stock() {
            return Err(CartError::InsufficientStock {
                product: product.name,
                available: 0,
            }
            .into());
        }

        let settings = self.state.store_settings().await?;
        let config = self.state.config();
        let reference = reference_for(Some(user.id));
        let request = CheckoutSessionRequest {
            mode: CheckoutMode::Subscription,
            currency: settings.currency.provider_code(),
            line_items: vec![CheckoutLineItem::Price {
                price_id,
                quantity: 1,
            }],
            customer_email: user.email.as_str().to_string(),
            client_reference_id: reference.clone(),
            success_url: config.url_for("/checkout/success?session_id={CHECKOUT_SESSION_ID}"),
            cancel_url: config.url_for(&format!("/products/{}", product.slug)),
            metadata: vec![
                ("customer".to_string(), reference),
                ("product_id".to_string(), product.id.to_string()),
            ],
            collect_shipping_address: true,
            allow_promotion_codes: false,
        };

        let session = self
            .state
            .payments()
            .create_checkout_session(&request)
            .await?;
        let url = session
            .url
            .clone()
            .ok_or_else(|| CheckoutError::MissingRedirect(session.id.clone()))?;

        // The provider bills the recurring price; shipping and tax are
        // configured on that price, not added here.
        let order = OrderRepository::new(self.state.pool())
            .create_pending(&NewOrder {
                user_id: Some(user.id),
                email: user.email.clone(),
                subtotal: product.price,
                shipping: Decimal::ZERO,
                tax: Decimal::ZERO,
                total: product.price,
                currency: settings.currency.code().to_string(),
                checkout_session_id: session.id.clone(),
                items: vec![NewOrderItem {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    size_name: None,
                    unit_price: product.price,
                    quantity: 1,
                }],
            })
            .await?;

        tracing::info!(
            order_id = %order.id,
            session_id = %session.id,
            product_id = %product.id,
            "pending subscription order created"
        );
        Ok(url)
    }

    /// Cancel the subscription attached to one of the customer's orders.
    ///
    /// The order itself is cancelled only if it has not shipped yet.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` if the order is not the
    /// customer's, `CheckoutError::NoSubscription` if it has no subscription,
    /// and `CheckoutError::Payment` if the provider call fails.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn cancel(
        &self,
        user: &CurrentUser,
        order_id: OrderId,
    ) -> Result<Cancellation, CheckoutError> {
        let orders = OrderRepository::new(self.state.pool());
        let order = orders
            .get_for_user(order_id, user.id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;
        let subscription_id = order
            .subscription_id
            .as_deref()
            .ok_or(CheckoutError::NoSubscription)?;

        self.state
            .payments()
            .cancel_subscription(subscription_id)
            .await?;

        if !order.status.can_transition_to(OrderStatus::Cancelled) {
            return Ok(Cancellation::SubscriptionOnly);
        }
        orders.update_status(order.id, OrderStatus::Cancelled).await?;
        tracing::info!(order_id = %order.id, "subscription order cancelled");
        Ok(Cancellation::OrderCancelled)
    }
}
