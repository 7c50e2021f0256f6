//! Payment provider REST client.
//!
//! Checkout happens on the provider's hosted page. The storefront creates a
//! checkout session, redirects the buyer to it, and learns the outcome from
//! the success redirect and from signed webhooks.
//!
//! # Endpoints
//!
//! - `POST /v1/checkout/sessions` - create a hosted session
//! - `GET /v1/checkout/sessions/{id}` - retrieve a session with line items
//! - `DELETE /v1/subscriptions/{id}` - cancel a subscription

pub mod types;
pub mod webhook;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::instrument;

use crate::config::PaymentsConfig;

pub use types::{
    CheckoutLineItem, CheckoutMode, CheckoutSession, CheckoutSessionRequest, PaymentIntent,
    Subscription,
};
pub use webhook::WebhookEvent;

/// Errors that can occur when interacting with the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response or event.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Webhook signature did not verify.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
}

/// Payment provider API client.
#[derive(Clone)]
pub struct PaymentsClient {
    client: reqwest::Client,
    api_base: String,
    webhook_secret: SecretString,
}

impl PaymentsClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentsConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| PaymentError::Parse(format!("Invalid API key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            webhook_secret: config.webhook_secret.clone(),
        })
    }

    /// Create a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the provider rejects it.
    #[instrument(skip(self, request), fields(mode = request.mode.as_str()))]
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);
        let response = self
            .client
            .post(&url)
            .form(&request.to_form())
            .send()
            .await?;

        let session: CheckoutSession = Self::parse(response).await?;
        tracing::info!(session_id = %session.id, "checkout session created");
        Ok(session)
    }

    /// Retrieve a checkout session with its line items expanded.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the session does not exist.
    #[instrument(skip(self))]
    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = format!(
            "{}/v1/checkout/sessions/{}?expand%5B%5D=line_items",
            self.api_base,
            urlencoding::encode(session_id)
        );
        let response = self.client.get(&url).send().await?;
        Self::parse(response).await
    }

    /// Cancel a subscription immediately.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the subscription does not exist.
    #[instrument(skip(self))]
    pub async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, PaymentError> {
        let url = format!(
            "{}/v1/subscriptions/{}",
            self.api_base,
            urlencoding::encode(subscription_id)
        );
        let response = self.client.delete(&url).send().await?;
        let subscription: Subscription = Self::parse(response).await?;
        tracing::info!(subscription_id = %subscription.id, "subscription cancelled");
        Ok(subscription)
    }

    /// Verify and parse a webhook delivery.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` if verification fails or
    /// `PaymentError::Parse` if the body is not a valid event.
    pub fn construct_event(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        webhook::verify_signature(
            payload,
            signature_header,
            self.webhook_secret.expose_secret(),
            chrono::Utc::now().timestamp(),
            webhook::DEFAULT_TOLERANCE_SECS,
        )?;
        webhook::parse_event(payload)
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<types::ApiErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or(body);
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| PaymentError::Parse(e.to_string()))
    }
}
