//! Payment provider webhook endpoint.
//!
//! The body is read raw because the signature covers the exact bytes sent.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use tracing::instrument;

use crate::payments::PaymentError;
use crate::payments::webhook::SIGNATURE_HEADER;
use crate::services::checkout::CheckoutService;
use crate::state::AppState;

/// Receive a payment provider event.
///
/// Bad signatures get `400`. Processing failures get `500` so the provider
/// retries the delivery.
#[instrument(skip_all)]
pub async fn payments(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        tracing::warn!("webhook without signature header");
        return StatusCode::BAD_REQUEST;
    };

    let event = match state.payments().construct_event(&body, signature) {
        Ok(event) => event,
        Err(PaymentError::InvalidSignature(reason)) => {
            tracing::warn!(reason = %reason, "webhook signature rejected");
            return StatusCode::BAD_REQUEST;
        }
        Err(e) => {
            tracing::warn!(error = %e, "webhook payload rejected");
            return StatusCode::BAD_REQUEST;
        }
    };

    let kind = event.kind().to_string();
    match CheckoutService::new(&state).handle_event(event).await {
        Ok(()) => {
            tracing::info!(kind = %kind, "webhook processed");
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(kind = %kind, error = %e, "webhook processing failed");
            sentry::capture_error(&e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
