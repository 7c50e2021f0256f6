//! Integration tests for payment webhook handling.
//!
//! These tests run the storefront's signing, verification and parsing code
//! against realistic deliveries, without a provider or database.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use meridian_core::CurrencyCode;
use meridian_storefront::payments::webhook::{
    DEFAULT_TOLERANCE_SECS, parse_event, sign, verify_signature,
};
use meridian_storefront::payments::{PaymentError, WebhookEvent};
use meridian_storefront::services::checkout::ProvisionalOrder;
use rust_decimal::Decimal;
use serde_json::json;

const SECRET: &str = "whsec_integration_test";

fn completed_event() -> Vec<u8> {
    json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_test_123",
                "status": "complete",
                "payment_status": "paid",
                "mode": "payment",
                "client_reference_id": "42",
                "customer_details": { "email": "buyer@example.com", "name": "Ada Buyer" },
                "currency": "usd",
                "amount_subtotal": 9900,
                "amount_total": 10399,
                "metadata": { "order_id": "7" },
                "line_items": {
                    "data": [
                        {
                            "description": "Linen Shirt",
                            "quantity": 2,
                            "amount_total": 9900,
                            "price": { "id": "price_1", "unit_amount": 4950 }
                        }
                    ]
                }
            }
        }
    })
    .to_string()
    .into_bytes()
}

fn header_for(payload: &[u8], timestamp: i64) -> String {
    let signature = sign(payload, &timestamp.to_string(), SECRET).unwrap();
    format!("t={timestamp},v1={signature}")
}

// =============================================================================
// Signature Verification
// =============================================================================

#[test]
fn test_signed_delivery_verifies() {
    let payload = completed_event();
    let now = chrono::Utc::now().timestamp();
    let header = header_for(&payload, now);

    verify_signature(&payload, &header, SECRET, now, DEFAULT_TOLERANCE_SECS).unwrap();
}

#[test]
fn test_tampered_body_is_rejected() {
    let payload = completed_event();
    let now = chrono::Utc::now().timestamp();
    let header = header_for(&payload, now);

    let mut tampered = payload;
    tampered.extend_from_slice(b" ");

    let result = verify_signature(&tampered, &header, SECRET, now, DEFAULT_TOLERANCE_SECS);
    assert!(matches!(result, Err(PaymentError::InvalidSignature(_))));
}

#[test]
fn test_stale_delivery_is_rejected() {
    let payload = completed_event();
    let now = chrono::Utc::now().timestamp();
    let header = header_for(&payload, now - DEFAULT_TOLERANCE_SECS - 1);

    let result = verify_signature(&payload, &header, SECRET, now, DEFAULT_TOLERANCE_SECS);
    assert!(matches!(result, Err(PaymentError::InvalidSignature(_))));
}

#[test]
fn test_any_matching_signature_is_accepted() {
    // Secret rotation sends one signature per active secret
    let payload = completed_event();
    let now = chrono::Utc::now().timestamp();
    let good = sign(&payload, &now.to_string(), SECRET).unwrap();
    let header = format!("t={now},v1={},v1={good}", "0".repeat(good.len()));

    verify_signature(&payload, &header, SECRET, now, DEFAULT_TOLERANCE_SECS).unwrap();
}

#[test]
fn test_wrong_secret_is_rejected() {
    let payload = completed_event();
    let now = chrono::Utc::now().timestamp();
    let header = header_for(&payload, now);

    let result = verify_signature(&payload, &header, "whsec_other", now, DEFAULT_TOLERANCE_SECS);
    assert!(result.is_err());
}

// =============================================================================
// Event Parsing
// =============================================================================

#[test]
fn test_completed_event_builds_provisional_order() {
    let event = parse_event(&completed_event()).unwrap();
    assert_eq!(event.kind(), "checkout.session.completed");

    let WebhookEvent::CheckoutCompleted(session) = event else {
        panic!("expected a completed checkout, got {event:?}");
    };
    assert!(session.is_paid());
    assert_eq!(session.metadata.get("order_id").map(String::as_str), Some("7"));

    let order = ProvisionalOrder::from_session(&session);
    assert_eq!(order.session_id, "cs_test_123");
    assert_eq!(order.email.as_deref(), Some("buyer@example.com"));
    assert_eq!(order.currency, CurrencyCode::USD);
    assert_eq!(order.total, Decimal::new(10399, 2));
    assert!(order.paid);

    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].name, "Linen Shirt");
    assert_eq!(order.lines[0].quantity, 2);
    assert_eq!(order.lines[0].unit_price, Decimal::new(4950, 2));
}

#[test]
fn test_unhandled_event_is_ignored() {
    let payload = json!({
        "id": "evt_2",
        "type": "customer.created",
        "data": { "object": { "id": "cus_1" } }
    })
    .to_string();

    let event = parse_event(payload.as_bytes()).unwrap();
    assert!(matches!(event, WebhookEvent::Ignored(ref kind) if kind == "customer.created"));
}

#[test]
fn test_malformed_event_is_a_parse_error() {
    let result = parse_event(b"{\"type\": \"checkout.session.completed\"}");
    assert!(matches!(result, Err(PaymentError::Parse(_))));
}
