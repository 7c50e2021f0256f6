//! Webhook signature verification and event parsing.
//!
//! The provider signs each delivery with a header of the form
//! `t=<unix timestamp>,v1=<hex signature>[,v1=<hex signature>...]`, where
//! each signature is `HMAC-SHA256(secret, "{t}.{raw body}")`. Several `v1`
//! entries appear while a secret is being rolled.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use super::PaymentError;
use super::types::{CheckoutSession, PaymentIntent};

type HmacSha256 = Hmac<Sha256>;

/// Signature header name.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum age of a delivery, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// A webhook event the storefront acts on.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    CheckoutCompleted(CheckoutSession),
    CheckoutExpired(CheckoutSession),
    PaymentSucceeded(PaymentIntent),
    PaymentFailed(PaymentIntent),
    /// Any other event type; acknowledged and dropped.
    Ignored(String),
}

impl WebhookEvent {
    /// Event type name, for logging.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::CheckoutCompleted(_) => "checkout.session.completed",
            Self::CheckoutExpired(_) => "checkout.session.expired",
            Self::PaymentSucceeded(_) => "payment_intent.succeeded",
            Self::PaymentFailed(_) => "payment_intent.payment_failed",
            Self::Ignored(kind) => kind,
        }
    }
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

/// Verify a delivery's signature header against the raw request body.
///
/// # Errors
///
/// Returns `PaymentError::InvalidSignature` if the header is malformed, the
/// timestamp is outside `tolerance_secs` of `now`, or no signature matches.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), PaymentError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| PaymentError::InvalidSignature("missing timestamp".into()))?;
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| PaymentError::InvalidSignature("invalid timestamp".into()))?;

    if signatures.is_empty() {
        return Err(PaymentError::InvalidSignature("missing v1 signature".into()));
    }

    if now.abs_diff(ts) > tolerance_secs.unsigned_abs() {
        return Err(PaymentError::InvalidSignature(
            "timestamp outside tolerance".into(),
        ));
    }

    let expected = sign(payload, timestamp, secret)?;

    if signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature("signature mismatch".into()))
    }
}

/// Hex HMAC for a timestamp and payload.
///
/// # Errors
///
/// Returns `PaymentError::InvalidSignature` if the secret cannot key the MAC.
pub fn sign(payload: &[u8], timestamp: &str, secret: &str) -> Result<String, PaymentError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Parse a verified delivery into a [`WebhookEvent`].
///
/// # Errors
///
/// Returns `PaymentError::Parse` if the body is not a well-formed event.
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, PaymentError> {
    let raw: RawEvent =
        serde_json::from_slice(payload).map_err(|e| PaymentError::Parse(e.to_string()))?;
    let object = raw.data.object;

    let event = match raw.kind.as_str() {
        "checkout.session.completed" => WebhookEvent::CheckoutCompleted(from_object(object)?),
        "checkout.session.expired" => WebhookEvent::CheckoutExpired(from_object(object)?),
        "payment_intent.succeeded" => WebhookEvent::PaymentSucceeded(from_object(object)?),
        "payment_intent.payment_failed" => WebhookEvent::PaymentFailed(from_object(object)?),
        _ => WebhookEvent::Ignored(raw.kind),
    };

    Ok(event)
}

fn from_object<T: serde::de::DeserializeOwned>(object: serde_json::Value) -> Result<T, PaymentError> {
    serde_json::from_value(object).map_err(|e| PaymentError::Parse(e.to_string()))
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_k3J9xQ2mP7vL";
    const NOW: i64 = 1_760_000_000;

    fn header_for(payload: &[u8], ts: i64) -> String {
        format!("t={ts},v1={}", sign(payload, &ts.to_string(), SECRET).unwrap())
    }

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"type":"ping"}"#;
        let header = header_for(payload, NOW);
        assert!(verify_signature(payload, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS).is_ok());
    }

    #[test]
    fn test_any_of_several_signatures_is_accepted() {
        let payload = br#"{"type":"ping"}"#;
        let good = sign(payload, &NOW.to_string(), SECRET).unwrap();
        let header = format!("t={NOW},v1={},v1={good}", "0".repeat(64));
        assert!(verify_signature(payload, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS).is_ok());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let header = header_for(br#"{"amount":100}"#, NOW);
        let result = verify_signature(
            br#"{"amount":999}"#,
            &header,
            SECRET,
            NOW,
            DEFAULT_TOLERANCE_SECS,
        );
        assert!(matches!(result, Err(PaymentError::InvalidSignature(_))));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"{}";
        let header = header_for(payload, NOW - 301);
        let result = verify_signature(payload, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS);
        assert!(matches!(result, Err(PaymentError::InvalidSignature(_))));
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        for ts in [i64::MIN, i64::MAX] {
            let header = format!("t={ts},v1=00");
            let result = verify_signature(b"{}", &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS);
            assert!(matches!(result, Err(PaymentError::InvalidSignature(_))));
        }
    }

    #[test]
    fn test_malformed_header_rejected() {
        for header in ["", "v1=abc", "t=abc,v1=def", &format!("t={NOW}")] {
            let result = verify_signature(b"{}", header, SECRET, NOW, DEFAULT_TOLERANCE_SECS);
            assert!(result.is_err(), "header {header:?} should be rejected");
        }
    }

    #[test]
    fn test_parse_checkout_completed() {
        let payload = br#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_1", "payment_status": "paid", "payment_intent": "pi_1"}}
        }"#;
        match parse_event(payload).unwrap() {
            WebhookEvent::CheckoutCompleted(session) => {
                assert_eq!(session.id, "cs_1");
                assert!(session.is_paid());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_parse_payment_failed() {
        let payload = br#"{
            "type": "payment_intent.payment_failed",
            "data": {"object": {"id": "pi_9", "status": "requires_payment_method",
                     "last_payment_error": {"message": "Your card was declined."}}}
        }"#;
        let event = parse_event(payload).unwrap();
        assert_eq!(event.kind(), "payment_intent.payment_failed");
        assert!(matches!(event, WebhookEvent::PaymentFailed(pi) if pi.id == "pi_9"));
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        let payload = br#"{"type": "customer.created", "data": {"object": {}}}"#;
        let event = parse_event(payload).unwrap();
        assert!(matches!(event, WebhookEvent::Ignored(ref kind) if kind == "customer.created"));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        assert!(matches!(parse_event(b"not json"), Err(PaymentError::Parse(_))));
    }
}
