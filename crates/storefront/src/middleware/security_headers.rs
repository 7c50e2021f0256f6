//! Security headers middleware for XSS, clickjacking, and isolation protection.
//!
//! Every response gets the same locked-down policy. The only loosening is
//! `form-action`, which must allow the redirect that follows `POST /checkout`
//! to land on the hosted checkout page.

use axum::{
    extract::Request,
    http::{
        HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

/// Origin of the provider's hosted checkout page.
const CHECKOUT_ORIGIN: &str = "https://checkout.stripe.com";

/// CSP directives, joined with `; `.
const CSP_DIRECTIVES: &[(&str, &str)] = &[
    ("default-src", "'none'"),
    ("script-src", "'self'"),
    ("style-src", "'self'"),
    ("font-src", "'self'"),
    ("img-src", "'self' data:"),
    ("connect-src", "'self'"),
    ("frame-src", "'none'"),
    ("object-src", "'none'"),
    ("base-uri", "'self'"),
    ("form-action", "'self' {checkout}"),
    ("frame-ancestors", "'none'"),
    ("upgrade-insecure-requests", ""),
];

/// Browser features the storefront never uses.
const DENIED_FEATURES: &[&str] = &[
    "accelerometer",
    "autoplay",
    "browsing-topics",
    "camera",
    "display-capture",
    "encrypted-media",
    "fullscreen",
    "geolocation",
    "gyroscope",
    "hid",
    "idle-detection",
    "magnetometer",
    "microphone",
    "midi",
    "payment",
    "picture-in-picture",
    "publickey-credentials-get",
    "screen-wake-lock",
    "serial",
    "sync-xhr",
    "usb",
    "xr-spatial-tracking",
];

/// Headers with fixed values.
const STATIC_HEADERS: &[(&str, &str)] = &[
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("cross-origin-embedder-policy", "require-corp"),
    ("x-dns-prefetch-control", "off"),
];

fn content_security_policy() -> String {
    CSP_DIRECTIVES
        .iter()
        .map(|(name, sources)| {
            let sources = sources.replace("{checkout}", CHECKOUT_ORIGIN);
            if sources.is_empty() {
                (*name).to_string()
            } else {
                format!("{name} {sources}")
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn permissions_policy() -> String {
    DENIED_FEATURES
        .iter()
        .map(|feature| format!("{feature}=()"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Add security headers to all responses.
///
/// Besides the tables above: `X-Frame-Options: DENY`, `nosniff`,
/// `Referrer-Policy: no-referrer`, and `Cache-Control: no-store` on pages.
/// Static files and uploads keep the caching headers they were served with.
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let is_asset = is_asset_path(request.uri().path());
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));

    if let Ok(csp) = HeaderValue::from_str(&content_security_policy()) {
        headers.insert(CONTENT_SECURITY_POLICY, csp);
    }
    if let Ok(policy) = HeaderValue::from_str(&permissions_policy()) {
        headers.insert(HeaderName::from_static("permissions-policy"), policy);
    }

    for (name, value) in STATIC_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    // Pages carry cart counts and flash messages
    if !is_asset {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, max-age=0"));
    }

    response
}

fn is_asset_path(path: &str) -> bool {
    path.starts_with("/static/") || path.starts_with("/uploads/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_paths() {
        assert!(is_asset_path("/static/css/main.css"));
        assert!(is_asset_path("/uploads/products/a.png"));
        assert!(!is_asset_path("/cart"));
        assert!(!is_asset_path("/staticky"));
    }

    #[test]
    fn test_csp_allows_checkout_redirect_only() {
        let csp = content_security_policy();
        assert!(csp.starts_with("default-src 'none'; "));
        assert!(csp.contains("form-action 'self' https://checkout.stripe.com;"));
        assert!(csp.ends_with("; upgrade-insecure-requests"));
        assert!(!csp.contains("{checkout}"));
    }

    #[test]
    fn test_permissions_policy_format() {
        let policy = permissions_policy();
        assert!(policy.starts_with("accelerometer=(), autoplay=()"));
        assert!(policy.contains("payment=()"));
    }
}
