//! Integration tests for Meridian.
//!
//! # Running Tests
//!
//! ```bash
//! # Cross-crate tests (no services needed)
//! cargo test -p meridian-integration-tests
//!
//! # HTTP tests against running servers
//! cargo run -p meridian-cli -- migrate
//! cargo run -p meridian-storefront &
//! cargo run -p meridian-admin &
//! cargo test -p meridian-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `checkout_flow` - Pricing, cart and order lifecycle rules used by checkout
//! - `payment_webhooks` - Webhook signing, verification and event parsing
//! - `admin_forms` - Back-office form validation
//! - `storefront_http` - Storefront pages over HTTP (ignored by default)
//! - `admin_http` - Admin pages over HTTP (ignored by default)
//!
//! # Environment Variables
//!
//! - `STOREFRONT_BASE_URL` - Defaults to `http://localhost:3000`
//! - `ADMIN_BASE_URL` - Defaults to `http://localhost:3001`
//! - `ADMIN_EMAIL`, `ADMIN_PASSWORD` - An account created with `meridian admin create`

/// Base URL for the storefront under test.
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Base URL for the admin under test.
#[must_use]
pub fn admin_base_url() -> String {
    std::env::var("ADMIN_BASE_URL").unwrap_or_else(|_| "http://localhost:3001".to_string())
}

/// HTTP client with a cookie jar that does not follow redirects.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
}
