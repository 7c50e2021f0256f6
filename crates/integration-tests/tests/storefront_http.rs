//! HTTP tests against a running storefront.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`meridian migrate`)
//! - The storefront running (cargo run -p meridian-storefront)
//! - At least one active product for the review tests (`meridian seed ...`)
//!
//! Run with: cargo test -p meridian-integration-tests -- --ignored

use meridian_integration_tests::{client, storefront_base_url};
use reqwest::{Client, StatusCode};

/// Short unique suffix so repeated runs do not collide on emails.
fn suffix() -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{nanos:x}")
}

/// Slug of the first product on the listing page.
async fn first_product_slug(client: &Client) -> String {
    let body = client
        .get(format!("{}/products", storefront_base_url()))
        .send()
        .await
        .expect("Failed to list products")
        .text()
        .await
        .expect("Failed to read body");

    body.split("href=\"/products/")
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .find(|slug| !slug.is_empty() && !slug.contains('?'))
        .map(str::to_string)
        .expect("no products listed; seed the catalog first")
}

/// Register a fresh customer; the client keeps the signed-in session.
async fn registered_client() -> Client {
    let client = client().expect("Failed to create HTTP client");
    let email = format!("review-{}@example.com", suffix());

    let resp = client
        .post(format!("{}/auth/register", storefront_base_url()))
        .form(&[
            ("email", email.as_str()),
            ("name", "Review Tester"),
            ("password", "correct horse battery"),
            ("password_confirm", "correct horse battery"),
        ])
        .send()
        .await
        .expect("Failed to register");
    assert!(
        resp.status().is_redirection(),
        "register should redirect, got {}",
        resp.status()
    );
    client
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_health_endpoints() {
    let client = client().expect("Failed to create HTTP client");
    let base_url = storefront_base_url();

    let resp = client
        .get(format!("{base_url}/health"))
        .send()
        .await
        .expect("Failed to reach /health");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("Failed to read body"), "ok");

    let resp = client
        .get(format!("{base_url}/health/ready"))
        .send()
        .await
        .expect("Failed to reach /health/ready");
    assert_eq!(resp.status(), StatusCode::OK);
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_catalog_pages_render() {
    let client = client().expect("Failed to create HTTP client");
    let base_url = storefront_base_url();

    for path in ["/", "/products", "/products?sort=price_asc", "/cart"] {
        let resp = client
            .get(format!("{base_url}{path}"))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(resp.status(), StatusCode::OK, "GET {path}");
        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("text/html"), "GET {path}: {content_type}");
    }
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_unknown_product_is_not_found() {
    let client = client().expect("Failed to create HTTP client");
    let base_url = storefront_base_url();

    let resp = client
        .get(format!("{base_url}/products/no-such-product-anywhere"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_security_headers_present() {
    let client = client().expect("Failed to create HTTP client");
    let base_url = storefront_base_url();

    let resp = client
        .get(format!("{base_url}/"))
        .send()
        .await
        .expect("Failed to send request");
    let headers = resp.headers();
    assert!(headers.contains_key("content-security-policy"));
    assert_eq!(
        headers.get("x-content-type-options").and_then(|v| v.to_str().ok()),
        Some("nosniff")
    );
    assert!(headers.contains_key("x-request-id"));
}

// =============================================================================
// Cart, Account and Webhooks
// =============================================================================

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_empty_cart_cannot_check_out() {
    let client = client().expect("Failed to create HTTP client");
    let base_url = storefront_base_url();

    let resp = client
        .post(format!("{base_url}/checkout"))
        .form(&[("email", "guest@example.com")])
        .send()
        .await
        .expect("Failed to send request");
    assert!(resp.status().is_redirection());
    assert_eq!(
        resp.headers().get("location").and_then(|v| v.to_str().ok()),
        Some("/cart")
    );
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_account_requires_login() {
    let client = client().expect("Failed to create HTTP client");
    let base_url = storefront_base_url();

    let resp = client
        .get(format!("{base_url}/account"))
        .send()
        .await
        .expect("Failed to send request");
    assert!(resp.status().is_redirection());
    let location = resp
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(location.starts_with("/auth/login"), "redirected to {location}");
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_unsigned_webhook_is_rejected() {
    let client = client().expect("Failed to create HTTP client");
    let base_url = storefront_base_url();

    let resp = client
        .post(format!("{base_url}/webhooks/payments"))
        .header("stripe-signature", "t=1,v1=deadbeef")
        .body(r#"{"type":"checkout.session.completed","data":{"object":{"id":"cs_x"}}}"#)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Reviews
// =============================================================================

#[tokio::test]
#[ignore = "Requires running storefront with a seeded catalog"]
async fn test_second_review_of_a_product_is_refused() {
    let client = registered_client().await;
    let base_url = storefront_base_url();
    let slug = first_product_slug(&client).await;
    let review = [
        ("rating", "5"),
        ("title", "Holds up"),
        ("body", "Six months of daily use and still like new."),
    ];

    let resp = client
        .post(format!("{base_url}/products/{slug}/reviews"))
        .form(&review)
        .send()
        .await
        .expect("Failed to submit review");
    assert!(resp.status().is_redirection());

    let resp = client
        .post(format!("{base_url}/products/{slug}/reviews"))
        .form(&review)
        .send()
        .await
        .expect("Failed to submit second review");
    assert!(resp.status().is_redirection());

    let body = client
        .get(format!("{base_url}/products/{slug}"))
        .send()
        .await
        .expect("Failed to load product")
        .text()
        .await
        .expect("Failed to read body");
    assert!(body.contains("You have already reviewed this product."));
}
