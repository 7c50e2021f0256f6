//! HTTP tests against a running admin.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`meridian migrate`)
//! - An admin account (`meridian admin create ...`) exported as
//!   `ADMIN_EMAIL` / `ADMIN_PASSWORD`
//! - The admin running (cargo run -p meridian-admin)
//!
//! Tests create their own categories and products, suffixed per run.
//!
//! Run with: cargo test -p meridian-integration-tests -- --ignored

#![allow(clippy::indexing_slicing)]

use meridian_integration_tests::{admin_base_url, client};
use reqwest::{Client, StatusCode};

/// Short unique suffix so repeated runs do not collide on slugs.
fn suffix() -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{nanos:x}")
}

/// Log in with the credentials from the environment.
async fn logged_in_client() -> Client {
    let email = std::env::var("ADMIN_EMAIL").expect("ADMIN_EMAIL must be set");
    let password = std::env::var("ADMIN_PASSWORD").expect("ADMIN_PASSWORD must be set");

    let client = client().expect("Failed to create HTTP client");
    let resp = client
        .post(format!("{}/auth/login", admin_base_url()))
        .form(&[("email", email.as_str()), ("password", password.as_str())])
        .send()
        .await
        .expect("Failed to log in");
    assert!(
        resp.status().is_redirection(),
        "login should redirect, got {}",
        resp.status()
    );
    client
}

fn location(resp: &reqwest::Response) -> String {
    resp.headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

// =============================================================================
// Access Control
// =============================================================================

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_pages_redirect_to_login_without_session() {
    let client = client().expect("Failed to create HTTP client");
    let base_url = admin_base_url();

    for path in ["/", "/products", "/orders", "/reviews", "/settings"] {
        let resp = client
            .get(format!("{base_url}{path}"))
            .send()
            .await
            .expect("Failed to send request");
        assert!(resp.status().is_redirection(), "GET {path}");
        assert_eq!(location(&resp), "/auth/login", "GET {path}");
    }
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_bad_credentials_stay_on_login() {
    let client = client().expect("Failed to create HTTP client");

    let resp = client
        .post(format!("{}/auth/login", admin_base_url()))
        .form(&[("email", "nobody@example.com"), ("password", "wrong password")])
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("Incorrect email or password."));
}

// =============================================================================
// Back Office Pages
// =============================================================================

#[tokio::test]
#[ignore = "Requires running admin server and ADMIN_EMAIL/ADMIN_PASSWORD"]
async fn test_back_office_pages_render() {
    let client = logged_in_client().await;
    let base_url = admin_base_url();

    for path in [
        "/",
        "/products",
        "/products/new",
        "/categories",
        "/sizes",
        "/orders",
        "/orders?status=paid",
        "/reviews?filter=pending",
        "/settings",
    ] {
        let resp = client
            .get(format!("{base_url}{path}"))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(resp.status(), StatusCode::OK, "GET {path}");
    }
}

#[tokio::test]
#[ignore = "Requires running admin server and ADMIN_EMAIL/ADMIN_PASSWORD"]
async fn test_category_create_then_duplicate_slug() {
    let client = logged_in_client().await;
    let base_url = admin_base_url();
    let slug = format!("it-{}", suffix());

    let resp = client
        .post(format!("{base_url}/categories"))
        .form(&[("name", slug.as_str()), ("slug", slug.as_str()), ("description", "")])
        .send()
        .await
        .expect("Failed to create category");
    assert!(resp.status().is_redirection());

    let resp = client
        .post(format!("{base_url}/categories"))
        .form(&[("name", "Another name"), ("slug", slug.as_str()), ("description", "")])
        .send()
        .await
        .expect("Failed to send duplicate");
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("already in use"));
}

#[tokio::test]
#[ignore = "Requires running admin server and ADMIN_EMAIL/ADMIN_PASSWORD"]
async fn test_invalid_product_is_rerendered() {
    let client = logged_in_client().await;

    let resp = client
        .post(format!("{}/products", admin_base_url()))
        .form(&[("name", ""), ("sku", "has space"), ("price", "abc"), ("stock", "-1")])
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("Cannot contain spaces."));
}

#[tokio::test]
#[ignore = "Requires running admin server and ADMIN_EMAIL/ADMIN_PASSWORD"]
async fn test_unknown_order_status_is_rejected() {
    let client = logged_in_client().await;

    let resp = client
        .post(format!("{}/orders/1/status", admin_base_url()))
        .form(&[("status", "lost")])
        .send()
        .await
        .expect("Failed to send request");
    assert!(matches!(
        resp.status(),
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND
    ));
}

// =============================================================================
// Catalog and Stock
// =============================================================================

/// Id from the `/{collection}/{id}/edit` link that precedes `marker`.
fn id_in_edit_link(body: &str, collection: &str, marker: &str) -> i32 {
    let end = body.find(marker).expect("marker not found on page");
    let prefix = format!("/{collection}/");
    let start = body[..end].rfind(&prefix).expect("no edit link before marker") + prefix.len();
    body[start..end]
        .split('/')
        .next()
        .and_then(|id| id.parse().ok())
        .expect("edit link has no numeric id")
}

/// Create a category and read its id back from the category list.
async fn create_category(client: &Client, name: &str) -> i32 {
    let base_url = admin_base_url();
    let resp = client
        .post(format!("{base_url}/categories"))
        .form(&[("name", name), ("slug", ""), ("description", "")])
        .send()
        .await
        .expect("Failed to create category");
    assert!(resp.status().is_redirection());

    let body = client
        .get(format!("{base_url}/categories"))
        .send()
        .await
        .expect("Failed to list categories")
        .text()
        .await
        .expect("Failed to read body");
    id_in_edit_link(&body, "categories", &format!(">{name}</a>"))
}

/// Create an active product in `category_id` and return its id.
async fn create_product(client: &Client, category_id: i32, name: &str, sku: &str) -> i32 {
    let category_id = category_id.to_string();
    let resp = client
        .post(format!("{}/products", admin_base_url()))
        .form(&[
            ("name", name),
            ("slug", ""),
            ("sku", sku),
            ("description", "Heavyweight canvas."),
            ("price", "24.50"),
            ("compare_at_price", "30.00"),
            ("stock", "7"),
            ("category_id", category_id.as_str()),
            ("is_active", "on"),
            ("subscription_price_id", ""),
        ])
        .send()
        .await
        .expect("Failed to create product");
    assert!(resp.status().is_redirection(), "got {}", resp.status());

    let target = location(&resp);
    target
        .strip_prefix("/products/")
        .and_then(|rest| rest.strip_suffix("/edit"))
        .and_then(|id| id.parse().ok())
        .unwrap_or_else(|| panic!("unexpected redirect {target}"))
}

async fn page(client: &Client, path: &str) -> String {
    let resp = client
        .get(format!("{}{path}", admin_base_url()))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::OK, "GET {path}");
    resp.text().await.expect("Failed to read body")
}

#[tokio::test]
#[ignore = "Requires running admin server and ADMIN_EMAIL/ADMIN_PASSWORD"]
async fn test_created_product_reads_back() {
    let client = logged_in_client().await;
    let run = suffix();
    let category_id = create_category(&client, &format!("Totes {run}")).await;
    let name = format!("Canvas Tote {run}");
    let sku = format!("TOTE-{}", run.to_uppercase());

    let id = create_product(&client, category_id, &name, &sku).await;

    let body = page(&client, &format!("/products/{id}/edit")).await;
    assert!(body.contains(&format!("value=\"{name}\"")));
    assert!(body.contains(&format!("value=\"{sku}\"")));
    assert!(body.contains("value=\"24.50\""));
    assert!(body.contains("value=\"30.00\""));
    assert!(body.contains("<span class=\"metric-value\">7</span>"));
}

#[tokio::test]
#[ignore = "Requires running admin server and ADMIN_EMAIL/ADMIN_PASSWORD"]
async fn test_stock_adjustment_stops_at_zero() {
    let client = logged_in_client().await;
    let run = suffix();
    let category_id = create_category(&client, &format!("Mugs {run}")).await;
    let id = create_product(
        &client,
        category_id,
        &format!("Stoneware Mug {run}"),
        &format!("MUG-{}", run.to_uppercase()),
    )
    .await;

    let resp = client
        .post(format!("{}/products/{id}/stock", admin_base_url()))
        .form(&[("delta", "-1000")])
        .send()
        .await
        .expect("Failed to adjust stock");
    assert!(resp.status().is_redirection());

    let body = page(&client, &format!("/products/{id}/edit")).await;
    assert!(body.contains("Stock is now 0."));
    assert!(body.contains("<span class=\"metric-value\">0</span>"));

    let resp = client
        .post(format!("{}/products/{id}/stock", admin_base_url()))
        .form(&[("delta", "2147483647")])
        .send()
        .await
        .expect("Failed to adjust stock");
    assert!(resp.status().is_redirection());

    let body = page(&client, &format!("/products/{id}/edit")).await;
    assert!(body.contains("Adjust by at most"));
    assert!(body.contains("<span class=\"metric-value\">0</span>"));
}

#[tokio::test]
#[ignore = "Requires running admin server and ADMIN_EMAIL/ADMIN_PASSWORD"]
async fn test_category_with_products_cannot_be_deleted() {
    let client = logged_in_client().await;
    let run = suffix();
    let category_name = format!("Prints {run}");
    let category_id = create_category(&client, &category_name).await;
    create_product(
        &client,
        category_id,
        &format!("Poster {run}"),
        &format!("PRINT-{}", run.to_uppercase()),
    )
    .await;

    let resp = client
        .post(format!("{}/categories/{category_id}/delete", admin_base_url()))
        .send()
        .await
        .expect("Failed to send delete");
    assert!(resp.status().is_redirection());
    assert_eq!(location(&resp), "/categories");

    let body = page(&client, "/categories").await;
    assert!(body.contains("Move or delete this category"));
    assert!(body.contains(&format!(">{category_name}</a>")));
}
