//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - Home page
//! GET  /health                    - Health check
//! GET  /health/ready              - Readiness check (database)
//!
//! # Catalog
//! GET  /products                  - Product listing (?category=&q=&sort=&page=)
//! GET  /products/{slug}           - Product detail
//! POST /products/{slug}/reviews   - Submit review (auth)
//! GET  /categories/{slug}         - Category listing
//!
//! # Cart
//! GET  /cart                      - Cart page
//! POST /cart/add                  - Add to cart (HTMX aware)
//! POST /cart/update               - Set quantity (0 removes)
//! POST /cart/remove               - Remove line
//! GET  /cart/count                - Cart count badge (fragment)
//!
//! # Checkout
//! POST /checkout                  - Create hosted session, redirect to provider
//! GET  /checkout/success          - Order confirmation
//! GET  /checkout/cancel           - Back to cart
//! POST /subscriptions/{slug}      - Start subscription checkout (auth)
//! POST /webhooks/payments         - Payment provider events
//!
//! # Auth
//! GET  /auth/login                - Login page
//! POST /auth/login                - Login action
//! GET  /auth/register             - Register page
//! POST /auth/register             - Register action
//! POST /auth/logout               - Logout action
//!
//! # Account (requires auth)
//! GET  /account                   - Account overview
//! GET  /account/orders            - Order history
//! GET  /account/orders/{id}       - Order detail
//! POST /account/orders/{id}/cancel-subscription
//! GET  /wishlist                  - Wishlist
//! POST /wishlist/add              - Save product
//! POST /wishlist/remove           - Remove product
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod checkout;
pub mod home;
pub mod products;
pub mod subscriptions;
pub mod webhooks;
pub mod wishlist;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{auth_rate_limiter, cart_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
        .layer(auth_rate_limiter())
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
        .route(
            "/{slug}/reviews",
            post(products::submit_review).layer(cart_rate_limiter()),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
        .layer(cart_rate_limiter())
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout::start))
        .route("/success", get(checkout::success))
        .route("/cancel", get(checkout::cancel))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/orders", get(account::orders))
        .route("/orders/{id}", get(account::order))
        .route(
            "/orders/{id}/cancel-subscription",
            post(account::cancel_subscription),
        )
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::show))
        .route("/add", post(wishlist::add))
        .route("/remove", post(wishlist::remove))
        .layer(cart_rate_limiter())
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Home page
        .route("/", get(home::home))
        // Catalog
        .nest("/products", product_routes())
        .route("/categories/{slug}", get(categories::show))
        // Cart and checkout
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .route("/subscriptions/{slug}", post(subscriptions::start))
        .route("/webhooks/payments", post(webhooks::payments))
        // Customer
        .nest("/auth", auth_routes())
        .nest("/account", account_routes())
        .nest("/wishlist", wishlist_routes())
}
