//! HTTP route handlers for admin.
//!
//! Every page except the login form requires an admin session; handlers
//! take [`RequireAdminAuth`](crate::middleware::RequireAdminAuth), which
//! redirects to `/auth/login` otherwise.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                     - Health check
//! GET  /health/ready               - Readiness check (database)
//!
//! # Dashboard
//! GET  /                           - Revenue, counts, recent orders, low stock
//!
//! # Auth (password, admin role only)
//! GET  /auth/login                 - Login page
//! POST /auth/login                 - Login action
//! POST /auth/logout                - Logout action
//!
//! # Products
//! GET  /products                   - Listing (?q=&category=&page=)
//! GET  /products/new               - New product form
//! POST /products                   - Create
//! GET  /products/{id}/edit         - Edit form
//! POST /products/{id}              - Update
//! POST /products/{id}/delete       - Delete (and its image)
//! POST /products/{id}/image        - Replace image (multipart)
//! POST /products/{id}/stock        - Adjust stock by a signed delta
//!
//! # Categories
//! GET  /categories                 - Listing with product counts
//! GET  /categories/new             - New category form
//! POST /categories                 - Create
//! GET  /categories/{id}/edit       - Edit form
//! POST /categories/{id}            - Update
//! POST /categories/{id}/delete     - Delete (only when empty)
//!
//! # Sizes
//! GET  /sizes                      - Listing with inline editing
//! POST /sizes                      - Create
//! POST /sizes/{id}                 - Update
//! POST /sizes/{id}/delete          - Delete (only when unused)
//!
//! # Orders
//! GET  /orders                     - Listing (?status=&page=)
//! GET  /orders/{id}                - Detail
//! POST /orders/{id}/status         - Move to the next status
//!
//! # Reviews
//! GET  /reviews                    - Moderation queue (?filter=&page=)
//! POST /reviews/{id}/approve       - Publish
//! POST /reviews/{id}/hide          - Unpublish
//! POST /reviews/{id}/delete        - Delete
//!
//! # Settings
//! GET  /settings                   - Store settings form
//! POST /settings                   - Save store settings
//! ```

pub mod auth;
pub mod categories;
pub mod dashboard;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod settings;
pub mod sizes;

use axum::Router;

use crate::state::AppState;

/// Build all admin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(dashboard::router())
        .merge(auth::router())
        .merge(products::router())
        .merge(categories::router())
        .merge(sizes::router())
        .merge(orders::router())
        .merge(reviews::router())
        .merge(settings::router())
}
