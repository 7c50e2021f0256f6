//! HTTP middleware stack for admin.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Security headers (stricter CSP for admin)
//! 4. Session layer (tower-sessions with `PostgreSQL` store)
//!
//! Authentication is enforced per handler by the [`RequireAdminAuth`] extractor.

pub mod auth;
pub mod security_headers;
pub mod session;

pub use auth::{
    OptionalAdminAuth, RequireAdminAuth, clear_current_admin, set_current_admin, set_flash,
    take_flash,
};
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
