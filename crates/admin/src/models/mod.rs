//! Session-stored models for admin.
//!
//! Catalog, order and review rows live in `meridian_db::models`.

pub mod session;

pub use session::{CurrentAdmin, Flash, FlashKind};
pub use session::keys as session_keys;
