//! Session-stored models for the storefront.
//!
//! Catalog, cart and order rows live in `meridian_db::models`; this module
//! only holds what the storefront keeps in the visitor's session.

pub mod session;

pub use session::{CurrentUser, Flash, FlashKind, keys};
