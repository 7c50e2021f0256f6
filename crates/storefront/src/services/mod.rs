//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Customer registration and password login
//! - `cart` - Guest (session) and persistent carts
//! - `checkout` - Hosted checkout sessions, order finalization and webhooks
//! - `subscription` - Subscription purchases and cancellation
//! - `promotion` - Badges, promo banner and free-shipping copy
//! - `email` - Order confirmation and welcome emails

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod email;
pub mod promotion;
pub mod subscription;
