//! Meridian Core - Shared domain library.
//!
//! This crate provides the types and business rules used across all Meridian components:
//! - `storefront` - Public-facing shop
//! - `admin` - Back-office for catalog, orders, reviews and settings
//! - `cli` - Command-line tools for migrations, seeding and admin accounts
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and easy to test.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, ratings and statuses
//! - [`pricing`] - Cart totals (subtotal, shipping, tax)
//! - [`promotion`] - Product badge heuristics
//! - [`cart`] - Cart line merging
//! - [`slug`] - URL slug generation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod pricing;
pub mod promotion;
pub mod slug;
pub mod types;

pub use types::*;
