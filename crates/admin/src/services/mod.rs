//! Business logic services for admin.
//!
//! # Services
//!
//! - `auth` - Password sign-in for admin accounts
//! - `image_upload` - Product image validation and storage

pub mod auth;
pub mod image_upload;

pub use auth::{AdminAuthError, AdminAuthService};
pub use image_upload::{ImageUploadService, Upload, UploadError};
