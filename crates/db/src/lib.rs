//! Database access for Meridian.
//!
//! # Database: `meridian`
//!
//! The storefront, admin and CLI share one `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `users` - Customer and admin accounts
//! - `categories`, `sizes`, `products`, `product_sizes` - Catalog
//! - `carts`, `cart_items` - Persistent carts for signed-in customers
//! - `orders`, `order_items` - Orders created from hosted checkout sessions
//! - `reviews`, `wishlist_items` - Customer content
//! - `settings` - Store settings (JSONB)
//! - `tower_sessions.session`, `tower_sessions.admin_session` - Session storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/db/migrations/` and run via:
//! ```bash
//! cargo run -p meridian-cli -- migrate
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod carts;
pub mod categories;
pub mod models;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod settings;
pub mod sizes;
pub mod users;
pub mod wishlists;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::CartRepository;
pub use categories::CategoryRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use reviews::ReviewRepository;
pub use settings::{SettingsRepository, StoreSettings};
pub use sizes::SizeRepository;
pub use users::UserRepository;
pub use wishlists::WishlistRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate slug or SKU).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The row is still referenced and cannot be deleted.
    #[error("{0} is still in use")]
    InUse(String),

    /// Not enough stock to satisfy the request.
    #[error("insufficient stock for {product}: {available} available")]
    InsufficientStock {
        /// Product display name.
        product: String,
        /// Units currently in stock.
        available: i32,
    },
}

impl RepositoryError {
    /// Map an insert/update failure, turning unique violations on `table`
    /// into [`RepositoryError::Conflict`] naming the offending column.
    pub(crate) fn from_write(e: sqlx::Error, table: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                let field = db_err
                    .constraint()
                    .map(|c| conflicting_column(c, table))
                    .unwrap_or_else(|| table.to_owned());
                return Self::Conflict(format!("{field} already exists"));
            }
            if db_err.is_foreign_key_violation() {
                return Self::Conflict(format!(
                    "{} references a missing row",
                    db_err.constraint().unwrap_or(table)
                ));
            }
        }
        Self::Database(e)
    }

    /// Map a delete failure, turning foreign key violations into
    /// [`RepositoryError::InUse`].
    pub(crate) fn from_delete(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_foreign_key_violation()
        {
            return Self::InUse(what.to_owned());
        }
        Self::Database(e)
    }

    /// The column named by a [`RepositoryError::Conflict`], if any.
    #[must_use]
    pub fn conflict_field(&self) -> Option<&str> {
        match self {
            Self::Conflict(msg) => msg.strip_suffix(" already exists"),
            _ => None,
        }
    }
}

/// `products_sku_key` on table `products` -> `sku`.
fn conflicting_column(constraint: &str, table: &str) -> String {
    let trimmed = constraint
        .strip_prefix(table)
        .and_then(|s| s.strip_prefix('_'))
        .unwrap_or(constraint);
    trimmed
        .strip_suffix("_key")
        .unwrap_or(trimmed)
        .to_owned()
}

/// One page of results plus the total row count.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

impl<T> Page<T> {
    /// Total number of pages (at least 1).
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 1;
        }
        let per_page = i64::from(self.per_page);
        let pages = (self.total + per_page - 1) / per_page;
        u32::try_from(pages).unwrap_or(u32::MAX).max(1)
    }

    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }
}

/// Page number and size, normalized so the offset is always valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: u32,
    pub per_page: u32,
}

impl Paging {
    pub const MAX_PER_PAGE: u32 = 100;

    #[must_use]
    pub fn new(page: Option<u32>, per_page: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }

    pub(crate) fn page_of<T>(&self, items: Vec<T>, total: i64) -> Page<T> {
        Page {
            items,
            page: self.page,
            per_page: self.per_page,
            total,
        }
    }
}

impl Default for Paging {
    fn default() -> Self {
        Self::new(None, 24)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Embedded migrations from `crates/db/migrations`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicting_column() {
        assert_eq!(conflicting_column("products_sku_key", "products"), "sku");
        assert_eq!(conflicting_column("categories_name_key", "categories"), "name");
        assert_eq!(conflicting_column("custom_idx", "products"), "custom_idx");
    }

    #[test]
    fn test_conflict_field() {
        let err = RepositoryError::Conflict("slug already exists".to_owned());
        assert_eq!(err.conflict_field(), Some("slug"));
        assert_eq!(RepositoryError::NotFound.conflict_field(), None);
    }

    #[test]
    fn test_paging_offsets() {
        let paging = Paging::new(Some(3), 20);
        assert_eq!(paging.offset(), 40);
        assert_eq!(paging.limit(), 20);

        let paging = Paging::new(Some(0), 1000);
        assert_eq!(paging.page, 1);
        assert_eq!(paging.per_page, Paging::MAX_PER_PAGE);
    }

    #[test]
    fn test_page_counts() {
        let page = Page {
            items: vec![1, 2],
            page: 1,
            per_page: 2,
            total: 5,
        };
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());
        assert!(!page.has_prev());

        let empty: Page<i32> = Page {
            items: Vec::new(),
            page: 1,
            per_page: 10,
            total: 0,
        };
        assert_eq!(empty.total_pages(), 1);
        assert!(!empty.has_next());
    }
}
