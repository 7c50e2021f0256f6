//! Wishlist repository.

use sqlx::PgPool;

use meridian_core::{ProductId, UserId};

use crate::RepositoryError;
use crate::models::Product;

pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Products on the user's wishlist, most recently added first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT p.id, p.category_id, p.name, p.slug, p.sku, p.description, p.price,
                    p.compare_at_price, p.stock, p.image_path, p.is_active, p.is_featured,
                    p.subscription_price_id, p.created_at, p.updated_at
             FROM wishlist_items w
             JOIN products p ON p.id = w.product_id
             WHERE w.user_id = $1
             ORDER BY w.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Add a product. Adding one that is already present is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product does not exist.
    pub async fn add(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO wishlist_items (user_id, product_id) VALUES ($1, $2)
             ON CONFLICT (user_id, product_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "wishlist_items"))?;

        Ok(())
    }

    /// Remove a product. Removing one that is absent is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn contains(&self, user_id: UserId, product_id: ProductId) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM wishlist_items WHERE user_id = $1 AND product_id = $2)",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }
}
