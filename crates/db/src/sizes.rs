//! Size repository.
//!
//! Sizes are a global list (S, M, L, 42, ...); products opt into a subset
//! through `product_sizes`.

use sqlx::PgPool;

use meridian_core::{ProductId, SizeId};

use crate::RepositoryError;
use crate::models::Size;

pub struct SizeRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SizeRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Size>, RepositoryError> {
        let sizes = sqlx::query_as::<_, Size>(
            "SELECT id, name, sort_order FROM sizes ORDER BY sort_order, name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(sizes)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: SizeId) -> Result<Option<Size>, RepositoryError> {
        let size =
            sqlx::query_as::<_, Size>("SELECT id, name, sort_order FROM sizes WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(size)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create(&self, name: &str, sort_order: i32) -> Result<Size, RepositoryError> {
        sqlx::query_as::<_, Size>(
            "INSERT INTO sizes (name, sort_order) VALUES ($1, $2)
             RETURNING id, name, sort_order",
        )
        .bind(name)
        .bind(sort_order)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "sizes"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the size does not exist.
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn update(
        &self,
        id: SizeId,
        name: &str,
        sort_order: i32,
    ) -> Result<Size, RepositoryError> {
        sqlx::query_as::<_, Size>(
            "UPDATE sizes SET name = $2, sort_order = $3 WHERE id = $1
             RETURNING id, name, sort_order",
        )
        .bind(id)
        .bind(name)
        .bind(sort_order)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "sizes"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a size no product offers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InUse` if a product still offers the size.
    /// Returns `RepositoryError::NotFound` if the size does not exist.
    pub async fn delete(&self, id: SizeId) -> Result<(), RepositoryError> {
        let in_use = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM product_sizes WHERE size_id = $1)",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        if in_use {
            return Err(RepositoryError::InUse("size".to_owned()));
        }

        let result = sqlx::query("DELETE FROM sizes WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::from_delete(e, "size"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Sizes offered for a product, in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(&self, product_id: ProductId) -> Result<Vec<Size>, RepositoryError> {
        let sizes = sqlx::query_as::<_, Size>(
            "SELECT s.id, s.name, s.sort_order
             FROM sizes s
             JOIN product_sizes ps ON ps.size_id = s.id
             WHERE ps.product_id = $1
             ORDER BY s.sort_order, s.name",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(sizes)
    }

    /// Replace the set of sizes a product is offered in.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a size ID does not exist.
    pub async fn set_for_product(
        &self,
        product_id: ProductId,
        size_ids: &[SizeId],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM product_sizes WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        let ids: Vec<i32> = size_ids.iter().map(SizeId::as_i32).collect();
        sqlx::query(
            "INSERT INTO product_sizes (product_id, size_id)
             SELECT $1, UNNEST($2::INT4[])
             ON CONFLICT DO NOTHING",
        )
        .bind(product_id)
        .bind(&ids)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, "product_sizes"))?;

        tx.commit().await?;
        Ok(())
    }
}
