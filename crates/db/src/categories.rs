//! Category repository.

use sqlx::PgPool;

use meridian_core::CategoryId;

use crate::RepositoryError;
use crate::models::{Category, CategoryWithCount};

const CATEGORY_COLUMNS: &str = "c.id, c.name, c.slug, c.description, c.created_at, c.updated_at";

/// Repository for product categories.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories by name, with product counts.
    ///
    /// When `active_only` is set, only active products are counted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, active_only: bool) -> Result<Vec<CategoryWithCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryWithCount>(&format!(
            "SELECT {CATEGORY_COLUMNS}, COUNT(p.id) AS product_count
             FROM categories c
             LEFT JOIN products p ON p.category_id = c.id AND (p.is_active OR NOT $1)
             GROUP BY c.id
             ORDER BY c.name"
        ))
        .bind(active_only)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories c WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(category)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories c WHERE c.slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(category)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name or slug is taken.
    pub async fn create(
        &self,
        name: &str,
        slug: &str,
        description: &str,
    ) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, slug, description)
             VALUES ($1, $2, $3)
             RETURNING id, name, slug, description, created_at, updated_at",
        )
        .bind(name)
        .bind(slug)
        .bind(description)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "categories"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Conflict` if the name or slug is taken.
    pub async fn update(
        &self,
        id: CategoryId,
        name: &str,
        slug: &str,
        description: &str,
    ) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories
             SET name = $2, slug = $3, description = $4, updated_at = NOW()
             WHERE id = $1
             RETURNING id, name, slug, description, created_at, updated_at",
        )
        .bind(id)
        .bind(name)
        .bind(slug)
        .bind(description)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "categories"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a category that has no products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InUse` if any product belongs to it.
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let product_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM products WHERE category_id = $1",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        if product_count > 0 {
            return Err(RepositoryError::InUse("category".to_owned()));
        }

        // The RESTRICT foreign key still guards against a product added
        // between the count and the delete.
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::from_delete(e, "category"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
