//! Product repository.
//!
//! Listing queries are assembled with [`sqlx::QueryBuilder`] since filters
//! are optional. Stock updates clamp at zero so concurrent decrements can
//! never push a product negative.

use sqlx::{PgPool, Postgres, QueryBuilder};

use meridian_core::{CategoryId, ProductId};

use crate::models::{Product, ProductInput, ProductSort};
use crate::{Page, Paging, RepositoryError};

const PRODUCT_COLUMNS: &str = "p.id, p.category_id, p.name, p.slug, p.sku, p.description, \
     p.price, p.compare_at_price, p.stock, p.image_path, p.is_active, p.is_featured, \
     p.subscription_price_id, p.created_at, p.updated_at";

/// Filters for product listings.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    /// Case-insensitive match on name, SKU or description.
    pub search: Option<String>,
    pub active_only: bool,
    pub featured_only: bool,
    pub sort: ProductSort,
    pub paging: Paging,
}

impl ProductFilter {
    /// Filter for the public catalog: active products only.
    #[must_use]
    pub fn storefront() -> Self {
        Self {
            active_only: true,
            ..Self::default()
        }
    }

    fn push_conditions<'q>(&'q self, qb: &mut QueryBuilder<'q, Postgres>) {
        qb.push(" WHERE TRUE");
        if let Some(category_id) = self.category_id {
            qb.push(" AND p.category_id = ").push_bind(category_id);
        }
        if self.active_only {
            qb.push(" AND p.is_active");
        }
        if self.featured_only {
            qb.push(" AND p.is_featured");
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (p.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.sku ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

/// Escape `LIKE` wildcards in user input.
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Page<Product>, RepositoryError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM products p");
        filter.push_conditions(&mut count_qb);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.pool)
            .await?;

        let mut qb = QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products p"));
        filter.push_conditions(&mut qb);
        qb.push(" ORDER BY ")
            .push(filter.sort.order_by())
            .push(" LIMIT ")
            .push_bind(filter.paging.limit())
            .push(" OFFSET ")
            .push_bind(filter.paging.offset());

        let items = qb
            .build_query_as::<Product>()
            .fetch_all(self.pool)
            .await?;

        Ok(filter.paging.page_of(items, total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// Products by ID, in no particular order. Unknown IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug or SKU is taken, or
    /// the category does not exist.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products AS p (category_id, name, slug, sku, description, price,
                 compare_at_price, stock, is_active, is_featured, subscription_price_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(input.category_id)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.sku)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(input.stock)
        .bind(input.is_active)
        .bind(input.is_featured)
        .bind(&input.subscription_price_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "products"))
    }

    /// Update a product's details. `input.stock` is ignored; stock only
    /// changes through [`Self::adjust_stock`] and order transitions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the slug or SKU is taken.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!(
            "UPDATE products AS p
             SET category_id = $2, name = $3, slug = $4, sku = $5, description = $6,
                 price = $7, compare_at_price = $8, is_active = $9,
                 is_featured = $10, subscription_price_id = $11, updated_at = NOW()
             WHERE p.id = $1
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(input.category_id)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.sku)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(input.is_active)
        .bind(input.is_featured)
        .bind(&input.subscription_price_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "products"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a product. Returns the image path so the caller can remove the file.
    ///
    /// Order items keep their snapshot and lose the product reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query_as::<_, (Option<String>,)>(
            "DELETE FROM products WHERE id = $1 RETURNING image_path",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_delete(e, "product"))?;

        row.map(|(path,)| path).ok_or(RepositoryError::NotFound)
    }

    /// Set the image path, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn set_image(
        &self,
        id: ProductId,
        image_path: Option<&str>,
    ) -> Result<Option<String>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (old,) = sqlx::query_as::<_, (Option<String>,)>(
            "SELECT image_path FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        sqlx::query("UPDATE products SET image_path = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(image_path)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(old)
    }

    /// Other active products from the same category, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn related(
        &self,
        product: &Product,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p
             WHERE p.category_id = $1 AND p.id <> $2 AND p.is_active
             ORDER BY p.stock > 0 DESC, p.created_at DESC
             LIMIT $3"
        ))
        .bind(product.category_id)
        .bind(product.id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Apply a signed stock delta, clamping to `0..=i32::MAX`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn adjust_stock(&self, id: ProductId, delta: i32) -> Result<i32, RepositoryError> {
        sqlx::query_scalar::<_, i32>(
            "UPDATE products
             SET stock = LEAST(GREATEST(stock::BIGINT + $2, 0), 2147483647)::INT,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING stock",
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Active products at or below `threshold` units, lowest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(&self, threshold: i32, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p
             WHERE p.is_active AND p.stock <= $1
             ORDER BY p.stock ASC, p.name ASC
             LIMIT $2"
        ))
        .bind(threshold)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products")
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("linen"), "linen");
    }

    #[test]
    fn test_conditions_sql() {
        let filter = ProductFilter {
            category_id: Some(CategoryId::new(3)),
            search: Some("  shirt ".to_owned()),
            active_only: true,
            ..ProductFilter::default()
        };
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM products p");
        filter.push_conditions(&mut qb);

        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM products p WHERE TRUE AND p.category_id = $1 AND p.is_active \
             AND (p.name ILIKE $2 OR p.sku ILIKE $3 OR p.description ILIKE $4)"
        );
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let filter = ProductFilter {
            search: Some("   ".to_owned()),
            ..ProductFilter::default()
        };
        let mut qb = QueryBuilder::new("SELECT 1 FROM products p");
        filter.push_conditions(&mut qb);
        assert_eq!(qb.sql(), "SELECT 1 FROM products p WHERE TRUE");
    }
}
