//! Review repository.

use sqlx::PgPool;

use meridian_core::{ProductId, ReviewId, UserId};

use crate::models::{NewReview, RatingSummary, Review};
use crate::{Page, Paging, RepositoryError};

const REVIEW_SELECT: &str = "SELECT r.id, r.product_id, r.user_id, r.rating, r.title, r.body, \
     r.is_approved, r.created_at, u.name AS author_name, p.name AS product_name \
     FROM reviews r \
     JOIN users u ON u.id = r.user_id \
     JOIN products p ON p.id = r.product_id";

pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the product.
    pub async fn create(&self, review: &NewReview) -> Result<ReviewId, RepositoryError> {
        sqlx::query_scalar::<_, ReviewId>(
            "INSERT INTO reviews (product_id, user_id, rating, title, body, is_approved)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(review.product_id)
        .bind(review.user_id)
        .bind(review.rating)
        .bind(&review.title)
        .bind(&review.body)
        .bind(review.is_approved)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "reviews"))
    }

    /// Whether the user has already reviewed the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists_for_user(
        &self,
        product_id: ProductId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM reviews WHERE product_id = $1 AND user_id = $2)",
        )
        .bind(product_id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Approved reviews for a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(&self, product_id: ProductId) -> Result<Vec<Review>, RepositoryError> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            "{REVIEW_SELECT} WHERE r.product_id = $1 AND r.is_approved ORDER BY r.created_at DESC"
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(reviews)
    }

    /// Count and average of approved ratings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn rating_summary(&self, product_id: ProductId) -> Result<RatingSummary, RepositoryError> {
        let summary = sqlx::query_as::<_, RatingSummary>(
            "SELECT COUNT(*) AS count, AVG(rating) AS average
             FROM reviews WHERE product_id = $1 AND is_approved",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok(summary)
    }

    /// All reviews for moderation, pending first then newest.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(
        &self,
        approved: Option<bool>,
        paging: Paging,
    ) -> Result<Page<Review>, RepositoryError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM reviews WHERE $1::BOOL IS NULL OR is_approved = $1",
        )
        .bind(approved)
        .fetch_one(self.pool)
        .await?;

        let reviews = sqlx::query_as::<_, Review>(&format!(
            "{REVIEW_SELECT}
             WHERE $1::BOOL IS NULL OR r.is_approved = $1
             ORDER BY r.is_approved ASC, r.created_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(approved)
        .bind(paging.limit())
        .bind(paging.offset())
        .fetch_all(self.pool)
        .await?;

        Ok(paging.page_of(reviews, total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn set_approved(&self, id: ReviewId, approved: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE reviews SET is_approved = $2 WHERE id = $1")
            .bind(id)
            .bind(approved)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn delete(&self, id: ReviewId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Reviews waiting for moderation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_pending(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews WHERE NOT is_approved")
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}
