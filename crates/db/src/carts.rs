//! Cart repository for signed-in customers.
//!
//! Lines are keyed by `(cart_id, product_id, size_id)`; a `NULL` size is
//! treated as a value of its own (`UNIQUE NULLS NOT DISTINCT`).

use std::collections::HashMap;

use sqlx::PgPool;

use meridian_core::cart::{CartLine, clamp_lines_to_stock, merge_lines};
use meridian_core::{CartId, ProductId, SizeId, UserId};

use crate::RepositoryError;
use crate::models::{Cart, CartLineRow};

pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's cart, created on first use.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create_for_user(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let cart = sqlx::query_as::<_, Cart>(
            "INSERT INTO carts (user_id) VALUES ($1)
             ON CONFLICT (user_id) DO UPDATE SET updated_at = carts.updated_at
             RETURNING id, user_id, created_at, updated_at",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(cart)
    }

    /// Cart lines joined with product and size details, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, cart_id: CartId) -> Result<Vec<CartLineRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            "SELECT ci.id AS item_id, p.id AS product_id, p.name AS product_name,
                    p.slug AS product_slug, p.image_path, p.price AS unit_price,
                    p.stock, p.is_active, s.id AS size_id, s.name AS size_name, ci.quantity
             FROM cart_items ci
             JOIN products p ON p.id = ci.product_id
             LEFT JOIN sizes s ON s.id = ci.size_id
             WHERE ci.cart_id = $1
             ORDER BY ci.created_at, ci.id",
        )
        .bind(cart_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// The cart's lines for one product, one per size.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_lines(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Vec<CartLine>, RepositoryError> {
        let lines = sqlx::query_as::<_, (Option<SizeId>, i32)>(
            "SELECT size_id, quantity FROM cart_items
             WHERE cart_id = $1 AND product_id = $2
             ORDER BY created_at, id",
        )
        .bind(cart_id)
        .bind(product_id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(|(size_id, quantity)| {
            CartLine::new(product_id, size_id, u32::try_from(quantity).unwrap_or(0))
        })
        .collect();

        Ok(lines)
    }

    /// Add units of a product/size, summing with an existing line.
    ///
    /// Returns the line's new quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        size_id: Option<SizeId>,
        quantity: i32,
    ) -> Result<i32, RepositoryError> {
        let quantity = sqlx::query_scalar::<_, i32>(
            "INSERT INTO cart_items (cart_id, product_id, size_id, quantity)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT ON CONSTRAINT cart_items_line_key
             DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
             RETURNING quantity",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(size_id)
        .bind(quantity)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "cart_items"))?;

        self.touch(cart_id).await?;
        Ok(quantity)
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not exist.
    pub async fn set_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        size_id: Option<SizeId>,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        if quantity <= 0 {
            return self.remove_item(cart_id, product_id, size_id).await;
        }

        let result = sqlx::query(
            "UPDATE cart_items SET quantity = $4
             WHERE cart_id = $1 AND product_id = $2 AND size_id IS NOT DISTINCT FROM $3",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(size_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.touch(cart_id).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not exist.
    pub async fn remove_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        size_id: Option<SizeId>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM cart_items
             WHERE cart_id = $1 AND product_id = $2 AND size_id IS NOT DISTINCT FROM $3",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(size_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.touch(cart_id).await
    }

    /// Remove every line from a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear_for_user(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query(
            "DELETE FROM cart_items WHERE cart_id IN (SELECT id FROM carts WHERE user_id = $1)",
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Merge guest-cart lines into a persisted cart.
    ///
    /// Quantities for the same product/size are summed, then the sizes of
    /// each product are clamped so together they fit its stock. Lines for missing, inactive or sold-out products are
    /// dropped. Runs in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn merge_guest_lines(
        &self,
        cart_id: CartId,
        guest_lines: &[CartLine],
    ) -> Result<Vec<CartLine>, RepositoryError> {
        if guest_lines.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;

        let existing: Vec<CartLine> = sqlx::query_as::<_, (ProductId, Option<SizeId>, i32)>(
            "SELECT product_id, size_id, quantity FROM cart_items
             WHERE cart_id = $1 ORDER BY created_at, id FOR UPDATE",
        )
        .bind(cart_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(product_id, size_id, quantity)| {
            CartLine::new(product_id, size_id, u32::try_from(quantity).unwrap_or(0))
        })
        .collect();

        let merged = merge_lines(&existing, guest_lines);

        let product_ids: Vec<i32> = merged.iter().map(|l| l.product_id.as_i32()).collect();
        let stock: HashMap<ProductId, i32> = sqlx::query_as::<_, (ProductId, i32)>(
            "SELECT id, stock FROM products WHERE id = ANY($1) AND is_active",
        )
        .bind(&product_ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .collect();

        let clamped = clamp_lines_to_stock(merged, &stock);

        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        for line in &clamped {
            sqlx::query(
                "INSERT INTO cart_items (cart_id, product_id, size_id, quantity)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(cart_id)
            .bind(line.product_id)
            .bind(line.size_id)
            .bind(i32::try_from(line.quantity).unwrap_or(i32::MAX))
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(clamped)
    }

    async fn touch(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
            .bind(cart_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
