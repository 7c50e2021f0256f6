//! Order repository.
//!
//! Orders are written as `pending` when a checkout session is opened. The
//! transition to `paid` and every status change that returns stock happen in
//! a single transaction together with the stock update.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use meridian_core::{OrderId, OrderStatus, UserId};

use crate::models::{NewOrder, Order, OrderFilter, OrderItem, ShippingAddress};
use crate::{Page, RepositoryError};

const ORDER_COLUMNS: &str = "id, user_id, email, status, subtotal, shipping, tax, total, currency, \
     checkout_session_id, payment_intent_id, subscription_id, shipping_name, shipping_line1, \
     shipping_line2, shipping_city, shipping_postal_code, shipping_country, created_at, \
     updated_at, paid_at";

/// Payment details recorded when an order is paid.
#[derive(Debug, Clone, Default)]
pub struct PaymentDetails {
    pub payment_intent_id: Option<String>,
    pub subscription_id: Option<String>,
    pub shipping: Option<ShippingAddress>,
}

pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a pending order and its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if an order already exists for the
    /// checkout session.
    pub async fn create_pending(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO orders (user_id, email, status, subtotal, shipping, tax, total,
                                 currency, checkout_session_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.user_id)
        .bind(&order.email)
        .bind(OrderStatus::Pending)
        .bind(order.subtotal)
        .bind(order.shipping)
        .bind(order.tax)
        .bind(order.total)
        .bind(&order.currency)
        .bind(&order.checkout_session_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, "orders"))?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items
                     (order_id, product_id, product_name, size_name, unit_price, quantity)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(created.id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(&item.size_name)
            .bind(item.unit_price)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::from_write(e, "order_items"))?;
        }

        tx.commit().await?;
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(order)
    }

    /// An order, only if it belongs to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        id: OrderId,
        user_id: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(order)
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(orders)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE checkout_session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(order)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_intent_id = $1
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(payment_intent_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(order)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, product_id, product_name, size_name, unit_price, quantity
             FROM order_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(items)
    }

    /// One page of orders, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &OrderFilter) -> Result<Page<Order>, RepositoryError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM orders WHERE $1::TEXT IS NULL OR status = $1",
        )
        .bind(filter.status)
        .fetch_one(self.pool)
        .await?;

        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE $1::TEXT IS NULL OR status = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(filter.status)
        .bind(filter.paging.limit())
        .bind(filter.paging.offset())
        .fetch_all(self.pool)
        .await?;

        Ok(filter.paging.page_of(orders, total))
    }

    /// Move an order to `next`, returning its previous status.
    ///
    /// When the change cancels or refunds an order that held stock, its
    /// items are returned to stock in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Conflict` if the transition is not allowed.
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<OrderStatus, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_scalar::<_, OrderStatus>(
            "SELECT status FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if !current.can_transition_to(next) {
            return Err(RepositoryError::Conflict(format!(
                "order cannot move from {} to {}",
                current.label(),
                next.label()
            )));
        }

        sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(next)
            .execute(&mut *tx)
            .await?;

        if current.releases_stock(next) {
            adjust_item_stock(&mut tx, id, 1).await?;
        }

        tx.commit().await?;
        Ok(current)
    }

    /// Mark an order paid and take its items out of stock.
    ///
    /// Only `pending` and `payment_failed` orders are updated, so repeated
    /// calls for the same payment are no-ops. Returns whether this call made
    /// the transition.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn mark_paid(
        &self,
        id: OrderId,
        details: &PaymentDetails,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let shipping = details.shipping.as_ref();

        let updated = sqlx::query_scalar::<_, OrderId>(
            "UPDATE orders
             SET status = $2,
                 paid_at = NOW(),
                 updated_at = NOW(),
                 payment_intent_id = COALESCE($3, payment_intent_id),
                 subscription_id = COALESCE($4, subscription_id),
                 shipping_name = COALESCE($5, shipping_name),
                 shipping_line1 = COALESCE($6, shipping_line1),
                 shipping_line2 = COALESCE($7, shipping_line2),
                 shipping_city = COALESCE($8, shipping_city),
                 shipping_postal_code = COALESCE($9, shipping_postal_code),
                 shipping_country = COALESCE($10, shipping_country)
             WHERE id = $1 AND status IN ($11, $12)
             RETURNING id",
        )
        .bind(id)
        .bind(OrderStatus::Paid)
        .bind(&details.payment_intent_id)
        .bind(&details.subscription_id)
        .bind(shipping.and_then(|s| s.name.clone()))
        .bind(shipping.map(|s| s.line1.clone()))
        .bind(shipping.and_then(|s| s.line2.clone()))
        .bind(shipping.and_then(|s| s.city.clone()))
        .bind(shipping.and_then(|s| s.postal_code.clone()))
        .bind(shipping.and_then(|s| s.country.clone()))
        .bind(OrderStatus::Pending)
        .bind(OrderStatus::PaymentFailed)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            tx.rollback().await?;
            return Ok(false);
        }

        adjust_item_stock(&mut tx, id, -1).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Record the payment intent for an order (used before payment succeeds).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_payment_intent(
        &self,
        id: OrderId,
        payment_intent_id: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE orders SET payment_intent_id = $2, updated_at = NOW()
             WHERE id = $1 AND payment_intent_id IS NULL",
        )
        .bind(id)
        .bind(payment_intent_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Sum of totals for orders that have been paid and not refunded or cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn revenue_total(&self) -> Result<Decimal, RepositoryError> {
        let statuses: Vec<&str> = OrderStatus::ALL
            .iter()
            .filter(|s| s.holds_stock())
            .map(OrderStatus::as_str)
            .collect();

        let total = sqlx::query_scalar::<_, Option<Decimal>>(
            "SELECT SUM(total) FROM orders WHERE status = ANY($1)",
        )
        .bind(&statuses)
        .fetch_one(self.pool)
        .await?;

        Ok(total.unwrap_or(Decimal::ZERO))
    }

    /// Number of orders, optionally only those in `status`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, status: Option<OrderStatus>) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM orders WHERE $1::TEXT IS NULL OR status = $1",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Most recent orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent(&self, limit: i64) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(orders)
    }
}

/// Add (`sign = 1`) or remove (`sign = -1`) each item's quantity from stock.
async fn adjust_item_stock(
    tx: &mut Transaction<'_, Postgres>,
    order_id: OrderId,
    sign: i32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE products p
         SET stock = GREATEST(p.stock + $2 * oi.quantity, 0), updated_at = NOW()
         FROM (
             SELECT product_id, SUM(quantity)::INT4 AS quantity
             FROM order_items
             WHERE order_id = $1 AND product_id IS NOT NULL
             GROUP BY product_id
         ) oi
         WHERE p.id = oi.product_id",
    )
    .bind(order_id)
    .bind(sign)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
