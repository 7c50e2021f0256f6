//! Cart operations for guests and signed-in customers.
//!
//! Guests keep a [`GuestCart`] in their session; signed-in customers have a
//! persistent cart row. [`CartService`] hides the difference behind
//! [`CartOwner`] and enforces the same rules for both: the product must be
//! active, the size must be one the product is offered in, and the units of
//! a product across all of its sizes may not exceed its stock.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tower_sessions::Session;

use meridian_core::cart::{CartLine, MAX_LINE_QUANTITY, product_quantity};
use meridian_core::pricing::{CartTotals, PricingRules};
use meridian_core::{ProductId, SizeId, UserId};
use meridian_db::models::{CartLineRow, Product, Size};
use meridian_db::{CartRepository, ProductRepository, RepositoryError, SizeRepository};

use crate::models::{CurrentUser, keys};

/// Errors from cart operations. Everything except `Session` and
/// `Repository` is the shopper's to fix and is shown to them.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("That product could not be found.")]
    ProductNotFound,

    #[error("{0} is no longer available.")]
    ProductUnavailable(String),

    #[error("Please choose a size.")]
    SizeRequired,

    #[error("That size is not offered for this product.")]
    InvalidSize,

    #[error("Quantity must be between 1 and {MAX_LINE_QUANTITY}.")]
    InvalidQuantity,

    #[error("Only {available} of {product} left in stock.")]
    InsufficientStock { product: String, available: i32 },

    #[error("That item is not in your cart.")]
    LineNotFound,

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl CartError {
    /// Whether this is a server-side failure rather than a shopper mistake.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Session(_) | Self::Repository(_))
    }
}

/// Cart kept in the session for visitors who are not signed in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCart {
    pub lines: Vec<CartLine>,
}

impl GuestCart {
    /// Load the guest cart from the session (empty if absent).
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn load(session: &Session) -> Result<Self, tower_sessions::session::Error> {
        Ok(session
            .get::<Self>(keys::GUEST_CART)
            .await?
            .unwrap_or_default())
    }

    /// Write the guest cart back to the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn save(&self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        if self.lines.is_empty() {
            session.remove::<Self>(keys::GUEST_CART).await?;
            Ok(())
        } else {
            session.insert(keys::GUEST_CART, self).await
        }
    }

    /// Lines for one product, one per size.
    #[must_use]
    pub fn product_lines(&self, product_id: ProductId) -> Vec<CartLine> {
        self.lines
            .iter()
            .filter(|l| l.product_id == product_id)
            .copied()
            .collect()
    }

    /// Add units, summing with an existing line. Returns the new quantity.
    pub fn add(&mut self, product_id: ProductId, size_id: Option<SizeId>, quantity: u32) -> u32 {
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id && l.size_id == size_id)
        {
            line.quantity = line.quantity.saturating_add(quantity).min(MAX_LINE_QUANTITY);
            return line.quantity;
        }
        let quantity = quantity.min(MAX_LINE_QUANTITY);
        self.lines
            .push(CartLine::new(product_id, size_id, quantity));
        quantity
    }

    /// Set a line's quantity; zero removes it. Returns whether the line existed.
    pub fn set_quantity(
        &mut self,
        product_id: ProductId,
        size_id: Option<SizeId>,
        quantity: u32,
    ) -> bool {
        if quantity == 0 {
            return self.remove(product_id, size_id);
        }
        match self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id && l.size_id == size_id)
        {
            Some(line) => {
                line.quantity = quantity.min(MAX_LINE_QUANTITY);
                true
            }
            None => false,
        }
    }

    /// Remove a line. Returns whether it existed.
    pub fn remove(&mut self, product_id: ProductId, size_id: Option<SizeId>) -> bool {
        let before = self.lines.len();
        self.lines
            .retain(|l| !(l.product_id == product_id && l.size_id == size_id));
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |sum, l| sum.saturating_add(l.quantity))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Whose cart an operation applies to.
#[derive(Clone, Copy)]
pub enum CartOwner<'s> {
    Guest(&'s Session),
    User(UserId),
}

impl<'s> CartOwner<'s> {
    /// The signed-in user's cart, or the session's guest cart.
    #[must_use]
    pub fn resolve(user: Option<&CurrentUser>, session: &'s Session) -> Self {
        user.map_or(Self::Guest(session), |u| Self::User(u.id))
    }

    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Guest(_) => None,
            Self::User(id) => Some(*id),
        }
    }
}

/// A cart line with the product details needed to display and price it.
#[derive(Debug, Clone)]
pub struct CartItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_slug: String,
    pub image_path: Option<String>,
    pub unit_price: Decimal,
    pub size_id: Option<SizeId>,
    pub size_name: Option<String>,
    pub quantity: u32,
    pub stock: i32,
    pub is_active: bool,
}

impl CartItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    fn from_row(row: &CartLineRow) -> Self {
        Self {
            product_id: row.product_id,
            product_name: row.product_name.clone(),
            product_slug: row.product_slug.clone(),
            image_path: row.image_path.clone(),
            unit_price: row.unit_price,
            size_id: row.size_id,
            size_name: row.size_name.clone(),
            quantity: u32::try_from(row.quantity).unwrap_or(0),
            stock: row.stock,
            is_active: row.is_active,
        }
    }

    fn from_guest_line(line: &CartLine, product: &Product, sizes: &HashMap<SizeId, Size>) -> Self {
        Self {
            product_id: product.id,
            product_name: product.name.clone(),
            product_slug: product.slug.clone(),
            image_path: product.image_path.clone(),
            unit_price: product.price,
            size_id: line.size_id,
            size_name: line
                .size_id
                .and_then(|id| sizes.get(&id))
                .map(|s| s.name.clone()),
            quantity: line.quantity,
            stock: product.stock,
            is_active: product.is_active,
        }
    }
}

/// Cart contents plus totals.
#[derive(Debug, Clone)]
pub struct CartSummary {
    pub items: Vec<CartItem>,
    /// Totals over active lines only.
    pub totals: CartTotals,
}

impl CartSummary {
    #[must_use]
    pub fn new(items: Vec<CartItem>, rules: &PricingRules) -> Self {
        let totals = CartTotals::compute(
            items
                .iter()
                .filter(|i| i.is_active)
                .map(|i| (i.unit_price, i.quantity)),
            rules,
        );
        Self { items, totals }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Units of a product in the cart across all of its sizes.
    #[must_use]
    pub fn product_units(&self, product_id: ProductId) -> u32 {
        self.items
            .iter()
            .filter(|i| i.product_id == product_id)
            .fold(0_u32, |sum, i| sum.saturating_add(i.quantity))
    }

    /// Why a line cannot be bought as is, if it cannot.
    ///
    /// Stock is checked against the product's units in every size, since
    /// sizes share one stock count.
    #[must_use]
    pub fn problem_with(&self, item: &CartItem) -> Option<CartError> {
        if !item.is_active {
            return Some(CartError::ProductUnavailable(item.product_name.clone()));
        }
        let units = self.product_units(item.product_id);
        (i64::from(item.stock) < i64::from(units)).then(|| CartError::InsufficientStock {
            product: item.product_name.clone(),
            available: item.stock.max(0),
        })
    }

    /// First line that cannot be bought as is, with the reason.
    #[must_use]
    pub fn first_problem(&self) -> Option<CartError> {
        self.items.iter().find_map(|i| self.problem_with(i))
    }
}

/// Cart operations over either kind of cart.
pub struct CartService<'a> {
    pool: &'a PgPool,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Add units of a product (and size) to the cart.
    ///
    /// Returns the line's new quantity.
    ///
    /// # Errors
    ///
    /// Returns a shopper-facing `CartError` if the product, size or quantity is
    /// not acceptable, or an internal one if storage fails.
    pub async fn add(
        &self,
        owner: CartOwner<'_>,
        product_id: ProductId,
        size_id: Option<SizeId>,
        quantity: u32,
    ) -> Result<u32, CartError> {
        if quantity == 0 || quantity > MAX_LINE_QUANTITY {
            return Err(CartError::InvalidQuantity);
        }
        let product = self.purchasable_product(product_id).await?;
        let size_id = self.check_size(&product, size_id).await?;

        let lines = self.product_lines(owner, product_id).await?;
        let existing = lines
            .iter()
            .find(|l| l.size_id == size_id)
            .map_or(0, |l| l.quantity);
        if existing.saturating_add(quantity) > MAX_LINE_QUANTITY {
            return Err(CartError::InvalidQuantity);
        }
        ensure_stock(
            &product,
            product_quantity(&lines, product_id).saturating_add(quantity),
        )?;

        match owner {
            CartOwner::Guest(session) => {
                let mut cart = GuestCart::load(session).await?;
                let new_quantity = cart.add(product_id, size_id, quantity);
                cart.save(session).await?;
                Ok(new_quantity)
            }
            CartOwner::User(user_id) => {
                let carts = CartRepository::new(self.pool);
                let cart = carts.get_or_create_for_user(user_id).await?;
                let new_quantity = carts
                    .add_item(cart.id, product_id, size_id, to_i32(quantity))
                    .await?;
                Ok(u32::try_from(new_quantity).unwrap_or(0))
            }
        }
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InsufficientStock` if stock cannot cover the new
    /// quantity together with the product's other sizes, and
    /// `CartError::LineNotFound` if the line is not in the cart.
    pub async fn set_quantity(
        &self,
        owner: CartOwner<'_>,
        product_id: ProductId,
        size_id: Option<SizeId>,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove(owner, product_id, size_id).await;
        }
        if quantity > MAX_LINE_QUANTITY {
            return Err(CartError::InvalidQuantity);
        }

        let product = ProductRepository::new(self.pool)
            .get_by_id(product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;
        let lines = self.product_lines(owner, product_id).await?;
        let current = lines
            .iter()
            .find(|l| l.size_id == size_id)
            .ok_or(CartError::LineNotFound)?;
        let other_sizes = product_quantity(&lines, product_id).saturating_sub(current.quantity);
        ensure_stock(&product, other_sizes.saturating_add(quantity))?;

        match owner {
            CartOwner::Guest(session) => {
                let mut cart = GuestCart::load(session).await?;
                if !cart.set_quantity(product_id, size_id, quantity) {
                    return Err(CartError::LineNotFound);
                }
                cart.save(session).await?;
            }
            CartOwner::User(user_id) => {
                let carts = CartRepository::new(self.pool);
                let cart = carts.get_or_create_for_user(user_id).await?;
                carts
                    .set_quantity(cart.id, product_id, size_id, to_i32(quantity))
                    .await
                    .map_err(not_found_as_missing_line)?;
            }
        }
        Ok(())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the line is not in the cart.
    pub async fn remove(
        &self,
        owner: CartOwner<'_>,
        product_id: ProductId,
        size_id: Option<SizeId>,
    ) -> Result<(), CartError> {
        match owner {
            CartOwner::Guest(session) => {
                let mut cart = GuestCart::load(session).await?;
                if !cart.remove(product_id, size_id) {
                    return Err(CartError::LineNotFound);
                }
                cart.save(session).await?;
            }
            CartOwner::User(user_id) => {
                let carts = CartRepository::new(self.pool);
                let cart = carts.get_or_create_for_user(user_id).await?;
                carts
                    .remove_item(cart.id, product_id, size_id)
                    .await
                    .map_err(not_found_as_missing_line)?;
            }
        }
        Ok(())
    }

    /// Cart lines with product details and totals.
    ///
    /// Guest lines whose product has been deleted are dropped.
    ///
    /// # Errors
    ///
    /// Returns an internal `CartError` if storage fails.
    pub async fn summary(
        &self,
        owner: CartOwner<'_>,
        rules: &PricingRules,
    ) -> Result<CartSummary, CartError> {
        let items = match owner {
            CartOwner::Guest(session) => {
                let cart = GuestCart::load(session).await?;
                self.guest_items(&cart).await?
            }
            CartOwner::User(user_id) => {
                let carts = CartRepository::new(self.pool);
                let cart = carts.get_or_create_for_user(user_id).await?;
                carts
                    .lines(cart.id)
                    .await?
                    .iter()
                    .map(CartItem::from_row)
                    .collect()
            }
        };

        Ok(CartSummary::new(items, rules))
    }

    /// Number of units in the cart, for the header badge.
    ///
    /// # Errors
    ///
    /// Returns an internal `CartError` if storage fails.
    pub async fn item_count(&self, owner: CartOwner<'_>) -> Result<u32, CartError> {
        match owner {
            CartOwner::Guest(session) => Ok(GuestCart::load(session).await?.item_count()),
            CartOwner::User(user_id) => {
                let carts = CartRepository::new(self.pool);
                let cart = carts.get_or_create_for_user(user_id).await?;
                Ok(carts
                    .lines(cart.id)
                    .await?
                    .iter()
                    .map(|l| u32::try_from(l.quantity).unwrap_or(0))
                    .fold(0_u32, u32::saturating_add))
            }
        }
    }

    /// Move the session's guest cart into the user's persistent cart.
    ///
    /// Quantities for the same product/size are summed and clamped to stock.
    /// The guest cart is emptied afterwards. Returns the number of lines in
    /// the merged cart.
    ///
    /// # Errors
    ///
    /// Returns an internal `CartError` if storage fails.
    pub async fn merge_guest_into_user(
        &self,
        session: &Session,
        user_id: UserId,
    ) -> Result<usize, CartError> {
        let guest = GuestCart::load(session).await?;
        if guest.is_empty() {
            return Ok(0);
        }

        let carts = CartRepository::new(self.pool);
        let cart = carts.get_or_create_for_user(user_id).await?;
        let merged = carts.merge_guest_lines(cart.id, &guest.lines).await?;

        GuestCart::default().save(session).await?;
        tracing::info!(
            user_id = %user_id,
            guest_lines = guest.lines.len(),
            merged_lines = merged.len(),
            "merged guest cart"
        );
        Ok(merged.len())
    }

    async fn guest_items(&self, cart: &GuestCart) -> Result<Vec<CartItem>, CartError> {
        if cart.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<ProductId> = cart.lines.iter().map(|l| l.product_id).collect();
        let products: HashMap<ProductId, Product> = ProductRepository::new(self.pool)
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let sizes: HashMap<SizeId, Size> = SizeRepository::new(self.pool)
            .list()
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        Ok(cart
            .lines
            .iter()
            .filter_map(|line| {
                products
                    .get(&line.product_id)
                    .map(|product| CartItem::from_guest_line(line, product, &sizes))
            })
            .collect())
    }

    async fn product_lines(
        &self,
        owner: CartOwner<'_>,
        product_id: ProductId,
    ) -> Result<Vec<CartLine>, CartError> {
        match owner {
            CartOwner::Guest(session) => {
                Ok(GuestCart::load(session).await?.product_lines(product_id))
            }
            CartOwner::User(user_id) => {
                let carts = CartRepository::new(self.pool);
                let cart = carts.get_or_create_for_user(user_id).await?;
                Ok(carts.product_lines(cart.id, product_id).await?)
            }
        }
    }

    async fn purchasable_product(&self, product_id: ProductId) -> Result<Product, CartError> {
        let product = ProductRepository::new(self.pool)
            .get_by_id(product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;
        if !product.is_active {
            return Err(CartError::ProductUnavailable(product.name));
        }
        Ok(product)
    }

    /// Products offered in sizes need one of them; others take none.
    async fn check_size(
        &self,
        product: &Product,
        size_id: Option<SizeId>,
    ) -> Result<Option<SizeId>, CartError> {
        let offered = SizeRepository::new(self.pool)
            .list_for_product(product.id)
            .await?;
        resolve_size(&offered, size_id)
    }
}

fn resolve_size(offered: &[Size], requested: Option<SizeId>) -> Result<Option<SizeId>, CartError> {
    if offered.is_empty() {
        return Ok(None);
    }
    let size_id = requested.ok_or(CartError::SizeRequired)?;
    if offered.iter().any(|s| s.id == size_id) {
        Ok(Some(size_id))
    } else {
        Err(CartError::InvalidSize)
    }
}

fn ensure_stock(product: &Product, quantity: u32) -> Result<(), CartError> {
    if i64::from(product.stock) < i64::from(quantity) {
        return Err(CartError::InsufficientStock {
            product: product.name.clone(),
            available: product.stock.max(0),
        });
    }
    Ok(())
}

fn not_found_as_missing_line(e: RepositoryError) -> CartError {
    match e {
        RepositoryError::NotFound => CartError::LineNotFound,
        other => CartError::Repository(other),
    }
}

fn to_i32(quantity: u32) -> i32 {
    i32::try_from(quantity).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use meridian_core::CategoryId;

    use super::*;

    fn pid(n: i32) -> ProductId {
        ProductId::new(n)
    }

    fn size(id: i32, name: &str) -> Size {
        Size {
            id: SizeId::new(id),
            name: name.to_string(),
            sort_order: id,
        }
    }

    fn product(stock: i32) -> Product {
        Product {
            id: pid(1),
            category_id: CategoryId::new(1),
            name: "Canvas Tote".to_string(),
            slug: "canvas-tote".to_string(),
            sku: "TOTE-1".to_string(),
            description: String::new(),
            price: Decimal::new(2500, 2),
            compare_at_price: None,
            stock,
            image_path: None,
            is_active: true,
            is_featured: false,
            subscription_price_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(quantity: u32, stock: i32, price: i64, active: bool) -> CartItem {
        sized_item(None, quantity, stock, price, active)
    }

    fn sized_item(
        size: Option<i32>,
        quantity: u32,
        stock: i32,
        price: i64,
        active: bool,
    ) -> CartItem {
        CartItem {
            product_id: pid(1),
            product_name: "Canvas Tote".to_string(),
            product_slug: "canvas-tote".to_string(),
            image_path: None,
            unit_price: Decimal::new(price, 2),
            size_id: size.map(SizeId::new),
            size_name: size.map(|s| format!("Size {s}")),
            quantity,
            stock,
            is_active: active,
        }
    }

    #[test]
    fn test_guest_cart_add_sums_same_item() {
        let mut cart = GuestCart::default();
        assert_eq!(cart.add(pid(1), Some(SizeId::new(2)), 1), 1);
        assert_eq!(cart.add(pid(1), Some(SizeId::new(2)), 2), 3);
        assert_eq!(cart.add(pid(1), None, 1), 1);
        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.item_count(), 4);
    }

    #[test]
    fn test_guest_cart_add_caps_line_quantity() {
        let mut cart = GuestCart::default();
        cart.add(pid(1), None, 90);
        assert_eq!(cart.add(pid(1), None, 20), MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_guest_cart_set_quantity_and_remove() {
        let mut cart = GuestCart::default();
        cart.add(pid(1), None, 2);
        assert!(cart.set_quantity(pid(1), None, 5));
        assert_eq!(cart.item_count(), 5);
        assert!(!cart.set_quantity(pid(2), None, 1));

        assert!(cart.set_quantity(pid(1), None, 0));
        assert!(cart.is_empty());
        assert!(!cart.remove(pid(1), None));
    }

    #[test]
    fn test_guest_cart_clear() {
        let mut cart = GuestCart::default();
        cart.add(pid(1), None, 1);
        cart.add(pid(2), None, 1);
        cart.clear();
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn test_resolve_size() {
        let offered = [size(1, "S"), size(2, "M")];
        assert_eq!(
            resolve_size(&offered, Some(SizeId::new(2))).ok(),
            Some(Some(SizeId::new(2)))
        );
        assert!(matches!(
            resolve_size(&offered, None),
            Err(CartError::SizeRequired)
        ));
        assert!(matches!(
            resolve_size(&offered, Some(SizeId::new(9))),
            Err(CartError::InvalidSize)
        ));
        // Unsized products ignore any size sent along
        assert_eq!(resolve_size(&[], Some(SizeId::new(1))).ok(), Some(None));
    }

    #[test]
    fn test_ensure_stock() {
        assert!(ensure_stock(&product(3), 3).is_ok());
        match ensure_stock(&product(2), 3) {
            Err(CartError::InsufficientStock { product, available }) => {
                assert_eq!(product, "Canvas Tote");
                assert_eq!(available, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_summary_totals_skip_inactive_lines() {
        let rules = PricingRules {
            flat_shipping_rate: Decimal::new(500, 2),
            free_shipping_threshold: None,
            tax_rate_percent: Decimal::ZERO,
        };
        let summary = CartSummary::new(
            vec![item(2, 10, 1000, true), item(1, 10, 9900, false)],
            &rules,
        );
        assert_eq!(summary.totals.subtotal, Decimal::new(2000, 2));
        assert_eq!(summary.totals.total, Decimal::new(2500, 2));
        assert!(matches!(
            summary.first_problem(),
            Some(CartError::ProductUnavailable(_))
        ));
    }

    #[test]
    fn test_first_problem_reports_stock() {
        let summary = CartSummary::new(vec![item(4, 1, 1000, true)], &PricingRules::default());
        assert!(matches!(
            summary.first_problem(),
            Some(CartError::InsufficientStock { available: 1, .. })
        ));
        let fine = CartSummary::new(vec![item(1, 1, 1000, true)], &PricingRules::default());
        assert!(fine.first_problem().is_none());
    }

    #[test]
    fn test_first_problem_sums_sizes_of_one_product() {
        let summary = CartSummary::new(
            vec![
                sized_item(Some(1), 5, 5, 1000, true),
                sized_item(Some(2), 5, 5, 1000, true),
            ],
            &PricingRules::default(),
        );
        assert_eq!(summary.product_units(pid(1)), 10);
        assert!(matches!(
            summary.first_problem(),
            Some(CartError::InsufficientStock { available: 5, .. })
        ));

        let fits = CartSummary::new(
            vec![
                sized_item(Some(1), 3, 5, 1000, true),
                sized_item(Some(2), 2, 5, 1000, true),
            ],
            &PricingRules::default(),
        );
        assert!(fits.first_problem().is_none());
    }

    #[test]
    fn test_guest_cart_product_lines() {
        let mut cart = GuestCart::default();
        cart.add(pid(1), Some(SizeId::new(1)), 2);
        cart.add(pid(2), None, 1);
        cart.add(pid(1), Some(SizeId::new(2)), 3);

        let lines = cart.product_lines(pid(1));
        assert_eq!(lines.len(), 2);
        assert_eq!(product_quantity(&lines, pid(1)), 5);
    }

    #[test]
    fn test_error_visibility() {
        assert!(!CartError::SizeRequired.is_internal());
        assert!(CartError::Repository(RepositoryError::NotFound).is_internal());
        assert_eq!(
            CartError::InsufficientStock {
                product: "Mug".into(),
                available: 0
            }
            .to_string(),
            "Only 0 of Mug left in stock."
        );
    }
}
