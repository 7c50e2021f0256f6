//! Row types returned by the repositories.
//!
//! These map one-to-one onto query results via `sqlx::FromRow`. Typed IDs,
//! `Email`, `OrderStatus` and `Rating` decode directly from their columns.

pub mod cart;
pub mod catalog;
pub mod order;
pub mod review;
pub mod user;

pub use cart::{Cart, CartLineRow};
pub use catalog::{Category, CategoryWithCount, Product, ProductInput, ProductSort, Size};
pub use order::{NewOrder, NewOrderItem, Order, OrderFilter, OrderItem, ShippingAddress};
pub use review::{NewReview, RatingSummary, Review};
pub use user::User;
