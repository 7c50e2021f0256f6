//! Status enums for orders and users.
//!
//! Both enums are stored as `TEXT` columns using their snake_case names so
//! that new variants don't require a Postgres enum migration.

use serde::{Deserialize, Serialize};

/// Implements `sqlx` text encoding for an enum with `as_str` and `FromStr`.
macro_rules! text_enum_sqlx {
    ($name:ident) => {
        #[cfg(feature = "postgres")]
        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                Ok(s.parse()?)
            }
        }

        #[cfg(feature = "postgres")]
        impl sqlx::Encode<'_, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }
    };
}

/// Error returned when a status string is not recognized.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

/// Lifecycle of an order.
///
/// Orders are created `Pending` when a hosted checkout session is opened and
/// move forward from there. Stock is taken when an order becomes `Paid` and
/// returned if a stock-holding order is cancelled or refunded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
    PaymentFailed,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 8] = [
        Self::Pending,
        Self::Paid,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
        Self::Refunded,
        Self::PaymentFailed,
    ];

    /// Database and URL representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::PaymentFailed => "payment_failed",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Paid => "Paid",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Refunded => "Refunded",
            Self::PaymentFailed => "Payment failed",
        }
    }

    /// Whether an order in this status can move to `next`.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        use OrderStatus::{
            Cancelled, Delivered, Paid, PaymentFailed, Pending, Processing, Refunded, Shipped,
        };
        matches!(
            (self, next),
            (Pending, Paid | Cancelled | PaymentFailed)
                | (PaymentFailed, Paid | Cancelled)
                | (Paid, Processing | Shipped | Cancelled | Refunded)
                | (Processing, Shipped | Cancelled | Refunded)
                | (Shipped, Delivered | Refunded)
                | (Delivered, Refunded)
        )
    }

    /// Statuses reachable from this one.
    #[must_use]
    pub fn next_statuses(&self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|next| self.can_transition_to(*next))
            .collect()
    }

    /// Whether stock has been taken for an order in this status.
    #[must_use]
    pub const fn holds_stock(&self) -> bool {
        matches!(
            self,
            Self::Paid | Self::Processing | Self::Shipped | Self::Delivered
        )
    }

    /// Whether moving from `self` to `next` should put stock back.
    #[must_use]
    pub const fn releases_stock(&self, next: Self) -> bool {
        self.holds_stock() && matches!(next, Self::Cancelled | Self::Refunded)
    }

    /// No further transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }

    /// Payment has been captured at some point.
    #[must_use]
    pub const fn is_paid(&self) -> bool {
        self.holds_stock() || matches!(self, Self::Refunded)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "order status",
                value: s.to_owned(),
            })
    }
}

text_enum_sqlx!(OrderStatus);

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Customer,
    /// Can sign in to the back-office.
    Admin,
}

impl UserRole {
    /// Database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            _ => Err(UnknownVariant {
                kind: "user role",
                value: s.to_owned(),
            }),
        }
    }
}

text_enum_sqlx!(UserRole);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_round_trips_through_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_pending_transitions() {
        let pending = OrderStatus::Pending;
        assert!(pending.can_transition_to(OrderStatus::Paid));
        assert!(pending.can_transition_to(OrderStatus::Cancelled));
        assert!(pending.can_transition_to(OrderStatus::PaymentFailed));
        assert!(!pending.can_transition_to(OrderStatus::Shipped));
        assert!(!pending.can_transition_to(OrderStatus::Refunded));
    }

    #[test]
    fn test_terminal_statuses_have_no_exits() {
        for status in [OrderStatus::Cancelled, OrderStatus::Refunded] {
            assert!(status.is_terminal());
            assert!(status.next_statuses().is_empty());
        }
    }

    #[test]
    fn test_shipped_cannot_be_cancelled() {
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_releases_stock_only_from_holding_states() {
        assert!(OrderStatus::Paid.releases_stock(OrderStatus::Cancelled));
        assert!(OrderStatus::Delivered.releases_stock(OrderStatus::Refunded));
        assert!(!OrderStatus::Pending.releases_stock(OrderStatus::Cancelled));
        assert!(!OrderStatus::PaymentFailed.releases_stock(OrderStatus::Cancelled));
        assert!(!OrderStatus::Paid.releases_stock(OrderStatus::Shipped));
    }

    #[test]
    fn test_user_role_parse() {
        assert_eq!("admin".parse::<UserRole>(), Ok(UserRole::Admin));
        assert_eq!(UserRole::default(), UserRole::Customer);
        assert!("viewer".parse::<UserRole>().is_err());
    }
}
