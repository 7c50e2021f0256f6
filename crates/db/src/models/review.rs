//! Product reviews.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use meridian_core::{ProductId, Rating, ReviewId, UserId};

/// A review joined with its author's name and the product name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub rating: Rating,
    pub title: String,
    pub body: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub author_name: String,
    pub product_name: String,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub rating: Rating,
    pub title: String,
    pub body: String,
    pub is_approved: bool,
}

/// Approved review count and mean rating for a product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct RatingSummary {
    pub count: i64,
    pub average: Option<Decimal>,
}

impl RatingSummary {
    /// Average rounded to one decimal, e.g. "4.3".
    #[must_use]
    pub fn average_display(&self) -> Option<String> {
        self.average.map(|avg| {
            avg.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
                .to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_display() {
        let summary = RatingSummary {
            count: 3,
            average: Some(Decimal::new(43_333, 4)),
        };
        assert_eq!(summary.average_display().as_deref(), Some("4.3"));
        assert_eq!(RatingSummary::default().average_display(), None);
    }
}
