//! Review moderation route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    extract::{Path, Query, State},
    response::Redirect,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use meridian_core::ReviewId;
use meridian_db::models::Review;
use meridian_db::{Paging, ReviewRepository};

use crate::error::Result;
use crate::filters;
use crate::middleware::{RequireAdminAuth, set_flash};
use crate::models::Flash;
use crate::state::AppState;
use crate::views::{LayoutView, PaginationView, Section};

const PER_PAGE: u32 = 30;

/// Review row in the moderation table.
#[derive(Debug, Clone)]
pub struct ReviewRowView {
    pub id: i32,
    pub product_id: i32,
    pub product_name: String,
    pub author_name: String,
    pub stars: String,
    pub title: String,
    pub body: String,
    pub is_approved: bool,
    pub created_at: String,
}

impl From<&Review> for ReviewRowView {
    fn from(review: &Review) -> Self {
        Self {
            id: review.id.as_i32(),
            product_id: review.product_id.as_i32(),
            product_name: review.product_name.clone(),
            author_name: review.author_name.clone(),
            stars: review.rating.stars(),
            title: review.title.clone(),
            body: review.body.clone(),
            is_approved: review.is_approved,
            created_at: review.created_at.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Moderation filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewFilter {
    All,
    Pending,
    Approved,
}

impl ReviewFilter {
    fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("pending") => Self::Pending,
            Some("approved") => Self::Approved,
            _ => Self::All,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Pending => "pending",
            Self::Approved => "approved",
        }
    }

    const fn approved(self) -> Option<bool> {
        match self {
            Self::All => None,
            Self::Pending => Some(false),
            Self::Approved => Some(true),
        }
    }
}

/// Moderation page template.
#[derive(Template, WebTemplate)]
#[template(path = "reviews/index.html")]
pub struct ReviewsTemplate {
    pub layout: LayoutView,
    pub reviews: Vec<ReviewRowView>,
    pub filter: &'static str,
    pub pending: i64,
    pub pagination: PaginationView,
}

/// Query parameters for the moderation page.
#[derive(Debug, Default, Deserialize)]
pub struct ReviewsQuery {
    pub filter: Option<String>,
    pub page: Option<u32>,
}

/// Build the reviews router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reviews", get(index))
        .route("/reviews/{id}/approve", post(approve))
        .route("/reviews/{id}/hide", post(hide))
        .route("/reviews/{id}/delete", post(delete))
}

/// Reviews awaiting moderation come first.
///
/// GET /reviews
#[instrument(skip(admin, state, session))]
async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ReviewsQuery>,
) -> Result<ReviewsTemplate> {
    let filter = ReviewFilter::from_param(query.filter.as_deref());
    let reviews = ReviewRepository::new(state.pool());
    let page = reviews
        .list_all(filter.approved(), Paging::new(query.page, PER_PAGE))
        .await?;
    let pending = reviews.count_pending().await?;

    let pagination = PaginationView::new(&page, |p| {
        format!("/reviews?filter={}&page={p}", filter.as_str())
    });

    Ok(ReviewsTemplate {
        layout: LayoutView::load(&session, &admin, Section::Reviews).await,
        reviews: page.items.iter().map(ReviewRowView::from).collect(),
        filter: filter.as_str(),
        pending,
        pagination,
    })
}

/// Publish a review on the product page.
///
/// POST /reviews/{id}/approve
#[instrument(skip(_admin, state, session))]
async fn approve(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Redirect> {
    ReviewRepository::new(state.pool())
        .set_approved(ReviewId::new(id), true)
        .await?;
    tracing::info!(review_id = id, "review approved");
    set_flash(&session, Flash::success("Review published.")).await;
    Ok(Redirect::to("/reviews"))
}

/// Take a review off the product page without deleting it.
///
/// POST /reviews/{id}/hide
#[instrument(skip(_admin, state, session))]
async fn hide(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Redirect> {
    ReviewRepository::new(state.pool())
        .set_approved(ReviewId::new(id), false)
        .await?;
    tracing::info!(review_id = id, "review hidden");
    set_flash(&session, Flash::success("Review hidden.")).await;
    Ok(Redirect::to("/reviews"))
}

/// POST /reviews/{id}/delete
#[instrument(skip(_admin, state, session))]
async fn delete(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Redirect> {
    ReviewRepository::new(state.pool())
        .delete(ReviewId::new(id))
        .await?;
    tracing::info!(review_id = id, "review deleted");
    set_flash(&session, Flash::success("Review deleted.")).await;
    Ok(Redirect::to("/reviews"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_filter_params() {
        assert_eq!(ReviewFilter::from_param(Some("pending")).approved(), Some(false));
        assert_eq!(ReviewFilter::from_param(Some("approved")).approved(), Some(true));
        assert_eq!(ReviewFilter::from_param(Some("bogus")), ReviewFilter::All);
        assert_eq!(ReviewFilter::from_param(None).approved(), None);
    }
}
