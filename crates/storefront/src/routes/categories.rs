//! Category route handlers.

use axum::extract::{Path, Query, State};
use tower_sessions::Session;
use tracing::instrument;

use meridian_db::CategoryRepository;

use super::products::{ListingQuery, ProductsIndexTemplate, render_listing};
use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::state::AppState;

/// Display products in one category.
#[instrument(skip(state, session, user, query))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(slug): Path<String>,
    Query(query): Query<ListingQuery>,
) -> Result<ProductsIndexTemplate> {
    let category = CategoryRepository::new(state.pool())
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("category {slug}")))?;

    let base_path = format!("/categories/{}", category.slug);
    render_listing(&state, &session, user, Some(category), query, &base_path).await
}
