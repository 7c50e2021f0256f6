//! Subscription route handlers.

use axum::{
    extract::{Path, State},
    response::Redirect,
};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::middleware::{RequireAuth, set_flash};
use crate::models::Flash;
use crate::services::subscription::SubscriptionService;
use crate::state::AppState;

/// Start a subscription checkout for a product.
#[instrument(skip(state, session, user))]
pub async fn start(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
) -> Result<Redirect> {
    match SubscriptionService::new(&state).start(&user, &slug).await {
        Ok(url) => Ok(Redirect::to(&url)),
        Err(e) => {
            let message = e.into_flash_message()?;
            set_flash(&session, Flash::error(message)).await;
            Ok(Redirect::to(&format!("/products/{slug}")))
        }
    }
}
