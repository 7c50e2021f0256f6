//! Wishlist route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Form, extract::State, response::Redirect};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use meridian_core::ProductId;
use meridian_db::{RepositoryError, WishlistRepository};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{RequireAuth, safe_return_path, set_flash};
use crate::models::Flash;
use crate::state::AppState;
use crate::views::{LayoutView, ProductCardView};

/// Wishlist page template.
#[derive(Template, WebTemplate)]
#[template(path = "wishlist/show.html")]
pub struct WishlistTemplate {
    pub layout: LayoutView,
    pub products: Vec<ProductCardView>,
}

/// Add/remove form data.
#[derive(Debug, Deserialize)]
pub struct WishlistForm {
    pub product_id: i32,
    pub return_to: Option<String>,
}

impl WishlistForm {
    fn back(&self) -> &str {
        match self.return_to.as_deref() {
            Some(path) => safe_return_path(Some(path)),
            None => "/wishlist",
        }
    }
}

/// Display the customer's wishlist.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<WishlistTemplate> {
    let settings = state.store_settings().await?;
    let products = WishlistRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;

    Ok(WishlistTemplate {
        products: ProductCardView::list(&products, settings.currency),
        layout: LayoutView::load(&state, &session, Some(user)).await?,
    })
}

/// Save a product to the wishlist.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id, product_id = form.product_id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<WishlistForm>,
) -> Result<Redirect> {
    match WishlistRepository::new(state.pool())
        .add(user.id, ProductId::new(form.product_id))
        .await
    {
        Ok(()) => set_flash(&session, Flash::success("Saved to your wishlist.")).await,
        Err(RepositoryError::Conflict(_)) => {
            return Err(AppError::NotFound(format!("product {}", form.product_id)));
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Redirect::to(form.back()))
}

/// Remove a product from the wishlist.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id, product_id = form.product_id))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<WishlistForm>,
) -> Result<Redirect> {
    WishlistRepository::new(state.pool())
        .remove(user.id, ProductId::new(form.product_id))
        .await?;
    set_flash(&session, Flash::info("Removed from your wishlist.")).await;
    Ok(Redirect::to(form.back()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_defaults_to_wishlist() {
        let form = WishlistForm {
            product_id: 1,
            return_to: None,
        };
        assert_eq!(form.back(), "/wishlist");

        let form = WishlistForm {
            product_id: 1,
            return_to: Some("/products/wool-beanie".to_string()),
        };
        assert_eq!(form.back(), "/products/wool-beanie");

        let form = WishlistForm {
            product_id: 1,
            return_to: Some("https://elsewhere.test".to_string()),
        };
        assert_eq!(form.back(), "/account");
    }
}
