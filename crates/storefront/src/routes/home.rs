//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tower_sessions::Session;
use tracing::instrument;

use meridian_db::products::ProductFilter;
use meridian_db::{Paging, ProductRepository};

use crate::error::Result;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::state::AppState;
use crate::views::{LayoutView, ProductCardView};

/// Featured products shown on the home page.
const FEATURED_COUNT: u32 = 8;

/// Newest products shown under "Just in".
const NEW_ARRIVALS_COUNT: u32 = 4;

/// Category tile on the home page.
#[derive(Clone)]
pub struct CategoryTile {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub product_count: i64,
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub layout: LayoutView,
    pub featured: Vec<ProductCardView>,
    pub new_arrivals: Vec<ProductCardView>,
    pub categories: Vec<CategoryTile>,
}

/// Display the home page.
#[instrument(skip(state, session, user))]
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<HomeTemplate> {
    let layout = LayoutView::load(&state, &session, user).await?;
    let settings = state.store_settings().await?;
    let products = ProductRepository::new(state.pool());

    let featured = products
        .list(&ProductFilter {
            featured_only: true,
            paging: Paging::new(None, FEATURED_COUNT),
            ..ProductFilter::storefront()
        })
        .await?;
    let newest = products
        .list(&ProductFilter {
            paging: Paging::new(None, NEW_ARRIVALS_COUNT),
            ..ProductFilter::storefront()
        })
        .await?;

    let categories = state
        .nav_categories()
        .await?
        .iter()
        .filter(|c| c.product_count > 0)
        .map(|c| CategoryTile {
            name: c.category.name.clone(),
            slug: c.category.slug.clone(),
            description: c.category.description.clone(),
            product_count: c.product_count,
        })
        .collect();

    Ok(HomeTemplate {
        layout,
        featured: ProductCardView::list(&featured.items, settings.currency),
        new_arrivals: ProductCardView::list(&newest.items, settings.currency),
        categories,
    })
}
