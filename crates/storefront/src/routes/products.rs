//! Product route handlers: listing, detail and review submission.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use meridian_core::types::money::format_amount;
use meridian_core::{CurrencyCode, Rating};
use meridian_db::models::{Category, NewReview, Product, ProductSort, RatingSummary, Review};
use meridian_db::products::ProductFilter;
use meridian_db::{
    CategoryRepository, Paging, ProductRepository, RepositoryError, ReviewRepository,
    SizeRepository, WishlistRepository,
};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{OptionalAuth, RequireAuth, set_flash};
use crate::models::{CurrentUser, Flash};
use crate::services::promotion::{self, BadgeView};
use crate::state::AppState;
use crate::views::{LayoutView, PaginationView, ProductCardView, upload_url, with_query};

/// Products per listing page.
const PER_PAGE: u32 = 24;

/// Related products shown under a product.
const RELATED_COUNT: i64 = 4;

const MAX_REVIEW_TITLE: usize = 120;
const MAX_REVIEW_BODY: usize = 5000;

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
}

/// Sort dropdown option.
#[derive(Clone)]
pub struct SortOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub layout: LayoutView,
    pub heading: String,
    pub category: Option<Category>,
    pub query: String,
    pub sort_options: Vec<SortOption>,
    pub products: Vec<ProductCardView>,
    pub total: i64,
    pub pagination: PaginationView,
}

/// Size option on the detail page.
#[derive(Clone)]
pub struct SizeOption {
    pub id: i32,
    pub name: String,
}

/// Product detail display data.
#[derive(Clone)]
pub struct ProductDetailView {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: String,
    pub price: String,
    pub compare_at_price: Option<String>,
    pub image_url: Option<String>,
    pub badges: Vec<BadgeView>,
    pub in_stock: bool,
    pub max_quantity: i32,
    pub sizes: Vec<SizeOption>,
    pub subscribable: bool,
}

/// An approved review.
#[derive(Clone)]
pub struct ReviewView {
    pub author_name: String,
    pub stars: String,
    pub rating: i16,
    pub title: String,
    pub body: String,
    pub date: String,
}

impl From<&Review> for ReviewView {
    fn from(review: &Review) -> Self {
        Self {
            author_name: review.author_name.clone(),
            stars: review.rating.stars(),
            rating: review.rating.get(),
            title: review.title.clone(),
            body: review.body.clone(),
            date: review.created_at.format("%B %-d, %Y").to_string(),
        }
    }
}

/// Review form values and field errors.
#[derive(Clone, Default)]
pub struct ReviewFormView {
    pub rating: String,
    pub title: String,
    pub body: String,
    pub rating_error: Option<String>,
    pub title_error: Option<String>,
    pub body_error: Option<String>,
}

impl ReviewFormView {
    fn has_errors(&self) -> bool {
        self.rating_error.is_some() || self.title_error.is_some() || self.body_error.is_some()
    }
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub layout: LayoutView,
    pub product: ProductDetailView,
    pub reviews: Vec<ReviewView>,
    pub review_count: i64,
    pub average_rating: Option<String>,
    pub can_review: bool,
    pub already_reviewed: bool,
    pub review_form: ReviewFormView,
    pub in_wishlist: bool,
    pub related: Vec<ProductCardView>,
}

/// Review form data.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    pub rating: String,
    pub title: String,
    pub body: String,
}

/// Display product listing page.
#[instrument(skip(state, session, user))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<ListingQuery>,
) -> Result<ProductsIndexTemplate> {
    let category = match query.category.as_deref().filter(|s| !s.is_empty()) {
        Some(slug) => Some(
            CategoryRepository::new(state.pool())
                .get_by_slug(slug)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("category {slug}")))?,
        ),
        None => None,
    };
    render_listing(&state, &session, user, category, query, "/products").await
}

/// Render a listing, optionally restricted to one category.
pub(crate) async fn render_listing(
    state: &AppState,
    session: &Session,
    user: Option<CurrentUser>,
    category: Option<Category>,
    query: ListingQuery,
    base_path: &str,
) -> Result<ProductsIndexTemplate> {
    let layout = LayoutView::load(state, session, user).await?;
    let settings = state.store_settings().await?;
    let sort = ProductSort::from_param(query.sort.as_deref());
    let search = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string);

    let page = ProductRepository::new(state.pool())
        .list(&ProductFilter {
            category_id: category.as_ref().map(|c| c.id),
            search: search.clone(),
            sort,
            paging: Paging::new(query.page, PER_PAGE),
            ..ProductFilter::storefront()
        })
        .await?;

    // Category pages carry the category in the path, not the query
    let category_param = if base_path == "/products" {
        category.as_ref().map(|c| c.slug.clone())
    } else {
        None
    };
    let sort_param = (sort != ProductSort::default()).then(|| sort.as_param());
    let pagination = PaginationView::new(&page, |p| {
        let page_param = p.to_string();
        with_query(
            base_path,
            &[
                ("category", category_param.as_deref()),
                ("q", search.as_deref()),
                ("sort", sort_param),
                ("page", Some(page_param.as_str())),
            ],
        )
    });

    let heading = match (&category, &search) {
        (Some(c), _) => c.name.clone(),
        (None, Some(q)) => format!("Results for \u{201c}{q}\u{201d}"),
        (None, None) => "All products".to_string(),
    };

    Ok(ProductsIndexTemplate {
        layout,
        heading,
        category,
        query: search.unwrap_or_default(),
        sort_options: ProductSort::ALL
            .iter()
            .map(|s| SortOption {
                value: s.as_param(),
                label: s.label(),
                selected: *s == sort,
            })
            .collect(),
        products: ProductCardView::list(&page.items, settings.currency),
        total: page.total,
        pagination,
    })
}

/// Display product detail page.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(slug): Path<String>,
) -> Result<ProductShowTemplate> {
    render_product(&state, &session, user, &slug, ReviewFormView::default()).await
}

/// Submit a review for a product.
///
/// Reviews are held for moderation before they appear.
#[instrument(skip(state, session, user, form))]
pub async fn submit_review(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Form(form): Form<ReviewForm>,
) -> Result<Response> {
    let product = active_product(&state, &slug).await?;
    let reviews = ReviewRepository::new(state.pool());

    if reviews.exists_for_user(product.id, user.id).await? {
        set_flash(&session, Flash::info("You have already reviewed this product.")).await;
        return Ok(Redirect::to(&format!("/products/{slug}#reviews")).into_response());
    }

    let (rating, title, body) = match validate_review(&form) {
        Ok(valid) => valid,
        Err(form_view) => {
            let page = render_product(&state, &session, Some(user), &slug, form_view).await?;
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
    };

    let result = reviews
        .create(&NewReview {
            product_id: product.id,
            user_id: user.id,
            rating,
            title,
            body,
            is_approved: false,
        })
        .await;

    match result {
        Ok(review_id) => {
            tracing::info!(review_id = %review_id, product_id = %product.id, "review submitted");
            add_breadcrumb("review", "Submitted review", Some(&[("product", slug.as_str())]));
            set_flash(
                &session,
                Flash::success("Thanks! Your review will appear once it has been approved."),
            )
            .await;
        }
        // Lost a race with a second submission
        Err(RepositoryError::Conflict(_)) => {
            set_flash(&session, Flash::info("You have already reviewed this product.")).await;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Redirect::to(&format!("/products/{slug}#reviews")).into_response())
}

async fn active_product(state: &AppState, slug: &str) -> Result<Product> {
    ProductRepository::new(state.pool())
        .get_by_slug(slug)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))
}

async fn render_product(
    state: &AppState,
    session: &Session,
    user: Option<CurrentUser>,
    slug: &str,
    review_form: ReviewFormView,
) -> Result<ProductShowTemplate> {
    let product = active_product(state, slug).await?;
    let settings = state.store_settings().await?;
    let pool = state.pool();

    let sizes = SizeRepository::new(pool).list_for_product(product.id).await?;
    let reviews = ReviewRepository::new(pool);
    let approved = reviews.list_for_product(product.id).await?;
    let summary = reviews.rating_summary(product.id).await?;
    let related = ProductRepository::new(pool)
        .related(&product, RELATED_COUNT)
        .await?;

    let (already_reviewed, in_wishlist) = match &user {
        Some(u) => (
            reviews.exists_for_user(product.id, u.id).await?,
            WishlistRepository::new(pool).contains(u.id, product.id).await?,
        ),
        None => (false, false),
    };
    let can_review = user.is_some() && !already_reviewed;

    let layout = LayoutView::load(state, session, user).await?;
    let sizes = sizes
        .iter()
        .map(|s| SizeOption {
            id: s.id.as_i32(),
            name: s.name.clone(),
        })
        .collect();

    Ok(ProductShowTemplate {
        layout,
        product: detail_view(&product, sizes, settings.currency),
        reviews: approved.iter().map(ReviewView::from).collect(),
        review_count: summary.count,
        average_rating: average_label(&summary),
        can_review,
        already_reviewed,
        review_form,
        in_wishlist,
        related: ProductCardView::list(&related, settings.currency),
    })
}

fn detail_view(
    product: &Product,
    sizes: Vec<SizeOption>,
    currency: CurrencyCode,
) -> ProductDetailView {
    ProductDetailView {
        id: product.id.as_i32(),
        name: product.name.clone(),
        slug: product.slug.clone(),
        sku: product.sku.clone(),
        description: product.description.clone(),
        price: format_amount(product.price, currency),
        compare_at_price: product
            .compare_at_price
            .filter(|c| *c > product.price)
            .map(|c| format_amount(c, currency)),
        image_url: product.image_path.as_deref().map(upload_url),
        badges: promotion::badges_for(product, Utc::now()),
        in_stock: product.in_stock(),
        max_quantity: product.stock.clamp(0, 99),
        sizes,
        subscribable: product.is_subscribable(),
    }
}

/// Average rating to one decimal place, e.g. "4.3".
fn average_label(summary: &RatingSummary) -> Option<String> {
    summary
        .average
        .filter(|_| summary.count > 0)
        .map(|avg| format!("{:.1}", avg.round_dp(1)))
}

/// Validate a submitted review, returning the form with field errors on failure.
fn validate_review(
    form: &ReviewForm,
) -> std::result::Result<(Rating, String, String), ReviewFormView> {
    let mut view = ReviewFormView {
        rating: form.rating.trim().to_string(),
        title: form.title.trim().to_string(),
        body: form.body.trim().to_string(),
        ..ReviewFormView::default()
    };

    let rating = view
        .rating
        .parse::<i64>()
        .ok()
        .and_then(|r| Rating::new(r).ok());
    if rating.is_none() {
        view.rating_error = Some("Choose a rating from 1 to 5 stars.".to_string());
    }

    if view.title.is_empty() {
        view.title_error = Some("Give your review a title.".to_string());
    } else if view.title.chars().count() > MAX_REVIEW_TITLE {
        view.title_error = Some(format!("Keep the title under {MAX_REVIEW_TITLE} characters."));
    }

    if view.body.is_empty() {
        view.body_error = Some("Tell other shoppers what you thought.".to_string());
    } else if view.body.chars().count() > MAX_REVIEW_BODY {
        view.body_error = Some(format!("Keep the review under {MAX_REVIEW_BODY} characters."));
    }

    match rating {
        Some(rating) if !view.has_errors() => Ok((rating, view.title, view.body)),
        _ => Err(view),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn form(rating: &str, title: &str, body: &str) -> ReviewForm {
        ReviewForm {
            rating: rating.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_valid_review() {
        let Ok((rating, title, body)) =
            validate_review(&form("4", "  Warm and light ", "Wore it all winter."))
        else {
            panic!("should validate");
        };
        assert_eq!(rating.get(), 4);
        assert_eq!(title, "Warm and light");
        assert_eq!(body, "Wore it all winter.");
    }

    #[test]
    fn test_review_field_errors() {
        let Err(view) = validate_review(&form("9", "", "ok")) else {
            panic!("should fail");
        };
        assert!(view.rating_error.is_some());
        assert!(view.title_error.is_some());
        assert!(view.body_error.is_none());
        assert_eq!(view.body, "ok");

        let long_title = "x".repeat(MAX_REVIEW_TITLE + 1);
        let Err(view) = validate_review(&form("3", &long_title, "fine")) else {
            panic!("should fail");
        };
        assert!(view.title_error.is_some());
    }

    #[test]
    fn test_average_label() {
        let summary = RatingSummary {
            count: 3,
            average: Some(Decimal::new(43333, 4)),
        };
        assert_eq!(average_label(&summary).as_deref(), Some("4.3"));

        let empty = RatingSummary {
            count: 0,
            average: None,
        };
        assert_eq!(average_label(&empty), None);
    }
}
