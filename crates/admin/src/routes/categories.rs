//! Category management route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use tower_sessions::Session;
use tracing::instrument;

use meridian_core::CategoryId;
use meridian_db::models::Category;
use meridian_db::{CategoryRepository, RepositoryError};

use crate::error::{AppError, Result};
use crate::filters;
use crate::forms::{CategoryForm, FieldErrors};
use crate::middleware::{RequireAdminAuth, set_flash};
use crate::models::{CurrentAdmin, Flash};
use crate::state::AppState;
use crate::views::{LayoutView, Section};

/// Category row in the listing.
#[derive(Debug, Clone)]
pub struct CategoryRowView {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub product_count: i64,
}

/// Category listing template.
#[derive(Template, WebTemplate)]
#[template(path = "categories/index.html")]
pub struct CategoriesIndexTemplate {
    pub layout: LayoutView,
    pub categories: Vec<CategoryRowView>,
}

/// Category editor template.
#[derive(Template, WebTemplate)]
#[template(path = "categories/form.html")]
pub struct CategoryFormTemplate {
    pub layout: LayoutView,
    pub title: String,
    pub action: String,
    pub form: CategoryForm,
    pub errors: FieldErrors,
}

/// Build the categories router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(index).post(create))
        .route("/categories/new", get(new_category))
        .route("/categories/{id}", post(update))
        .route("/categories/{id}/edit", get(edit))
        .route("/categories/{id}/delete", post(delete))
}

/// GET /categories
async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<CategoriesIndexTemplate> {
    let categories = CategoryRepository::new(state.pool())
        .list(false)
        .await?
        .into_iter()
        .map(|c| CategoryRowView {
            id: c.category.id.as_i32(),
            name: c.category.name,
            slug: c.category.slug,
            product_count: c.product_count,
        })
        .collect();

    Ok(CategoriesIndexTemplate {
        layout: LayoutView::load(&session, &admin, Section::Categories).await,
        categories,
    })
}

/// GET /categories/new
async fn new_category(
    RequireAdminAuth(admin): RequireAdminAuth,
    session: Session,
) -> CategoryFormTemplate {
    form_page(&session, &admin, None, CategoryForm::default(), FieldErrors::default()).await
}

/// POST /categories
#[instrument(skip(admin, state, session, form))]
async fn create(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CategoryForm>,
) -> Result<Response> {
    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => return Ok(invalid(&session, &admin, None, form, errors).await),
    };

    match CategoryRepository::new(state.pool())
        .create(&input.name, &input.slug, &input.description)
        .await
    {
        Ok(category) => {
            tracing::info!(category_id = %category.id, slug = %category.slug, "category created");
            set_flash(&session, Flash::success(format!("Created {}.", category.name))).await;
            Ok(Redirect::to("/categories").into_response())
        }
        Err(e) => {
            let errors = FieldErrors::from_conflict(e, CategoryForm::UNIQUE_FIELDS)?;
            Ok(invalid(&session, &admin, None, form, errors).await)
        }
    }
}

/// GET /categories/{id}/edit
async fn edit(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<CategoryFormTemplate> {
    let category = find_category(&state, id).await?;
    let form = CategoryForm::from_category(&category);
    Ok(form_page(&session, &admin, Some(&category), form, FieldErrors::default()).await)
}

/// POST /categories/{id}
#[instrument(skip(admin, state, session, form))]
async fn update(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
    Form(form): Form<CategoryForm>,
) -> Result<Response> {
    let category = find_category(&state, id).await?;
    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => return Ok(invalid(&session, &admin, Some(&category), form, errors).await),
    };

    match CategoryRepository::new(state.pool())
        .update(category.id, &input.name, &input.slug, &input.description)
        .await
    {
        Ok(updated) => {
            tracing::info!(category_id = %updated.id, "category updated");
            set_flash(&session, Flash::success("Category saved.")).await;
            Ok(Redirect::to("/categories").into_response())
        }
        Err(e) => {
            let errors = FieldErrors::from_conflict(e, CategoryForm::UNIQUE_FIELDS)?;
            Ok(invalid(&session, &admin, Some(&category), form, errors).await)
        }
    }
}

/// Delete an empty category.
///
/// POST /categories/{id}/delete
#[instrument(skip(_admin, state, session))]
async fn delete(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Redirect> {
    match CategoryRepository::new(state.pool())
        .delete(CategoryId::new(id))
        .await
    {
        Ok(()) => {
            tracing::info!(category_id = id, "category deleted");
            set_flash(&session, Flash::success("Category deleted.")).await;
        }
        Err(RepositoryError::InUse(_)) => {
            set_flash(
                &session,
                Flash::error("Move or delete this category's products first."),
            )
            .await;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Redirect::to("/categories"))
}

async fn find_category(state: &AppState, id: i32) -> Result<Category> {
    CategoryRepository::new(state.pool())
        .get_by_id(CategoryId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("category {id}")))
}

async fn invalid(
    session: &Session,
    admin: &CurrentAdmin,
    category: Option<&Category>,
    form: CategoryForm,
    errors: FieldErrors,
) -> Response {
    let page = form_page(session, admin, category, form, errors).await;
    (StatusCode::UNPROCESSABLE_ENTITY, page).into_response()
}

async fn form_page(
    session: &Session,
    admin: &CurrentAdmin,
    category: Option<&Category>,
    form: CategoryForm,
    errors: FieldErrors,
) -> CategoryFormTemplate {
    let (title, action) = match category {
        Some(c) => (format!("Edit {}", c.name), format!("/categories/{}", c.id)),
        None => ("New category".to_string(), "/categories".to_string()),
    };
    CategoryFormTemplate {
        layout: LayoutView::load(session, admin, Section::Categories).await,
        title,
        action,
        form,
        errors,
    }
}
