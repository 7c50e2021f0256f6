//! Size management route handlers.
//!
//! Sizes are short enough to edit inline, so there is a single page.

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

use meridian_core::SizeId;
use meridian_db::models::Size;
use meridian_db::{RepositoryError, SizeRepository};

use crate::error::Result;
use crate::filters;
use crate::forms::{FieldErrors, SizeForm};
use crate::middleware::{RequireAdminAuth, set_flash};
use crate::models::{CurrentAdmin, Flash};
use crate::state::AppState;
use crate::views::{LayoutView, Section};

/// Size listing template with the new-size form.
#[derive(Template, WebTemplate)]
#[template(path = "sizes/index.html")]
pub struct SizesTemplate {
    pub layout: LayoutView,
    pub sizes: Vec<Size>,
    pub form: SizeForm,
    pub errors: FieldErrors,
}

/// Build the sizes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sizes", get(index).post(create))
        .route("/sizes/{id}", post(update))
        .route("/sizes/{id}/delete", post(delete))
}

/// GET /sizes
async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<SizesTemplate> {
    render(&state, &session, &admin, SizeForm::default(), FieldErrors::default()).await
}

/// POST /sizes
#[instrument(skip(admin, state, session, form))]
async fn create(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SizeForm>,
) -> Result<Response> {
    let (name, sort_order) = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => return invalid(&state, &session, &admin, form, errors).await,
    };

    match SizeRepository::new(state.pool()).create(&name, sort_order).await {
        Ok(size) => {
            tracing::info!(size_id = %size.id, name = %size.name, "size created");
            set_flash(&session, Flash::success(format!("Added size {}.", size.name))).await;
            Ok(Redirect::to("/sizes").into_response())
        }
        Err(e) => {
            let errors = FieldErrors::from_conflict(e, SizeForm::UNIQUE_FIELDS)?;
            invalid(&state, &session, &admin, form, errors).await
        }
    }
}

/// Rename or reorder a size from its inline row.
///
/// POST /sizes/{id}
#[instrument(skip(_admin, state, session, form))]
async fn update(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
    Form(form): Form<SizeForm>,
) -> Result<Redirect> {
    let (name, sort_order) = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => {
            set_flash(&session, Flash::error(errors.summary())).await;
            return Ok(Redirect::to("/sizes"));
        }
    };

    match SizeRepository::new(state.pool())
        .update(SizeId::new(id), &name, sort_order)
        .await
    {
        Ok(size) => {
            tracing::info!(size_id = %size.id, "size updated");
            set_flash(&session, Flash::success(format!("Saved size {}.", size.name))).await;
        }
        Err(e) => {
            let errors = FieldErrors::from_conflict(e, SizeForm::UNIQUE_FIELDS)?;
            set_flash(&session, Flash::error(errors.summary())).await;
        }
    }
    Ok(Redirect::to("/sizes"))
}

/// Delete a size no product offers.
///
/// POST /sizes/{id}/delete
#[instrument(skip(_admin, state, session))]
async fn delete(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Redirect> {
    match SizeRepository::new(state.pool()).delete(SizeId::new(id)).await {
        Ok(()) => {
            tracing::info!(size_id = id, "size deleted");
            set_flash(&session, Flash::success("Size deleted.")).await;
        }
        Err(RepositoryError::InUse(_)) => {
            set_flash(
                &session,
                Flash::error("Products still offer this size. Remove it from them first."),
            )
            .await;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Redirect::to("/sizes"))
}

async fn invalid(
    state: &AppState,
    session: &Session,
    admin: &CurrentAdmin,
    form: SizeForm,
    errors: FieldErrors,
) -> Result<Response> {
    let page = render(state, session, admin, form, errors).await?;
    Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
}

async fn render(
    state: &AppState,
    session: &Session,
    admin: &CurrentAdmin,
    form: SizeForm,
    errors: FieldErrors,
) -> Result<SizesTemplate> {
    Ok(SizesTemplate {
        layout: LayoutView::load(session, admin, Section::Sizes).await,
        sizes: SizeRepository::new(state.pool()).list().await?,
        form,
        errors,
    })
}
