//! Store settings route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use tower_sessions::Session;
use tracing::instrument;

use meridian_core::CurrencyCode;
use meridian_db::SettingsRepository;

use crate::error::Result;
use crate::filters;
use crate::forms::{FieldErrors, SettingsForm};
use crate::middleware::{RequireAdminAuth, set_flash};
use crate::models::Flash;
use crate::state::AppState;
use crate::views::{LayoutView, Section};

/// Settings page template.
#[derive(Template, WebTemplate)]
#[template(path = "settings.html")]
pub struct SettingsTemplate {
    pub layout: LayoutView,
    pub form: SettingsForm,
    pub errors: FieldErrors,
    pub currencies: Vec<&'static str>,
}

impl SettingsTemplate {
    /// Whether `code` is the currency in the form.
    #[must_use]
    pub fn is_currency(&self, code: &str) -> bool {
        self.form.currency.eq_ignore_ascii_case(code)
    }
}

/// Build the settings router.
pub fn router() -> Router<AppState> {
    Router::new().route("/settings", get(show).post(save))
}

fn currencies() -> Vec<&'static str> {
    CurrencyCode::ALL.iter().map(|c| c.code()).collect()
}

/// GET /settings
async fn show(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<SettingsTemplate> {
    let settings = SettingsRepository::new(state.pool()).store_settings().await?;
    Ok(SettingsTemplate {
        layout: LayoutView::load(&session, &admin, Section::Settings).await,
        form: SettingsForm::from_settings(&settings),
        errors: FieldErrors::default(),
        currencies: currencies(),
    })
}

/// POST /settings
#[instrument(skip(admin, state, session, form))]
async fn save(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SettingsForm>,
) -> Result<Response> {
    let settings = match form.validate() {
        Ok(settings) => settings,
        Err(errors) => {
            let page = SettingsTemplate {
                layout: LayoutView::load(&session, &admin, Section::Settings).await,
                form,
                errors,
                currencies: currencies(),
            };
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
    };

    SettingsRepository::new(state.pool())
        .save_store_settings(&settings)
        .await?;
    tracing::info!(admin_id = %admin.id, "store settings saved");
    set_flash(&session, Flash::success("Settings saved.")).await;
    Ok(Redirect::to("/settings").into_response())
}
