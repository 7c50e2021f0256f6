//! Authentication route handlers.
//!
//! Email and password sign-in. A guest cart in the session is merged into
//! the customer's saved cart when they sign in or register.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use meridian_db::models::User;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{
    OptionalAuth, clear_current_user, safe_return_path, set_current_user, set_flash,
};
use crate::models::{CurrentUser, Flash};
use crate::services::auth::{AuthError, AuthService, Registration};
use crate::services::cart::CartService;
use crate::state::AppState;
use crate::views::LayoutView;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub name: String,
    pub password: String,
    pub password_confirm: String,
    pub next: Option<String>,
}

/// Post-login destination carried on the login and register pages.
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub layout: LayoutView,
    pub email: String,
    pub next: Option<String>,
    pub error: Option<String>,
}

/// Field errors on the registration form.
#[derive(Debug, Default, Clone)]
pub struct RegisterErrors {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
    pub general: Option<String>,
}

impl RegisterErrors {
    fn from_auth_error(err: &AuthError) -> Self {
        let message = Some(err.user_message());
        match err.field() {
            Some("email") => Self {
                email: message,
                ..Self::default()
            },
            Some("name") => Self {
                name: message,
                ..Self::default()
            },
            Some("password") => Self {
                password: message,
                ..Self::default()
            },
            Some("password_confirm") => Self {
                password_confirm: message,
                ..Self::default()
            },
            _ => Self {
                general: message,
                ..Self::default()
            },
        }
    }
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub layout: LayoutView,
    pub email: String,
    pub name: String,
    pub next: Option<String>,
    pub errors: RegisterErrors,
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page. Signed-in customers go straight to their account.
#[instrument(skip(state, session, user))]
pub async fn login_page(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<NextQuery>,
) -> Result<Response> {
    if user.is_some() {
        return Ok(Redirect::to(safe_return_path(query.next.as_deref())).into_response());
    }
    Ok(LoginTemplate {
        layout: LayoutView::load(&state, &session, None).await?,
        email: String::new(),
        next: query.next,
        error: None,
    }
    .into_response())
}

/// Handle login form submission.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    match AuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await
    {
        Ok(user) => {
            sign_in(&state, &session, &user).await?;
            tracing::info!(user_id = %user.id, "customer signed in");
            set_flash(&session, Flash::success(format!("Welcome back, {}.", user.name))).await;
            Ok(Redirect::to(safe_return_path(form.next.as_deref())).into_response())
        }
        Err(e @ (AuthError::Repository(_) | AuthError::PasswordHash)) => Err(e.into()),
        Err(e) => {
            tracing::debug!(error = %e, "login rejected");
            let template = LoginTemplate {
                layout: LayoutView::load(&state, &session, None).await?,
                email: form.email,
                next: form.next,
                error: Some(e.user_message()),
            };
            Ok((StatusCode::UNPROCESSABLE_ENTITY, template).into_response())
        }
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
#[instrument(skip(state, session, user))]
pub async fn register_page(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<NextQuery>,
) -> Result<Response> {
    if user.is_some() {
        return Ok(Redirect::to("/account").into_response());
    }
    Ok(RegisterTemplate {
        layout: LayoutView::load(&state, &session, None).await?,
        email: String::new(),
        name: String::new(),
        next: query.next,
        errors: RegisterErrors::default(),
    }
    .into_response())
}

/// Handle registration form submission.
///
/// New customers are signed in immediately and sent a welcome email.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let registration = Registration {
        email: &form.email,
        name: &form.name,
        password: &form.password,
        password_confirm: &form.password_confirm,
    };

    match AuthService::new(state.pool()).register(&registration).await {
        Ok(user) => {
            sign_in(&state, &session, &user).await?;
            tracing::info!(user_id = %user.id, "customer registered");
            send_welcome(&state, &user);
            set_flash(&session, Flash::success("Your account is ready.")).await;
            Ok(Redirect::to(safe_return_path(form.next.as_deref())).into_response())
        }
        Err(e @ (AuthError::Repository(_) | AuthError::PasswordHash)) => Err(e.into()),
        Err(e) => {
            let template = RegisterTemplate {
                layout: LayoutView::load(&state, &session, None).await?,
                errors: RegisterErrors::from_auth_error(&e),
                email: form.email,
                name: form.name,
                next: form.next,
            };
            Ok((StatusCode::UNPROCESSABLE_ENTITY, template).into_response())
        }
    }
}

// =============================================================================
// Logout Route
// =============================================================================

/// Handle logout. Destroys the whole session, guest cart included.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Redirect {
    if let Err(e) = clear_current_user(&session).await {
        tracing::error!(error = %e, "failed to clear session");
    }
    clear_sentry_user();
    Redirect::to("/")
}

// =============================================================================
// Helpers
// =============================================================================

/// Merge the guest cart and store the user in the session.
async fn sign_in(state: &AppState, session: &Session, user: &User) -> Result<()> {
    let merged = CartService::new(state.pool())
        .merge_guest_into_user(session, user.id)
        .await?;
    if merged > 0 {
        tracing::debug!(user_id = %user.id, lines = merged, "guest cart merged");
    }

    let current = CurrentUser {
        id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
    };
    set_current_user(session, &current)
        .await
        .map_err(AppError::Session)?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

/// Send the welcome email in the background when email is configured.
fn send_welcome(state: &AppState, user: &User) {
    let Some(email) = state.email().cloned() else {
        return;
    };
    let state = state.clone();
    let to = user.email.as_str().to_string();
    let name = user.name.clone();
    let user_id = user.id;

    tokio::spawn(async move {
        let store_name = match state.store_settings().await {
            Ok(settings) => settings.store_name.clone(),
            Err(_) => "Meridian".to_string(),
        };
        let shop_url = state.config().url_for("/products");
        if let Err(e) = email
            .send_welcome_email(&to, &name, &store_name, &shop_url)
            .await
        {
            tracing::error!(user_id = %user_id, error = %e, "failed to send welcome email");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_errors_follow_field() {
        let errors = RegisterErrors::from_auth_error(&AuthError::PasswordMismatch);
        assert_eq!(errors.password_confirm.as_deref(), Some("Passwords do not match."));
        assert!(errors.email.is_none());
        assert!(errors.general.is_none());

        let errors = RegisterErrors::from_auth_error(&AuthError::UserAlreadyExists);
        assert!(errors.email.is_some());

        let errors = RegisterErrors::from_auth_error(&AuthError::InvalidCredentials);
        assert_eq!(errors.general.as_deref(), Some("Incorrect email or password."));
    }
}
