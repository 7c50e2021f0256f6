//! Authentication error types.

use thiserror::Error;

use meridian_db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] meridian_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// Registration without a display name.
    #[error("name is required")]
    MissingName,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Message shown next to the login or registration form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmail(_) => "Please enter a valid email address.".to_string(),
            Self::InvalidCredentials => "Incorrect email or password.".to_string(),
            Self::UserAlreadyExists => "An account with this email already exists.".to_string(),
            Self::WeakPassword(msg) => format!("Password {msg}."),
            Self::PasswordMismatch => "Passwords do not match.".to_string(),
            Self::MissingName => "Please tell us your name.".to_string(),
            Self::Repository(_) | Self::PasswordHash => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }

    /// The form field the error belongs to, if any.
    #[must_use]
    pub const fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidEmail(_) | Self::UserAlreadyExists => Some("email"),
            Self::WeakPassword(_) => Some("password"),
            Self::PasswordMismatch => Some("password_confirm"),
            Self::MissingName => Some("name"),
            Self::InvalidCredentials | Self::Repository(_) | Self::PasswordHash => None,
        }
    }
}
