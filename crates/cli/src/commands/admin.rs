//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! meridian admin create -e admin@example.com -n "Admin Name" -p 'long passphrase'
//! ```
//!
//! If an account with the email already exists (for example a customer
//! account), it is promoted to admin and its password is replaced.

use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use thiserror::Error;

use meridian_core::{Email, UserId, UserRole};
use meridian_db::{RepositoryError, UserRepository};

use super::{ConnectError, connect};

/// Shortest accepted admin password, in characters.
pub const MIN_ADMIN_PASSWORD_LENGTH: usize = 12;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Display name is blank.
    #[error("Name cannot be empty")]
    EmptyName,

    /// Password too short.
    #[error("Password must be at least {MIN_ADMIN_PASSWORD_LENGTH} characters")]
    WeakPassword,

    /// Argon2 failed to hash the password.
    #[error("Failed to hash password")]
    PasswordHash,
}

/// Checked arguments for `admin create`.
#[derive(Debug)]
struct NewAdmin {
    email: Email,
    name: String,
}

fn validate(email: &str, name: &str, password: &str) -> Result<NewAdmin, AdminError> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(AdminError::EmptyName);
    }
    if password.chars().count() < MIN_ADMIN_PASSWORD_LENGTH {
        return Err(AdminError::WeakPassword);
    }
    Ok(NewAdmin {
        email,
        name: name.to_owned(),
    })
}

fn hash_password(password: &str) -> Result<String, AdminError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AdminError::PasswordHash)
}

/// Create a new admin user, or promote the existing account with that email.
///
/// # Arguments
///
/// * `email` - Admin's email address
/// * `name` - Admin's display name (used only for new accounts)
/// * `password` - Sign-in password
///
/// # Returns
///
/// The ID of the admin user.
///
/// # Errors
///
/// Returns an error for invalid input or a database failure.
pub async fn create_user(email: &str, name: &str, password: &str) -> Result<UserId, AdminError> {
    let admin = validate(email, name, password)?;
    let password_hash = hash_password(password)?;

    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    if let Some(existing) = users.get_by_email(&admin.email).await? {
        users.set_role(existing.id, UserRole::Admin).await?;
        users.set_password_hash(existing.id, &password_hash).await?;
        tracing::info!(
            "Existing account promoted to admin. ID: {}, Email: {}, Previous role: {}",
            existing.id,
            existing.email,
            existing.role
        );
        return Ok(existing.id);
    }

    let user = users
        .create(&admin.email, &admin.name, &password_hash, UserRole::Admin)
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );

    Ok(user.id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_normalizes_email_and_name() {
        let admin = validate(" Ops@Meridian.Shop ", "  Ops Team ", "correct horse battery").unwrap();
        assert_eq!(admin.email.as_str(), "ops@meridian.shop");
        assert_eq!(admin.name, "Ops Team");
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert!(matches!(
            validate("not-an-email", "Ops", "correct horse battery"),
            Err(AdminError::InvalidEmail(_))
        ));
        assert!(matches!(
            validate("ops@meridian.shop", "  ", "correct horse battery"),
            Err(AdminError::EmptyName)
        ));
        assert!(matches!(
            validate("ops@meridian.shop", "Ops", "short"),
            Err(AdminError::WeakPassword)
        ));
    }

    #[test]
    fn test_hash_password_produces_argon2id() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2id$"));
    }
}
