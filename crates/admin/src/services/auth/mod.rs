//! Admin authentication service.
//!
//! Password sign-in against the shared `users` table. Only accounts with the
//! `admin` role may sign in; customers get the same error as a wrong password.

mod error;

pub use error::AdminAuthError;

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use meridian_core::Email;
use meridian_db::UserRepository;
use meridian_db::models::User;

/// Hash verified when the email is unknown, so every failure path takes
/// about the same time.
static DUMMY_HASH: LazyLock<Option<String>> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"meridian-admin-timing-equalizer", &salt)
        .map(|hash| hash.to_string())
        .ok()
});

/// Admin authentication service.
pub struct AdminAuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AdminAuthService<'a> {
    /// Create a new admin authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AdminAuthError::InvalidCredentials` if the email is unknown,
    /// the password is wrong, or the account is not an admin.
    /// Returns `AdminAuthError::Repository` if the lookup fails.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AdminAuthError> {
        let Ok(email) = Email::parse(email) else {
            return Err(AdminAuthError::InvalidCredentials);
        };

        let Some((user, password_hash)) = self.users.get_password_hash(&email).await? else {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(password, dummy);
            }
            return Err(AdminAuthError::InvalidCredentials);
        };

        verify_password(password, &password_hash)?;

        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, "non-admin account attempted admin sign-in");
            return Err(AdminAuthError::InvalidCredentials);
        }

        Ok(user)
    }
}

/// Verify a password against a stored Argon2 hash.
///
/// # Errors
///
/// Returns `AdminAuthError::InvalidCredentials` on mismatch or a malformed hash.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AdminAuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AdminAuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AdminAuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn hash(password: &str) -> String {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_verify_password() {
        let stored = hash("long enough passphrase");
        assert!(verify_password("long enough passphrase", &stored).is_ok());
        assert!(matches!(
            verify_password("wrong passphrase", &stored),
            Err(AdminAuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_malformed_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("anything", "plaintext"),
            Err(AdminAuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_dummy_hash_is_generated() {
        assert!(DUMMY_HASH.as_deref().is_some_and(|h| h.starts_with("$argon2")));
    }
}
