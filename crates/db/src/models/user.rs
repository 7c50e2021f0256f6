//! User accounts.

use chrono::{DateTime, Utc};

use meridian_core::{Email, UserId, UserRole};

/// A customer or admin account.
///
/// The password hash is not part of this type; it is read only
/// through [`crate::UserRepository::get_password_hash`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}
