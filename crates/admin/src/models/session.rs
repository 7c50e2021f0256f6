//! Session-related types for admin authentication.
//!
//! Types stored in the session for authentication state and flash messages.

use serde::{Deserialize, Serialize};

use meridian_core::{Email, UserId};
use meridian_db::models::User;

/// Session-stored admin identity.
///
/// Minimal data stored in the session to identify the logged-in admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentAdmin {
    /// Admin's user ID.
    pub id: UserId,
    /// Admin's email address.
    pub email: Email,
    /// Admin's display name.
    pub name: String,
}

impl From<&User> for CurrentAdmin {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

/// Severity of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
}

/// A message shown once on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        match self.kind {
            FlashKind::Success => "flash-success",
            FlashKind::Error => "flash-error",
        }
    }
}

/// Session keys for admin data.
pub mod keys {
    /// Key for storing the current logged-in admin.
    pub const CURRENT_ADMIN: &str = "current_admin";

    /// Key for the pending flash message.
    pub const FLASH: &str = "admin_flash";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_css_class() {
        assert_eq!(Flash::success("Saved").css_class(), "flash-success");
        assert_eq!(Flash::error("Nope").css_class(), "flash-error");
    }

    #[test]
    fn test_current_admin_serializes_for_session() {
        let admin = CurrentAdmin {
            id: UserId::new(1),
            email: Email::parse("ops@meridian.shop").unwrap(),
            name: "Ops".to_string(),
        };
        let json = serde_json::to_value(&admin).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["email"], "ops@meridian.shop");
    }
}
