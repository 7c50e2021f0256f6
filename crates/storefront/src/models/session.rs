//! Session-related types.
//!
//! Types stored in the session for authentication state, the guest cart
//! and one-shot flash messages.

use serde::{Deserialize, Serialize};

use meridian_core::{Email, UserId};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name.
    pub name: String,
}

/// Severity of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
    Info,
}

impl FlashKind {
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Success => "flash-success",
            Self::Error => "flash-error",
            Self::Info => "flash-info",
        }
    }
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

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Info,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        self.kind.css_class()
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the guest cart lines.
    pub const GUEST_CART: &str = "guest_cart";

    /// Key for the pending flash message.
    pub const FLASH: &str = "flash";

    /// Key for the path to return to after login.
    pub const RETURN_TO: &str = "return_to";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_serializes_lowercase_kind() {
        let json = serde_json::to_string(&Flash::error("Out of stock")).unwrap();
        assert_eq!(json, r#"{"kind":"error","message":"Out of stock"}"#);
    }

    #[test]
    fn test_current_user_round_trips_through_session_json() {
        let user = CurrentUser {
            id: UserId::new(7),
            email: Email::parse("ada@example.org").unwrap(),
            name: "Ada".to_string(),
        };
        let restored: CurrentUser =
            serde_json::from_value(serde_json::to_value(&user).unwrap()).unwrap();
        assert_eq!(restored.id, user.id);
        assert_eq!(restored.email, user.email);
    }
}
