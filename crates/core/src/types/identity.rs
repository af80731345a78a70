//! Cart owner identity.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Who the active cart belongs to.
///
/// A guest cart lives in device-local storage under a fixed key. An
/// authenticated cart lives in a remote document keyed by the user id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "snake_case")]
pub enum Identity {
    /// No signed-in user.
    #[default]
    Guest,
    /// Signed-in user.
    Authenticated(UserId),
}

impl Identity {
    /// The signed-in user's id, if any.
    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Guest => None,
            Self::Authenticated(id) => Some(id),
        }
    }

    /// Whether no user is signed in.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest)
    }
}

impl From<Option<UserId>> for Identity {
    fn from(user: Option<UserId>) -> Self {
        user.map_or(Self::Guest, Self::Authenticated)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guest => f.write_str("guest"),
            Self::Authenticated(id) => write!(f, "user:{id}"),
        }
    }
}
