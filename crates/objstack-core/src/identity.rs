//! Authenticated caller identity.
//!
//! Signature checking happens upstream; by the time a request reaches the
//! storage engine it is either anonymous or attributed to a [`UserIdentity`].
//! The engine only needs the canonical user ID (for ownership and ACL
//! evaluation) and a display name (for listings).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{AccountId, ObjStackError};

/// A user that passed authentication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    /// Canonical user ID. Compared for ownership decisions.
    pub user_id: String,
    /// Human-readable name reported in listings.
    pub display_name: String,
    /// Account the user belongs to.
    pub account: AccountId,
}

impl UserIdentity {
    /// Create a user identity.
    ///
    /// # Errors
    /// Returns an error if `user_id` is empty.
    pub fn new(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        account: AccountId,
    ) -> Result<Self, ObjStackError> {
        let user_id = user_id.into();
        if user_id.is_empty() {
            return Err(ObjStackError::InvalidIdentity(
                "user ID must not be empty".to_owned(),
            ));
        }
        Ok(Self {
            user_id,
            display_name: display_name.into(),
            account,
        })
    }
}

/// The caller of an engine operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Identity {
    /// Unsigned request.
    #[default]
    Anonymous,
    /// Signed request from a known user.
    User(UserIdentity),
}

impl Identity {
    /// Canonical user ID reported for anonymous callers.
    pub const ANONYMOUS_ID: &str = "anonymous";

    /// Shorthand for an authenticated user in the default account.
    ///
    /// # Errors
    /// Returns an error if `user_id` is empty.
    pub fn user(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Result<Self, ObjStackError> {
        UserIdentity::new(user_id, display_name, AccountId::default()).map(Self::User)
    }

    /// Whether the request carried valid credentials.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::User(_))
    }

    /// The canonical user ID, or [`Self::ANONYMOUS_ID`].
    #[must_use]
    pub fn user_id(&self) -> &str {
        match self {
            Self::Anonymous => Self::ANONYMOUS_ID,
            Self::User(user) => &user.user_id,
        }
    }

    /// The display name, or [`Self::ANONYMOUS_ID`].
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::Anonymous => Self::ANONYMOUS_ID,
            Self::User(user) => &user.display_name,
        }
    }

    /// Whether this identity is the given canonical user.
    #[must_use]
    pub fn is_user(&self, user_id: &str) -> bool {
        matches!(self, Self::User(user) if user.user_id == user_id)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str(Self::ANONYMOUS_ID),
            Self::User(user) => write!(f, "{}({})", user.display_name, user.user_id),
        }
    }
}
