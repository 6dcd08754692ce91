//! User identity types.

use serde::{Deserialize, Serialize};

/// Identifies a user across sessions; chosen by the embedding application.
pub type UserId = String;

/// The user a change is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Author {
    pub user_id: UserId,
    pub user_name: String,
}

impl Author {
    pub fn new(user_id: impl Into<UserId>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
        }
    }
}
