use crate::error::TrackerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Matches the width of `users.username`.
pub const MAX_USERNAME_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Assigned by the store on insert. `None` until the record is persisted.
    pub id: Option<i32>,
    pub username: String,
    pub last_logged_in: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(username: &str) -> Self {
        Self {
            id: None,
            username: username.to_string(),
            last_logged_in: None,
        }
    }
}

/// Checks that a principal identifier can be used as a username.
///
/// The identifier is stored exactly as given; nothing is trimmed or folded.
pub fn validate_username(username: &str) -> Result<(), TrackerError> {
    if username.trim().is_empty() {
        return Err(TrackerError::InvalidInput(
            "username must not be empty".to_string(),
        ));
    }

    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(TrackerError::InvalidInput(format!(
            "username must be at most {} characters",
            MAX_USERNAME_LEN
        )));
    }

    if username.chars().any(char::is_control) {
        return Err(TrackerError::InvalidInput(
            "username must not contain control characters".to_string(),
        ));
    }

    Ok(())
}
