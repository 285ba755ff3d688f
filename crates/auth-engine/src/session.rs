//! Session data for the logged-in user.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

const META_FULL_NAME: &str = "full_name";
const META_NAME: &str = "name";
const META_FIRST_NAME: &str = "first_name";
const META_LAST_NAME: &str = "last_name";

/// Read-only view of an authenticated user's session.
///
/// The backend client owns the session (tokens, refresh, persistence); the
/// application only ever sees this projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique user identifier from the backend.
    pub user_id: String,
    /// User email, when the provider supplies one.
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form profile metadata (display-name fields and the like).
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Session {
    /// Create a session with no email or metadata.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            metadata: HashMap::new(),
        }
    }

    fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Derive a display name from profile metadata.
    ///
    /// Precedence: explicit full-name field, else explicit name field, else
    /// first-name plus last-name (trimmed) when a first name exists.
    pub fn display_name(&self) -> Option<String> {
        if let Some(full_name) = self.meta_str(META_FULL_NAME) {
            return Some(full_name.to_string());
        }
        if let Some(name) = self.meta_str(META_NAME) {
            return Some(name.to_string());
        }
        if let Some(first) = self.meta_str(META_FIRST_NAME) {
            let last = self.meta_str(META_LAST_NAME).unwrap_or("");
            return Some(format!("{} {}", first, last).trim().to_string());
        }
        None
    }

    /// Greeting line for the home screen.
    ///
    /// Falls back from display name to email to a generic message.
    pub fn greeting(&self) -> String {
        if let Some(name) = self.display_name() {
            return format!("Logged in as {}", name);
        }
        match self.email.as_deref() {
            Some(email) => format!("Logged in as {}", email),
            None => "You're logged in".to_string(),
        }
    }
}
