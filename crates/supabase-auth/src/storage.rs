//! Durable session storage for the Supabase client.
//!
//! The client owns session persistence; the rest of the application never
//! touches tokens. Storage is a narrow key-value trait with an in-memory
//! implementation for tests and a JSON-file implementation for real use.

use auth_engine::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

/// Storage error type.
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Result type alias using StorageError.
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for auth_engine::AuthError {
    fn from(error: StorageError) -> Self {
        auth_engine::AuthError::Storage(error.to_string())
    }
}

/// Well-known storage keys used by the client.
pub struct StorageKeys;

impl StorageKeys {
    /// Persisted session record (JSON-encoded).
    pub const SESSION: &'static str = "supabase.session";
}

/// Key-value storage backend for session persistence.
pub trait SessionStorage: Send + Sync {
    /// Store a value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Persisted session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    /// User ID from Supabase Auth
    pub user_id: String,
    /// User email from Supabase Auth
    #[serde(default)]
    pub email: Option<String>,
    /// Profile metadata from Supabase Auth
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    /// Access token for authenticated requests
    pub access_token: String,
    /// Refresh token (consumed by the backend service, never by this client)
    pub refresh_token: String,
    /// When the access token expires (RFC 3339 timestamp)
    pub expires_at: String,
}

impl StoredSession {
    /// True when the token expiry has passed or cannot be parsed.
    pub fn is_expired(&self) -> bool {
        match DateTime::parse_from_rfc3339(&self.expires_at) {
            Ok(expires_at) => expires_at.with_timezone(&Utc) <= Utc::now(),
            Err(_) => true,
        }
    }

    /// Project the record into the application-facing session view.
    pub fn to_session(&self) -> Session {
        Session {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// High-level API over a storage backend for the session record.
pub struct SecretsManager {
    storage: Box<dyn SessionStorage>,
}

impl SecretsManager {
    /// Create a new secrets manager with the given storage backend.
    pub fn new(storage: Box<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    /// Store the session record.
    pub fn set_session(&self, record: &StoredSession) -> StorageResult<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::SESSION, &json)
    }

    /// Retrieve the session record.
    pub fn get_session(&self) -> StorageResult<Option<StoredSession>> {
        match self.storage.get(StorageKeys::SESSION)? {
            Some(json) => {
                let record: StoredSession = serde_json::from_str(&json)
                    .map_err(|e| StorageError::Encoding(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Remove the session record. Returns true if one existed.
    pub fn clear_session(&self) -> StorageResult<bool> {
        self.storage.delete(StorageKeys::SESSION)
    }

    /// Check whether a session record exists.
    pub fn has_session(&self) -> StorageResult<bool> {
        self.storage.has(StorageKeys::SESSION)
    }
}

/// In-memory storage, primarily for tests.
#[derive(Default)]
pub struct MemoryStorage {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.data.lock().unwrap().remove(key).is_some())
    }
}

/// JSON-file storage under the platform config directory.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Create storage over a specific file.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Create storage at the default session file location.
    pub fn from_paths(paths: &app_config_and_utils::Paths) -> Self {
        Self::new(paths.session_file())
    }

    fn read_map(&self) -> StorageResult<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|e| StorageError::Encoding(e.to_string()))
    }

    fn write_map(&self, map: &HashMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(map)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl SessionStorage for FileStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.read_map()?.get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut map = self.read_map()?;
        let removed = map.remove(key).is_some();
        if removed {
            self.write_map(&map)?;
        }
        Ok(removed)
    }
}
