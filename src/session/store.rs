use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::cipher::SessionCipher;
use super::storage::{FileStorage, MemoryStorage, SessionStorage};
use super::token;
use super::Session;
use crate::auth::User;
use crate::config::StorageConfig;
use crate::error::StorageError;

pub const ACCESS_TOKEN_KEY: &str = "safenow.access_token";
pub const REFRESH_TOKEN_KEY: &str = "safenow.refresh_token";
pub const USER_KEY: &str = "safenow.user";

const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

/// Access token, refresh token and cached user, persisted through a
/// [`SessionStorage`]. Storage failures never reach callers: reads fall
/// back to "absent" and writes are logged.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn SessionStorage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        match (&config.session_file, &config.encryption_key) {
            (Some(path), Some(key)) => Self::new(Arc::new(FileStorage::encrypted(
                path,
                SessionCipher::from_passphrase(key),
            ))),
            (Some(path), None) => Self::new(Arc::new(FileStorage::new(path))),
            (None, _) => Self::in_memory(),
        }
    }

    pub fn access(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn refresh(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    pub fn user(&self) -> Option<User> {
        let raw = self.read(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("Ignoring corrupt cached user: {}", e);
                None
            }
        }
    }

    pub fn set_access(&self, token: &str) {
        self.write(ACCESS_TOKEN_KEY, token);
    }

    pub fn set_refresh(&self, token: &str) {
        self.write(REFRESH_TOKEN_KEY, token);
    }

    pub fn set_user(&self, user: &User) {
        match serde_json::to_string(user) {
            Ok(raw) => self.write(USER_KEY, &raw),
            Err(e) => warn!("Failed to serialize user for cache: {}", e),
        }
    }

    pub fn save_session(&self, session: &Session) {
        self.set_access(&session.access);
        self.set_refresh(&session.refresh);
        self.set_user(&session.user);
    }

    /// All three parts, if every one of them is stored.
    pub fn session(&self) -> Option<Session> {
        Some(Session {
            access: self.access()?,
            refresh: self.refresh()?,
            user: self.user()?,
        })
    }

    /// Any stored credential at all.
    pub fn has_credentials(&self) -> bool {
        self.access().is_some() || self.refresh().is_some()
    }

    /// Unexpired access token AND a refresh token present.
    pub fn has_valid_session(&self, now: DateTime<Utc>) -> bool {
        match (self.access(), self.refresh()) {
            (Some(access), Some(_)) => !token::is_expired(&access, now),
            _ => false,
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.storage.remove_all(&SESSION_KEYS) {
            warn!("Failed to clear stored session: {}", e);
        } else {
            debug!("Stored session cleared");
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(Some(value)) if !value.is_empty() => Some(value),
            Ok(_) => None,
            Err(e) => {
                log_storage_failure("read", key, &e);
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.set(key, value) {
            log_storage_failure("write", key, &e);
        }
    }
}

fn log_storage_failure(op: &str, key: &str, err: &StorageError) {
    warn!("Session storage {} failed for {}: {}", op, key, err);
}
