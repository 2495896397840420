//! Session persistence for the SafeNow client
//!
//! Holds the access/refresh token pair and the cached user, backed by
//! memory or a (optionally encrypted) session file.

mod cipher;
mod storage;
mod store;
pub mod token;

pub use cipher::{SealedPayload, SessionCipher};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use store::{TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};

use crate::auth::User;

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub access: String,
    pub refresh: String,
    pub user: User,
}
