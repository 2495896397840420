pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod geo;
pub mod http;
pub mod session;

use std::sync::Arc;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use api::ResourceApi;
pub use auth::{AuthService, AuthState, User};
pub use http::{ApiClient, LogoutReason, SessionEvent};
pub use session::TokenStore;

/// Everything a front-end shell needs, wired from one [`Settings`].
#[derive(Clone)]
pub struct SafeNowClient {
    pub config: Arc<Settings>,
    pub auth: AuthService,
    pub resources: ResourceApi,
}

impl SafeNowClient {
    pub fn new(config: Settings) -> Result<Self> {
        let store = TokenStore::from_config(&config.storage);
        let client = ApiClient::new(&config.api, store)?;

        Ok(Self {
            config: Arc::new(config),
            auth: AuthService::new(client.clone()),
            resources: ResourceApi::new(client),
        })
    }

    pub fn client(&self) -> &ApiClient {
        self.auth.client()
    }

    pub fn store(&self) -> &TokenStore {
        self.client().store()
    }
}
