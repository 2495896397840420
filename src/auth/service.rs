use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast::error::RecvError, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::forms;
use super::models::{
    AuthResponse, ChangePasswordRequest, LoginRequest, MessageResponse, PreferencesUpdate,
    ProfileUpdate, RefreshRequest, RegisterRequest, User, UserProfile,
};
use super::state::{AuthEvent, AuthState};
use crate::error::AppError;
use crate::http::{endpoints, ApiClient, ApiRequest, SessionEvent};
use crate::session::Session;
use crate::Result;

/// Drives the [`AuthState`] machine: performs the auth calls, keeps the
/// token store in step, and publishes every transition on a watch channel.
#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
    state: Arc<watch::Sender<AuthState>>,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        let (state, _) = watch::channel(AuthState::Loading);
        Self {
            client,
            state: Arc::new(state),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Validate any stored session against the backend.
    pub async fn initialize(&self) -> AuthState {
        let store = self.client.store();
        if !store.has_credentials() {
            self.dispatch(AuthEvent::LoggedOut);
            return self.state();
        }

        self.dispatch(AuthEvent::Started);
        match self.client.send::<User>(ApiRequest::get(endpoints::ME)).await {
            Ok(user) => {
                info!("Restored session for {}", user.username);
                store.set_user(&user);
                self.dispatch(AuthEvent::Succeeded(user));
            }
            Err(e) => {
                warn!("Stored session rejected: {}", e);
                store.clear();
                self.dispatch(AuthEvent::LoggedOut);
            }
        }
        self.state()
    }

    /// `username` may also be an e-mail address.
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        if let Err(e) = forms::validate_login(&request) {
            return Err(self.fail(e));
        }

        info!("Logging in as {}", username);
        self.dispatch(AuthEvent::Started);
        let result = self.exchange(ApiRequest::post(endpoints::LOGIN).json(&request)).await;
        match result {
            Ok(user) => {
                info!("Login successful for {}", user.username);
                Ok(user)
            }
            Err(e) => {
                error!("Login failed for {}: {}", username, e);
                Err(self.fail(e))
            }
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<User> {
        if let Err(e) = forms::validate_registration(&request) {
            return Err(self.fail(e));
        }

        info!("Registering {}", request.username);
        self.dispatch(AuthEvent::Started);
        match self.exchange(ApiRequest::post(endpoints::REGISTER).json(&request)).await {
            Ok(user) => {
                info!("Registration successful for {}", user.username);
                Ok(user)
            }
            Err(e) => {
                error!("Registration failed for {}: {}", request.username, e);
                Err(self.fail(e))
            }
        }
    }

    /// Best effort server notification, then local clear. Never fails and
    /// never broadcasts: the notification is sent without token recovery.
    pub async fn logout(&self) {
        let store = self.client.store();
        if let Some(refresh) = store.refresh() {
            let notified = match ApiRequest::post(endpoints::LOGOUT).json(&RefreshRequest { refresh: &refresh }) {
                Ok(request) => self.client.send_once::<Value>(request).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = notified {
                warn!("Server logout failed, clearing local session anyway: {}", e);
            }
        }
        store.clear();
        self.dispatch(AuthEvent::LoggedOut);
        info!("Logged out");
    }

    /// Fetch the profile and refresh the cached user.
    pub async fn current_user(&self) -> Result<User> {
        match self.client.send::<User>(ApiRequest::get(endpoints::ME)).await {
            Ok(user) => Ok(self.accept_user(user)),
            Err(e) => Err(self.fail(e)),
        }
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<User> {
        let result = async {
            let request = ApiRequest::put(endpoints::ME).json(&update)?;
            self.client.send::<User>(request).await
        }
        .await;
        match result {
            Ok(user) => {
                info!("Profile updated for {}", user.username);
                Ok(self.accept_user(user))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    pub async fn preferences(&self) -> Result<UserProfile> {
        self.client
            .send::<UserProfile>(ApiRequest::get(endpoints::PREFERENCES))
            .await
            .map_err(|e| self.fail(e))
    }

    pub async fn update_preferences(&self, update: PreferencesUpdate) -> Result<UserProfile> {
        let result = async {
            forms::validate_preferences(&update)?;
            let request = ApiRequest::put(endpoints::PREFERENCES).json(&update)?;
            self.client.send::<UserProfile>(request).await
        }
        .await;
        match result {
            Ok(profile) => {
                if let Some(mut user) = self.client.store().user().or_else(|| self.state().user().cloned()) {
                    user.profile = Some(profile.clone());
                    self.accept_user(user);
                }
                Ok(profile)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Returns the backend's confirmation message.
    pub async fn change_password(&self, request: ChangePasswordRequest) -> Result<String> {
        let result = async {
            forms::validate_password_change(&request)?;
            let request = ApiRequest::post(endpoints::CHANGE_PASSWORD).json(&request)?;
            self.client.send::<MessageResponse>(request).await
        }
        .await;
        match result {
            Ok(response) => {
                self.dispatch(AuthEvent::ErrorCleared);
                Ok(response.message)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    pub fn clear_error(&self) {
        self.dispatch(AuthEvent::ErrorCleared);
    }

    /// Move to `Unauthenticated` whenever the HTTP layer forces a logout.
    pub fn spawn_logout_listener(&self) -> JoinHandle<()> {
        let mut events = self.client.subscribe();
        let state = self.state.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::LoggedOut { reason }) => {
                        info!("Forced logout ({:?})", reason);
                        transition(&state, AuthEvent::LoggedOut);
                    }
                    Ok(SessionEvent::TokensRefreshed) => {}
                    Err(RecvError::Lagged(skipped)) => warn!("Missed {} session events", skipped),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    async fn exchange(&self, request: Result<ApiRequest>) -> Result<User> {
        let response: AuthResponse = self.client.send(request?).await?;
        let tokens = response
            .token_pair()
            .ok_or_else(|| AppError::DecodeError("auth response carried no tokens".to_string()))?;
        self.client.store().save_session(&Session {
            access: tokens.access,
            refresh: tokens.refresh,
            user: response.user.clone(),
        });
        self.dispatch(AuthEvent::Succeeded(response.user.clone()));
        Ok(response.user)
    }

    fn accept_user(&self, user: User) -> User {
        self.client.store().set_user(&user);
        self.dispatch(AuthEvent::Succeeded(user.clone()));
        user
    }

    /// Record the failure on the state machine and hand the error back.
    fn fail(&self, err: AppError) -> AppError {
        if err.is_session_expired() {
            self.dispatch(AuthEvent::LoggedOut);
        } else {
            self.dispatch(AuthEvent::Failed(err.user_message()));
        }
        err
    }

    fn dispatch(&self, event: AuthEvent) {
        transition(&self.state, event);
    }
}

fn transition(state: &watch::Sender<AuthState>, event: AuthEvent) {
    state.send_modify(|current| {
        let previous = std::mem::take(current);
        *current = previous.apply(event);
    });
}
