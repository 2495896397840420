use super::models::User;

/// What UI shells gate on.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Loading,
    Authenticated(User),
    Unauthenticated,
    /// The last operation failed. `user` is kept when the failure happened
    /// inside an authenticated session (e.g. a rejected password change).
    Error { message: String, user: Option<User> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    /// Session bootstrap, login or registration started.
    Started,
    Succeeded(User),
    Failed(String),
    LoggedOut,
    ErrorCleared,
}

impl AuthState {
    pub fn apply(self, event: AuthEvent) -> AuthState {
        match (self, event) {
            (_, AuthEvent::Started) => AuthState::Loading,
            (_, AuthEvent::Succeeded(user)) => AuthState::Authenticated(user),
            (_, AuthEvent::LoggedOut) => AuthState::Unauthenticated,
            (AuthState::Authenticated(user), AuthEvent::Failed(message)) => AuthState::Error {
                message,
                user: Some(user),
            },
            (AuthState::Error { user, .. }, AuthEvent::Failed(message)) => AuthState::Error { message, user },
            (_, AuthEvent::Failed(message)) => AuthState::Error { message, user: None },
            (AuthState::Error { user: Some(user), .. }, AuthEvent::ErrorCleared) => AuthState::Authenticated(user),
            (AuthState::Error { user: None, .. }, AuthEvent::ErrorCleared) => AuthState::Unauthenticated,
            (state, AuthEvent::ErrorCleared) => state,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            AuthState::Error { user, .. } => user.as_ref(),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, AuthState::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            AuthState::Error { message, .. } => Some(message),
            _ => None,
        }
    }
}

impl Default for AuthState {
    fn default() -> Self {
        AuthState::Loading
    }
}
