//! Authentication module for the SafeNow client
//!
//! Login, registration, profile management and the auth state machine
//! UI shells gate on.

pub mod forms;
pub mod models;
mod service;
mod state;

pub use models::{
    ChangePasswordRequest, Language, PreferencesUpdate, ProfileUpdate, RegisterRequest, Role, User,
    UserProfile,
};
pub use service::AuthService;
pub use state::{AuthEvent, AuthState};
