//! HTTP layer for the SafeNow client
//!
//! Bearer attachment for protected endpoints and transparent recovery
//! from expired access tokens.

mod client;
mod coordinator;
pub mod endpoints;
mod events;

pub use client::{ApiClient, ApiRequest};
pub use coordinator::{RefreshCoordinator, RefreshState, TokenRefresher};
pub use events::{LogoutReason, SessionEvent, SessionEvents};
