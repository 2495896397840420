use std::mem;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::events::{LogoutReason, SessionEvent, SessionEvents};
use crate::auth::models::RefreshResponse;
use crate::error::{AppError, AuthError};
use crate::session::TokenStore;

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

type Waiter = oneshot::Sender<Result<String, AuthError>>;

#[derive(Default)]
struct Queue {
    refreshing: bool,
    waiters: Vec<Waiter>,
}

/// Serializes token refreshes: the first request to hit a 401 performs
/// the refresh, every request failing while it is in flight waits for
/// that single outcome.
pub struct RefreshCoordinator {
    store: TokenStore,
    events: SessionEvents,
    refresher: Arc<dyn TokenRefresher>,
    queue: Mutex<Queue>,
}

impl RefreshCoordinator {
    pub fn new(store: TokenStore, events: SessionEvents, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            store,
            events,
            refresher,
            queue: Mutex::new(Queue::default()),
        }
    }

    pub fn state(&self) -> RefreshState {
        if self.queue.lock().refreshing {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    /// Requests parked behind the in-flight refresh.
    pub fn pending(&self) -> usize {
        self.queue.lock().waiters.len()
    }

    /// Recover from a 401 on a request that was sent with `sent_with`.
    /// Resolves to the access token the request should be replayed with.
    pub async fn recover(&self, sent_with: Option<&str>) -> Result<String, AppError> {
        let parked = {
            let mut queue = self.queue.lock();
            if queue.refreshing {
                let (tx, rx) = oneshot::channel();
                queue.waiters.push(tx);
                Some(rx)
            } else {
                match self.store.access() {
                    // A refresh finished after this request left with an older token.
                    Some(current) if sent_with != Some(current.as_str()) => {
                        debug!("Access token already rotated, replaying without refresh");
                        return Ok(current);
                    }
                    // The session ended while this request was in flight.
                    None if sent_with.is_some() => {
                        debug!("Session already cleared, not refreshing");
                        return Err(AuthError::SessionExpired.into());
                    }
                    _ => {}
                }
                queue.refreshing = true;
                None
            }
        };

        if let Some(rx) = parked {
            debug!("Refresh in flight, parking request");
            return match rx.await {
                Ok(Ok(token)) => Ok(token),
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(AppError::TransportError("token refresh was interrupted".to_string())),
            };
        }

        let mut cycle = RefreshCycle {
            coordinator: self,
            finished: false,
        };
        let outcome = self.run_refresh().await;
        cycle.finish(outcome)
    }

    /// A request replayed with `replayed_with` was rejected again. Ends the
    /// session only if that token is still the current one; otherwise an
    /// earlier rejection or a newer refresh already settled it.
    pub fn reject_replay(&self, replayed_with: &str) -> AppError {
        let queue = self.queue.lock();
        if !queue.refreshing && self.store.access().as_deref() == Some(replayed_with) {
            self.store.clear();
            self.events.emit(SessionEvent::LoggedOut {
                reason: LogoutReason::ReplayRejected,
            });
        } else {
            debug!("Replay rejected for a session that already moved on");
        }
        drop(queue);
        AuthError::SessionExpired.into()
    }

    async fn run_refresh(&self) -> Result<String, LogoutReason> {
        let Some(refresh_token) = self.store.refresh() else {
            warn!("Authorization failed with no refresh token stored");
            return Err(LogoutReason::MissingRefreshToken);
        };

        info!("Refreshing access token");
        match self.refresher.refresh(&refresh_token).await {
            Ok(tokens) => {
                self.store.set_access(&tokens.access);
                if let Some(rotated) = tokens.refresh.as_deref() {
                    self.store.set_refresh(rotated);
                }
                Ok(tokens.access)
            }
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                Err(LogoutReason::RefreshFailed)
            }
        }
    }

    fn take_waiters(&self) -> Vec<Waiter> {
        let mut queue = self.queue.lock();
        queue.refreshing = false;
        mem::take(&mut queue.waiters)
    }
}

/// One refresh cycle led by the current task. Dropping it unfinished
/// (the leading future was cancelled) reopens the coordinator and fails
/// the parked requests.
struct RefreshCycle<'a> {
    coordinator: &'a RefreshCoordinator,
    finished: bool,
}

impl RefreshCycle<'_> {
    fn finish(&mut self, outcome: Result<String, LogoutReason>) -> Result<String, AppError> {
        self.finished = true;
        let coordinator = self.coordinator;

        match outcome {
            Ok(token) => {
                let waiters = coordinator.take_waiters();
                debug!("Refresh succeeded, replaying {} parked requests", waiters.len());
                for waiter in waiters {
                    let _ = waiter.send(Ok(token.clone()));
                }
                coordinator.events.emit(SessionEvent::TokensRefreshed);
                Ok(token)
            }
            Err(reason) => {
                coordinator.store.clear();
                let waiters = coordinator.take_waiters();
                debug!("Refresh failed, rejecting {} parked requests", waiters.len());
                for waiter in waiters {
                    let _ = waiter.send(Err(AuthError::SessionExpired));
                }
                coordinator.events.emit(SessionEvent::LoggedOut { reason });
                Err(AuthError::SessionExpired.into())
            }
        }
    }
}

impl Drop for RefreshCycle<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let dropped = self.coordinator.take_waiters().len();
            warn!("Token refresh cancelled with {} parked requests", dropped);
        }
    }
}
