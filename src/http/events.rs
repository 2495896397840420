use tokio::sync::broadcast;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// The refresh endpoint rejected the refresh token or could not be reached.
    RefreshFailed,
    /// A 401 arrived with no refresh token stored.
    MissingRefreshToken,
    /// The request was rejected again after replaying with a fresh token.
    ReplayRejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    TokensRefreshed,
    /// The session was forcibly cleared; shells should send the user to login.
    LoggedOut { reason: LogoutReason },
}

/// Fan-out of session events to every subscriber.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Returns how many subscribers received the event.
    pub fn emit(&self, event: SessionEvent) -> usize {
        if let SessionEvent::LoggedOut { reason } = &event {
            info!("Session ended: {:?}", reason);
        }
        match self.sender.send(event) {
            Ok(count) => count,
            Err(_) => {
                debug!("No session event subscribers");
                0
            }
        }
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new(32)
    }
}
