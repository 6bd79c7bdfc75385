use crate::error::QueueError;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Published once per successful interactive authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationSuccess {
    pub principal: String,
    pub occurred_at: DateTime<Utc>,
}

impl AuthenticationSuccess {
    pub fn now(principal: &str) -> Self {
        Self {
            principal: principal.to_string(),
            occurred_at: Utc::now(),
        }
    }
}

pub type EventReceiver = mpsc::Receiver<AuthenticationSuccess>;

/// Publishing side of the authentication event channel.
#[derive(Clone)]
pub struct EventQueue {
    sender: mpsc::Sender<AuthenticationSuccess>,
}

impl EventQueue {
    pub fn new(capacity: usize) -> (Self, EventReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Enqueues a notification without waiting for it to be handled.
    pub fn publish(&self, principal: &str) -> Result<(), QueueError> {
        self.push(AuthenticationSuccess::now(principal))
    }

    pub fn push(&self, event: AuthenticationSuccess) -> Result<(), QueueError> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Closed(_) => QueueError::Closed,
        })
    }
}
