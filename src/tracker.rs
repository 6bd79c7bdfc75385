use crate::error::TrackerError;
use crate::store::UserStore;
use crate::user::{validate_username, User};
use chrono::{DateTime, Utc};
use log::info;
use std::sync::Arc;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Records successful logins against a user store.
#[derive(Clone)]
pub struct LoginTracker {
    store: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
}

impl LoginTracker {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn UserStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Ensures a user exists for `username` and stamps its last login with
    /// the current time. Safe to call repeatedly for the same login.
    pub async fn record_login(&self, username: &str) -> Result<User, TrackerError> {
        self.record_login_at(username, self.clock.now()).await
    }

    /// Like `record_login`, for a login that happened at `at`.
    pub async fn record_login_at(
        &self,
        username: &str,
        at: DateTime<Utc>,
    ) -> Result<User, TrackerError> {
        validate_username(username)?;

        let mut user = self.store.get_or_create(username).await?;
        user.last_logged_in = Some(at);
        let user = self.store.save(&user).await?;

        info!("Recorded login for user: {}", user.username);
        Ok(user)
    }
}
