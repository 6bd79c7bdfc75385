use crate::error::TrackerError;
use crate::event_queue::AuthenticationSuccess;
use crate::tracker::LoginTracker;
use async_trait::async_trait;
use backoff::{Error as BackoffError, ExponentialBackoff, ExponentialBackoffBuilder};
use futures::future::join_all;
use log::{error, warn};
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked for every successful authentication.
#[async_trait]
pub trait AuthenticationListener: Send + Sync {
    async fn on_authentication_success(
        &self,
        event: &AuthenticationSuccess,
    ) -> Result<(), TrackerError>;
}

#[async_trait]
impl AuthenticationListener for LoginTracker {
    async fn on_authentication_success(
        &self,
        event: &AuthenticationSuccess,
    ) -> Result<(), TrackerError> {
        self.record_login_at(&event.principal, event.occurred_at)
            .await
            .map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_elapsed: Duration,
}

impl RetryPolicy {
    /// Gives up on the first failure.
    pub fn none() -> Self {
        Self {
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            max_elapsed: Duration::ZERO,
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_max_elapsed_time(Some(self.max_elapsed))
            .build()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(2),
            max_elapsed: Duration::from_secs(30),
        }
    }
}

/// Fans authentication events out to explicitly registered listeners.
pub struct EventDispatcher {
    listeners: Vec<Arc<dyn AuthenticationListener>>,
    retry: RetryPolicy,
}

impl EventDispatcher {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            listeners: Vec::new(),
            retry,
        }
    }

    pub fn register(&mut self, listener: Arc<dyn AuthenticationListener>) {
        self.listeners.push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Delivers `event` to every listener and returns how many of them
    /// failed. Failures are logged here and never reach the publisher.
    pub async fn dispatch(&self, event: &AuthenticationSuccess) -> usize {
        let deliveries = self
            .listeners
            .iter()
            .map(|listener| deliver_with_backoff(listener, event, self.retry));

        join_all(deliveries)
            .await
            .into_iter()
            .filter_map(Result::err)
            .inspect(|e| {
                error!(
                    "Dropped authentication event for {}: {}",
                    event.principal, e
                )
            })
            .count()
    }
}

async fn deliver_with_backoff(
    listener: &Arc<dyn AuthenticationListener>,
    event: &AuthenticationSuccess,
    retry: RetryPolicy,
) -> Result<(), TrackerError> {
    let operation = || {
        let listener = Arc::clone(listener);
        let event = event.clone();
        async move {
            listener
                .on_authentication_success(&event)
                .await
                .map_err(|e| {
                    if e.is_transient() {
                        warn!("Retrying login tracking for {}: {}", event.principal, e);
                        BackoffError::transient(e)
                    } else {
                        BackoffError::permanent(e)
                    }
                })
        }
    };

    backoff::future::retry(retry.backoff(), operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryUserStore, UserStore};
    use crate::test_util::{FlakyStore, RecordingListener, UnavailableStore};
    use chrono::{TimeZone, Utc};

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
            max_elapsed: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn dispatch_reaches_every_listener() {
        let first = Arc::new(RecordingListener::default());
        let second = Arc::new(RecordingListener::default());
        let mut dispatcher = EventDispatcher::new(RetryPolicy::none());
        dispatcher.register(first.clone());
        dispatcher.register(second.clone());

        let failures = dispatcher
            .dispatch(&AuthenticationSuccess::now("alice"))
            .await;

        assert_eq!(failures, 0);
        assert_eq!(dispatcher.listener_count(), 2);
        assert_eq!(first.seen(), vec!["alice".to_string()]);
        assert_eq!(second.seen(), vec!["alice".to_string()]);
    }

    #[tokio::test]
    async fn tracker_listener_records_login() {
        let store = Arc::new(MemoryUserStore::new());
        let mut dispatcher = EventDispatcher::new(RetryPolicy::none());
        dispatcher.register(Arc::new(LoginTracker::new(store.clone())));

        dispatcher
            .dispatch(&AuthenticationSuccess::now("alice"))
            .await;
        // Redelivery of the same login is harmless.
        dispatcher
            .dispatch(&AuthenticationSuccess::now("alice"))
            .await;

        let user = store.find_by_username("alice").await.unwrap().unwrap();
        assert!(user.last_logged_in.is_some());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let store = Arc::new(FlakyStore::new(2));
        let mut dispatcher = EventDispatcher::new(quick_retry());
        dispatcher.register(Arc::new(LoginTracker::new(store.clone())));

        let failures = dispatcher
            .dispatch(&AuthenticationSuccess::now("alice"))
            .await;

        assert_eq!(failures, 0);
        assert_eq!(store.inner().len().await, 1);
    }

    #[tokio::test]
    async fn retried_event_keeps_its_login_time() {
        let store = Arc::new(FlakyStore::new(2));
        let mut dispatcher = EventDispatcher::new(quick_retry());
        dispatcher.register(Arc::new(LoginTracker::new(store.clone())));
        let logged_in_at = Utc.timestamp_opt(1_000, 0).unwrap();

        let failures = dispatcher
            .dispatch(&AuthenticationSuccess {
                principal: "alice".to_string(),
                occurred_at: logged_in_at,
            })
            .await;

        assert_eq!(failures, 0);
        let user = store.inner().find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(user.last_logged_in, Some(logged_in_at));
    }

    #[tokio::test]
    async fn invalid_principal_is_not_retried() {
        let store = Arc::new(MemoryUserStore::new());
        let mut dispatcher = EventDispatcher::new(quick_retry());
        dispatcher.register(Arc::new(LoginTracker::new(store.clone())));

        let failures = dispatcher.dispatch(&AuthenticationSuccess::now("")).await;

        assert_eq!(failures, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn persistent_outage_is_reported_as_failure() {
        let mut dispatcher = EventDispatcher::new(RetryPolicy {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(2),
            max_elapsed: Duration::from_millis(20),
        });
        dispatcher.register(Arc::new(LoginTracker::new(Arc::new(UnavailableStore))));
        let recorder = Arc::new(RecordingListener::default());
        dispatcher.register(recorder.clone());

        let failures = dispatcher
            .dispatch(&AuthenticationSuccess::now("alice"))
            .await;

        assert_eq!(failures, 1);
        assert_eq!(recorder.seen(), vec!["alice".to_string()]);
    }
}
