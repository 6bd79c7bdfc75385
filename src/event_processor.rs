use crate::event_queue::EventReceiver;
use crate::events::EventDispatcher;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Drains the event queue until every publisher has been dropped, then
/// waits for in-flight deliveries to finish.
///
/// Each event is dispatched on its own task so that one login stuck in
/// backoff does not hold up the others. At most `max_in_flight` dispatches
/// run at once; beyond that the queue fills and publishers see `Full`.
pub async fn process_events(
    mut receiver: EventReceiver,
    dispatcher: Arc<EventDispatcher>,
    max_in_flight: usize,
) {
    let max_in_flight = max_in_flight.max(1);
    let permits = Arc::new(Semaphore::new(max_in_flight));
    info!(
        "Authentication event processor started with {} listener(s), {} concurrent dispatch(es)",
        dispatcher.listener_count(),
        max_in_flight
    );

    while let Some(event) = receiver.recv().await {
        let permit = match permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!("Event processor semaphore closed: {}", e);
                break;
            }
        };

        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            let failures = dispatcher.dispatch(&event).await;
            if failures > 0 {
                warn!(
                    "{} listener(s) failed for authentication of {}",
                    failures, event.principal
                );
            }
            drop(permit);
        });
    }

    // Every permit back means every spawned dispatch has finished
    if permits.acquire_many(max_in_flight as u32).await.is_err() {
        error!("Event processor semaphore closed while draining");
    }

    info!("Authentication event queue closed, processor stopping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;
    use crate::event_queue::{AuthenticationSuccess, EventQueue};
    use crate::events::{AuthenticationListener, RetryPolicy};
    use crate::store::{MemoryUserStore, UserStore};
    use crate::test_util::RecordingListener;
    use crate::tracker::LoginTracker;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Holds deliveries for "stuck" until released.
    struct GatedListener {
        release: Notify,
        inner: RecordingListener,
    }

    #[async_trait]
    impl AuthenticationListener for GatedListener {
        async fn on_authentication_success(
            &self,
            event: &AuthenticationSuccess,
        ) -> Result<(), TrackerError> {
            if event.principal == "stuck" {
                self.release.notified().await;
            }
            self.inner.on_authentication_success(event).await
        }
    }

    #[tokio::test]
    async fn processes_queued_events_until_closed() {
        let store = Arc::new(MemoryUserStore::new());
        let mut dispatcher = EventDispatcher::new(RetryPolicy::none());
        dispatcher.register(Arc::new(LoginTracker::new(store.clone())));

        let (queue, receiver) = EventQueue::new(16);
        let worker = tokio::spawn(process_events(receiver, Arc::new(dispatcher), 4));

        for name in ["alice", "bob", "alice", ""] {
            queue.publish(name).unwrap();
        }
        drop(queue);
        worker.await.unwrap();

        assert_eq!(store.len().await, 2);
        assert!(store
            .find_by_username("bob")
            .await
            .unwrap()
            .and_then(|u| u.last_logged_in)
            .is_some());
    }

    #[tokio::test]
    async fn slow_delivery_does_not_block_later_events() {
        let listener = Arc::new(GatedListener {
            release: Notify::new(),
            inner: RecordingListener::default(),
        });
        let mut dispatcher = EventDispatcher::new(RetryPolicy::none());
        dispatcher.register(listener.clone());

        let (queue, receiver) = EventQueue::new(16);
        let worker = tokio::spawn(process_events(receiver, Arc::new(dispatcher), 4));

        queue.publish("stuck").unwrap();
        queue.publish("alice").unwrap();

        let mut delivered = false;
        for _ in 0..100 {
            if listener.inner.seen() == vec!["alice".to_string()] {
                delivered = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(delivered, "alice waited behind the stuck delivery");

        listener.release.notify_one();
        drop(queue);
        worker.await.unwrap();

        assert_eq!(
            listener.inner.seen(),
            vec!["alice".to_string(), "stuck".to_string()]
        );
    }
}
