//! Scripted collaborators for exercising the tracker and event pipeline.

use crate::error::{StoreError, TrackerError};
use crate::event_queue::AuthenticationSuccess;
use crate::events::AuthenticationListener;
use crate::store::{MemoryUserStore, UserStore};
use crate::tracker::Clock;
use crate::user::User;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Returns `start`, then one second later on every subsequent call.
pub struct StepClock {
    next: Mutex<DateTime<Utc>>,
}

impl StepClock {
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            next: Mutex::new(start),
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = self.next.lock().unwrap();
        let now = *next;
        *next = now + Duration::seconds(1);
        now
    }
}

/// A store that cannot be reached.
pub struct UnavailableStore;

#[async_trait]
impl UserStore for UnavailableStore {
    async fn find_by_username(&self, _username: &str) -> Result<Option<User>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn save(&self, _user: &User) -> Result<User, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

/// Counts calls before delegating to `inner`.
pub struct CountingStore<S> {
    inner: S,
    finds: AtomicUsize,
    saves: AtomicUsize,
}

impl<S: UserStore> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            finds: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn finds(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: UserStore> UserStore for CountingStore<S> {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_username(username).await
    }

    async fn save(&self, user: &User) -> Result<User, StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(user).await
    }
}

/// Misses the first `stale_reads` lookups, as a reader racing a concurrent
/// insert would.
pub struct StaleReadStore {
    inner: MemoryUserStore,
    stale_reads: AtomicUsize,
}

impl StaleReadStore {
    pub fn new(inner: MemoryUserStore, stale_reads: usize) -> Self {
        Self {
            inner,
            stale_reads: AtomicUsize::new(stale_reads),
        }
    }

    pub fn inner(&self) -> &MemoryUserStore {
        &self.inner
    }
}

#[async_trait]
impl UserStore for StaleReadStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let stale = self
            .stale_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stale {
            return Ok(None);
        }
        self.inner.find_by_username(username).await
    }

    async fn save(&self, user: &User) -> Result<User, StoreError> {
        self.inner.save(user).await
    }
}

/// Reports the store as unavailable for the first `failures` lookups.
pub struct FlakyStore {
    inner: MemoryUserStore,
    failures: AtomicUsize,
}

impl FlakyStore {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: MemoryUserStore::new(),
            failures: AtomicUsize::new(failures),
        }
    }

    pub fn inner(&self) -> &MemoryUserStore {
        &self.inner
    }
}

#[async_trait]
impl UserStore for FlakyStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Unavailable("timed out".to_string()));
        }
        self.inner.find_by_username(username).await
    }

    async fn save(&self, user: &User) -> Result<User, StoreError> {
        self.inner.save(user).await
    }
}

/// Remembers every principal it is notified about.
#[derive(Default)]
pub struct RecordingListener {
    seen: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthenticationListener for RecordingListener {
    async fn on_authentication_success(
        &self,
        event: &AuthenticationSuccess,
    ) -> Result<(), TrackerError> {
        self.seen.lock().unwrap().push(event.principal.clone());
        Ok(())
    }
}
