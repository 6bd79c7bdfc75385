//! The user-store collaborator and its in-process implementation.

use crate::error::StoreError;
use crate::user::User;
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Inserts `user` when it has no id, otherwise updates the stored record.
    ///
    /// An insert whose username is already taken fails with
    /// `StoreError::Duplicate`.
    async fn save(&self, user: &User) -> Result<User, StoreError>;

    /// Returns the stored record for `username`, creating it if absent.
    ///
    /// Losing an insert race to a concurrent caller is not an error: the
    /// winner's record is read back and returned.
    async fn get_or_create(&self, username: &str) -> Result<User, StoreError> {
        if let Some(user) = self.find_by_username(username).await? {
            return Ok(user);
        }

        match self.save(&User::new(username)).await {
            Ok(user) => Ok(user),
            Err(StoreError::Duplicate(reason)) => {
                debug!("Concurrent create for {}: {}", username, reason);
                self.find_by_username(username).await?.ok_or_else(|| {
                    StoreError::Backend(format!(
                        "user {} reported as duplicate but not found",
                        username
                    ))
                })
            }
            Err(e) => Err(e),
        }
    }
}

struct MemoryState {
    users: HashMap<String, User>,
    next_id: i32,
}

pub struct MemoryUserStore {
    state: Mutex<MemoryState>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                users: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().await.users.get(username).cloned())
    }

    async fn save(&self, user: &User) -> Result<User, StoreError> {
        let mut state = self.state.lock().await;

        match user.id {
            None => {
                if state.users.contains_key(&user.username) {
                    return Err(StoreError::Duplicate(user.username.clone()));
                }
                let mut created = user.clone();
                created.id = Some(state.next_id);
                state.next_id += 1;
                state.users.insert(created.username.clone(), created.clone());
                Ok(created)
            }
            Some(id) => match state.users.get_mut(&user.username) {
                Some(existing) if existing.id == Some(id) => {
                    existing.last_logged_in = user.last_logged_in;
                    Ok(existing.clone())
                }
                _ => Err(StoreError::Backend(format!(
                    "no user {} with id {}",
                    user.username, id
                ))),
            },
        }
    }
}
