pub mod db;
pub mod error;
pub mod event_processor;
pub mod event_queue;
pub mod events;
pub mod pg_store;
pub mod routes;
pub mod settings;
pub mod store;
pub mod test_util;
pub mod tracker;
pub mod user;

pub use error::{AppError, QueueError, StoreError, TrackerError};
pub use event_queue::{AuthenticationSuccess, EventQueue};
pub use events::{AuthenticationListener, EventDispatcher, RetryPolicy};
pub use routes::AppState;
pub use settings::Settings;
pub use store::{MemoryUserStore, UserStore};
pub use tracker::LoginTracker;
pub use user::User;
