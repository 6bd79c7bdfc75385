use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use config::ConfigError;
use serde_json::json;
use sqlx::migrate::MigrateError;
use thiserror::Error;

/// Failures reported by a `UserStore` implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("User store unavailable: {0}")]
    Unavailable(String),

    /// A user with this username already exists. Raised when two first
    /// logins for the same principal race on insert.
    #[error("User already exists: {0}")]
    Duplicate(String),

    #[error("User store error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
                StoreError::Duplicate(db_error.message().to_string())
            }
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(error.to_string()),
            _ => StoreError::Backend(error.to_string()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("User store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("User store error: {0}")]
    Store(String),
}

impl TrackerError {
    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, TrackerError::StoreUnavailable(_))
    }
}

impl From<StoreError> for TrackerError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Unavailable(msg) => TrackerError::StoreUnavailable(msg),
            // get_or_create absorbs duplicates; one surfacing here is a store fault
            StoreError::Duplicate(msg) => TrackerError::Store(msg),
            StoreError::Backend(msg) => TrackerError::Store(msg),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Authentication event queue is full")]
    Full,

    #[error("Authentication event queue is closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] MigrateError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        AppError::Configuration(error.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        AppError::Tracker(TrackerError::from(error))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Environment(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Tracker(TrackerError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            AppError::Tracker(TrackerError::StoreUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Tracker(TrackerError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Queue(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.to_string()
        }))
    }
}
