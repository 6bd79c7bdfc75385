use crate::error::AppError;
use crate::settings::DatabaseConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::env;
use std::time::Duration;

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, AppError> {
    // Get database credentials from environment variables
    let username = env::var("DB_USER").map_err(|e| AppError::Environment(e.to_string()))?;
    let password = env::var("DB_PASS").map_err(|e| AppError::Environment(e.to_string()))?;

    let database_url = config.url(&username, &password);

    // A timed-out acquire surfaces to callers as an unavailable store
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&database_url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(AppError::from)?;

    Ok(pool)
}
