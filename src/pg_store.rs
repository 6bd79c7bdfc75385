use crate::error::StoreError;
use crate::store::UserStore;
use crate::user::User;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use sqlx::postgres::PgPool;
use sqlx::FromRow;

#[derive(Debug, FromRow)]
struct UserRow {
    user_id: i32,
    username: String,
    last_logged_in: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: Some(row.user_id),
            username: row.username,
            last_logged_in: row.last_logged_in,
        }
    }
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, username, last_logged_in
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn save(&self, user: &User) -> Result<User, StoreError> {
        let row = match user.id {
            None => {
                sqlx::query_as::<_, UserRow>(
                    r#"
                    INSERT INTO users (username, last_logged_in)
                    VALUES ($1, $2)
                    RETURNING user_id, username, last_logged_in
                    "#,
                )
                .bind(&user.username)
                .bind(user.last_logged_in)
                .fetch_one(&self.pool)
                .await?
            }
            Some(id) => sqlx::query_as::<_, UserRow>(
                r#"
                UPDATE users
                SET last_logged_in = $2
                WHERE user_id = $1
                RETURNING user_id, username, last_logged_in
                "#,
            )
            .bind(id)
            .bind(user.last_logged_in)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                StoreError::Backend(format!("no user {} with id {}", user.username, id))
            })?,
        };

        Ok(row.into())
    }

    async fn get_or_create(&self, username: &str) -> Result<User, StoreError> {
        let inserted = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username)
            VALUES ($1)
            ON CONFLICT (username) DO NOTHING
            RETURNING user_id, username, last_logged_in
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            debug!("Created user {}", username);
            return Ok(row.into());
        }

        self.find_by_username(username).await?.ok_or_else(|| {
            StoreError::Backend(format!("user {} conflicted but not found", username))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    // Runs against a live database only when DATABASE_URL is set.
    async fn test_pool() -> Option<PgPool> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("Failed to connect to DATABASE_URL");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");
        Some(pool)
    }

    #[tokio::test]
    async fn get_or_create_then_update() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let store = PgUserStore::new(pool);
        let username = format!("pg-test-{}", Utc::now().timestamp_nanos_opt().unwrap_or(0));

        let mut user = store.get_or_create(&username).await.unwrap();
        let again = store.get_or_create(&username).await.unwrap();
        assert_eq!(user.id, again.id);

        let duplicate = store.save(&User::new(&username)).await;
        assert!(matches!(duplicate, Err(StoreError::Duplicate(_))));

        let now = Utc::now();
        user.last_logged_in = Some(now);
        let saved = store.save(&user).await.unwrap();
        assert_eq!(
            saved.last_logged_in.map(|t| t.timestamp_micros()),
            Some(now.timestamp_micros())
        );
    }
}
