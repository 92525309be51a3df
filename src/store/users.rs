use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tokio::sync::RwLock;
use tracing::info;

use super::postgres::redact_url;
use super::StoreError;

/// Stored account used by the login, refresh and adduser routes
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    pub roles: Vec<String>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Insert a new user; `StoreError::Conflict` when the name is taken
    async fn insert(&self, user: UserRecord) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn insert(&self, user: UserRecord) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Err(StoreError::Conflict(user.username));
        }
        users.insert(user.username.clone(), user);
        Ok(())
    }
}

/// Users kept in a PostgreSQL `users` table
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub async fn connect(url: &str, connection_timeout_secs: u64) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(connection_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL,
                roles TEXT[] NOT NULL DEFAULT '{}'
            )",
        )
        .execute(&pool)
        .await?;

        info!("Connected user store: {}", redact_url(url));
        Ok(Self { pool })
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let user = sqlx::query_as::<_, UserRecord>(
            "SELECT username, password_hash, roles FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn insert(&self, user: UserRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, roles) VALUES ($1, $2, $3)
             ON CONFLICT (username) DO NOTHING",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.roles)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(user.username));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, roles: &[&str]) -> UserRecord {
        UserRecord {
            username: name.to_string(),
            password_hash: "$2b$04$not-a-real-hash".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryUserStore::new();
        store.insert(user("alice", &["admin"])).await.unwrap();

        let found = store.find("alice").await.unwrap().unwrap();
        assert_eq!(found.roles, vec!["admin".to_string()]);
        assert!(store.find("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_rejects_duplicates() {
        let store = MemoryUserStore::new();
        store.insert(user("alice", &[])).await.unwrap();
        let err = store.insert(user("alice", &["admin"])).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(name) if name == "alice"));
    }
}
