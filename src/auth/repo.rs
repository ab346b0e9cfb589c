use std::collections::HashMap;
use std::sync::Mutex;

use axum::async_trait;
use sqlx::SqlitePool;
use thiserror::Error;
use time::OffsetDateTime;

use crate::auth::repo_types::User;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username already taken")]
    DuplicateUsername,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence contract for user credentials. Uniqueness of `username` is
/// enforced by each backend's own mechanism, never by check-then-insert:
/// two concurrent inserts for the same name must resolve to exactly one
/// success and one `DuplicateUsername`.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn insert(&self, username: &str, password_hash: &str) -> Result<User, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
}

/// SQLite-backed store. The `UNIQUE` constraint on `users.username` is the
/// concurrency control for duplicate registrations.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn insert(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let inserted = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash)
            VALUES (?1, ?2)
            RETURNING id, username, password_hash, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateUsername)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, created_at
            FROM users
            WHERE username = ?1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

/// In-memory store implementing the same contract, used where no database
/// file is wanted (offline mirror, tests). Unlike the server store it keeps
/// nothing across restarts, but it still stores hashes only and assigns ids
/// and uniqueness under a single lock.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    next_id: i64,
    users: HashMap<String, User>,
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.users.contains_key(username) {
            return Err(StoreError::DuplicateUsername);
        }
        inner.next_id += 1;
        let user = User {
            id: inner.next_id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.insert(username.to_string(), user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.users.get(username).cloned())
    }
}

#[cfg(test)]
impl MemoryStore {
    pub(crate) fn user_count(&self) -> usize {
        self.inner.lock().unwrap().users.len()
    }
}
