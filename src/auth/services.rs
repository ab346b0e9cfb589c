use tracing::warn;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo::CredentialStore;
use crate::auth::repo_types::User;
use crate::error::AuthError;

/// Register a new user. The username is trimmed before validation; the
/// password is hashed before it reaches the store. Duplicate detection is
/// left entirely to the store's uniqueness constraint.
pub async fn register(
    store: &dyn CredentialStore,
    username: &str,
    password: &str,
) -> Result<User, AuthError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AuthError::MissingFields);
    }

    let hash = hash_password(password).map_err(|e| AuthError::Storage(e.to_string()))?;
    let user = store.insert(username, &hash).await?;
    Ok(user)
}

/// Log a user in. An unknown username and a wrong password produce the same
/// `InvalidCredentials` error, as does a stored hash that does not parse —
/// passwords are never compared as plain strings.
pub async fn login(
    store: &dyn CredentialStore,
    username: &str,
    password: &str,
) -> Result<User, AuthError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AuthError::MissingFields);
    }

    let user = store
        .find_by_username(username)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    match verify_password(password, &user.password_hash) {
        Ok(true) => Ok(user),
        Ok(false) => Err(AuthError::InvalidCredentials),
        Err(e) => {
            warn!(user_id = user.id, error = %e, "stored hash is not a recognized format");
            Err(AuthError::InvalidCredentials)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::{MemoryStore, SqliteStore};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn sqlite_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("open in-memory sqlite");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("run migrations");
        SqliteStore::new(pool)
    }

    #[tokio::test]
    async fn register_then_login_returns_the_same_user() {
        let store = sqlite_store().await;

        let registered = register(&store, "alice", "secret1").await.unwrap();
        assert_eq!(registered.id, 1);
        assert_eq!(registered.username, "alice");

        let logged_in = login(&store, "alice", "secret1").await.unwrap();
        assert_eq!(logged_in.id, registered.id);
        assert_eq!(logged_in.username, registered.username);
    }

    #[tokio::test]
    async fn register_rejects_duplicate_regardless_of_password() {
        let store = sqlite_store().await;
        register(&store, "alice", "secret1").await.unwrap();

        let err = register(&store, "alice", "other").await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUsername));
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_invalid_credentials() {
        let store = sqlite_store().await;
        register(&store, "alice", "secret1").await.unwrap();

        let err = login(&store, "alice", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_with_unknown_username_is_the_same_error() {
        let store = sqlite_store().await;
        let err = login(&store, "nobody", "whatever").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn register_validates_before_touching_the_store() {
        let store = MemoryStore::default();

        for (username, password) in [("", "secret1"), ("   ", "secret1"), ("alice", "")] {
            let err = register(&store, username, password).await.unwrap_err();
            assert!(matches!(err, AuthError::MissingFields));
        }
        assert_eq!(store.user_count(), 0);
    }

    #[tokio::test]
    async fn login_validates_presence_of_both_fields() {
        let store = MemoryStore::default();
        register(&store, "alice", "secret1").await.unwrap();

        for (username, password) in [("", "secret1"), ("alice", ""), ("  ", "x")] {
            let err = login(&store, username, password).await.unwrap_err();
            assert!(matches!(err, AuthError::MissingFields));
        }
    }

    #[tokio::test]
    async fn username_is_trimmed_on_register_and_login() {
        let store = sqlite_store().await;

        let user = register(&store, "  alice  ", "secret1").await.unwrap();
        assert_eq!(user.username, "alice");

        assert!(login(&store, " alice ", "secret1").await.is_ok());
    }

    #[tokio::test]
    async fn password_is_not_trimmed() {
        let store = sqlite_store().await;
        register(&store, "alice", " secret1 ").await.unwrap();

        assert!(login(&store, "alice", " secret1 ").await.is_ok());
        let err = login(&store, "alice", "secret1").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn stored_hash_is_not_the_plaintext() {
        let store = sqlite_store().await;
        register(&store, "alice", "secret1").await.unwrap();

        let stored = store
            .find_by_username("alice")
            .await
            .unwrap()
            .expect("user exists");
        assert_ne!(stored.password_hash, "secret1");
        assert!(stored.password_hash.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn unparseable_stored_hash_never_matches() {
        // A row written by a broken client that stored the plaintext must
        // not let that plaintext log in.
        let store = MemoryStore::default();
        store.insert("legacy", "secret1").await.unwrap();

        let err = login(&store, "legacy", "secret1").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn full_scenario_on_the_memory_store() {
        let store = MemoryStore::default();

        let user = register(&store, "alice", "secret1").await.unwrap();
        assert_eq!(user.id, 1);

        let err = register(&store, "alice", "other").await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUsername));

        let user = login(&store, "alice", "secret1").await.unwrap();
        assert_eq!((user.id, user.username.as_str()), (1, "alice"));

        let err = login(&store, "alice", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }
}
