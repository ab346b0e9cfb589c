use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::auth::repo::{CredentialStore, SqliteStore};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CredentialStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let pool = connect(&config.database_url).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("run database migrations")?;

        let store = Arc::new(SqliteStore::new(pool)) as Arc<dyn CredentialStore>;
        Ok(Self { store, config })
    }
}

async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    // The database file lives under a directory that may not exist yet
    // (default is data/app.db); SQLite creates the file but not its parent.
    if let Some(path) = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .filter(|p| !p.starts_with(":memory:"))
    {
        if let Some(dir) = std::path::Path::new(path).parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).context("create database directory")?;
            }
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)
        .context("parse DATABASE_URL")?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await
        .context("connect to database")?;
    Ok(pool)
}

#[cfg(test)]
impl AppState {
    pub(crate) fn for_tests() -> Self {
        use crate::auth::repo::MemoryStore;

        Self {
            store: Arc::new(MemoryStore::default()),
            config: Arc::new(AppConfig::for_tests()),
        }
    }
}
