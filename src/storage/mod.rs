//! Storage layer for the Auzolan backend
//!
//! SQLite through rusqlite, with a deadpool-sqlite connection pool so the
//! blocking driver never runs on the async executor. Each submodule holds the
//! queries for one aggregate as plain functions over `&Connection`; they work
//! unchanged inside a `Transaction`, which derefs to `Connection`.

pub mod chat;
pub mod communities;
pub mod loans;
pub mod reports;
pub mod requests;
pub mod users;

use crate::error::{AuzolanError, Result};
use deadpool_sqlite::{Config, Pool, PoolConfig, Runtime};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Ordered schema migrations; the index + 1 is the schema version
const MIGRATIONS: &[&str] = &[
    include_str!("../../migrations/sqlite/001_initial_schema.sql"),
    include_str!("../../migrations/sqlite/002_single_pending_loan_request.sql"),
];

/// Pooled SQLite storage
pub struct Storage {
    pool: Pool,
    path: PathBuf,
}

impl Storage {
    /// Open (or create) the database file with a connection pool
    ///
    /// # Example
    /// ```ignore
    /// let storage = Storage::open("auzolan.db", 16)?;
    /// storage.run_migrations().await?;
    /// ```
    pub fn open<P: AsRef<Path>>(db_path: P, pool_size: usize) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        info!(
            "Opening SQLite database at: {} (pool_size: {})",
            path.display(),
            pool_size
        );

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut config = Config::new(path.clone());
        config.pool = Some(PoolConfig::new(pool_size.max(1)));
        let pool = config
            .create_pool(Runtime::Tokio1)
            .map_err(|e| AuzolanError::Pool(format!("Failed to create connection pool: {}", e)))?;

        Ok(Self { pool, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` on a pooled connection, on the pool's blocking thread
    ///
    /// Foreign keys are enforced on every checkout; SQLite keeps that pragma
    /// per connection.
    pub async fn interact<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.pool.get().await?;
        conn.interact(move |conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            f(conn)
        })
        .await?
    }

    /// Apply pending migrations, tracked through `PRAGMA user_version`
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        let applied = self
            .interact(|conn| {
                let _mode: String =
                    conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
                let current: i64 =
                    conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

                let mut applied = 0;
                for (index, sql) in MIGRATIONS.iter().enumerate() {
                    let version = index as i64 + 1;
                    if version <= current {
                        continue;
                    }

                    debug!("Applying migration {}", version);
                    let tx = conn.transaction()?;
                    tx.execute_batch(sql)?;
                    tx.pragma_update(None, "user_version", version)?;
                    tx.commit()?;
                    applied += 1;
                }
                Ok(applied)
            })
            .await?;

        info!("Database migrations completed ({} applied)", applied);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path().join("test.db"), 2).unwrap();

        storage.run_migrations().await.unwrap();
        storage.run_migrations().await.unwrap();

        let version: i64 = storage
            .interact(|conn| Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(version, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path().join("fk.db"), 2).unwrap();
        storage.run_migrations().await.unwrap();

        let result = storage
            .interact(|conn| {
                conn.execute(
                    "INSERT INTO profiles (user_id, display_name, updated_at) VALUES (999, 'x', '2024-01-01')",
                    [],
                )?;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(AuzolanError::Database(_))));
    }
}
