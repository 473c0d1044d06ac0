//! # Connection Manager
//!
//! One manager per physical database. It owns the pool, opens it lazily,
//! upgrades the schema, and recovers from a damaged schema.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  connection() ──► pool open? ──yes──► clone of the shared pool         │
//! │                      │                                                  │
//! │                      no (first call; concurrent callers wait here)     │
//! │                      ▼                                                  │
//! │               open_pool + schema::upgrade                              │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │             required tables present? ──no──► recreate (delete + open)  │
//! │                      │                                                  │
//! │                     yes ──► store pool, hand out clones                │
//! │                                                                         │
//! │  recreate_database() : close ─► delete file/-wal/-shm ─► open fresh    │
//! │  close()             : close pool, next connection() reopens           │
//! │  check_health()      : read-only probe, never creates the file         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::DbResult;
use crate::pool::{self, DbConfig};
use crate::schema::{self, Engine};

/// Presence of one required collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreHealth {
    pub name: String,
    pub present: bool,
}

/// Snapshot returned by [`ConnectionManager::check_health`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseHealth {
    pub exists: bool,
    pub stores: Vec<StoreHealth>,
    pub schema_version: i64,
}

impl DatabaseHealth {
    fn absent(engine: Engine) -> Self {
        DatabaseHealth {
            exists: false,
            stores: engine
                .required_tables()
                .iter()
                .map(|name| StoreHealth {
                    name: name.to_string(),
                    present: false,
                })
                .collect(),
            schema_version: 0,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.exists && self.stores.iter().all(|s| s.present)
    }
}

/// Owns the single pool of one database.
#[derive(Debug)]
pub struct ConnectionManager {
    config: DbConfig,
    engine: Engine,
    pool: Mutex<Option<SqlitePool>>,
}

impl ConnectionManager {
    pub fn new(config: DbConfig, engine: Engine) -> Self {
        ConnectionManager {
            config,
            engine,
            pool: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Returns the shared pool, opening and upgrading it on first use.
    pub async fn connection(&self) -> DbResult<SqlitePool> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref().filter(|p| !p.is_closed()) {
            return Ok(pool.clone());
        }

        let pool = self.open_verified().await?;
        *guard = Some(pool.clone());
        Ok(pool)
    }

    /// Drops every collection and starts from an empty schema.
    pub async fn recreate_database(&self) -> DbResult<()> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.take() {
            pool.close().await;
        }

        warn!(path = %self.config.database_path.display(), "Recreating database");
        let pool = self.open_fresh().await?;
        *guard = Some(pool);
        Ok(())
    }

    /// Closes the pool. A later `connection()` reopens it.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.lock().await.take() {
            info!("Closing database connection pool");
            pool.close().await;
        }
    }

    /// Reports file presence, required collections and schema version.
    ///
    /// A missing database file is reported as such and is not created.
    pub async fn check_health(&self) -> DbResult<DatabaseHealth> {
        let open_pool = self
            .pool
            .lock()
            .await
            .as_ref()
            .filter(|p| !p.is_closed())
            .cloned();

        if let Some(pool) = open_pool {
            let tables = schema::existing_tables(&pool).await?;
            let version = schema::schema_version(&pool, self.engine).await?;
            return Ok(self.health_from(tables, version));
        }

        if self.config.is_in_memory() || !self.config.database_path.exists() {
            return Ok(DatabaseHealth::absent(self.engine));
        }

        let mut conn = pool::open_read_only(&self.config.database_path).await?;
        let tables = schema::existing_tables(&mut conn).await?;
        let version = schema::schema_version(&mut conn, self.engine).await?;
        Ok(self.health_from(tables, version))
    }

    fn health_from(&self, tables: Vec<String>, schema_version: i64) -> DatabaseHealth {
        DatabaseHealth {
            exists: true,
            stores: self
                .engine
                .required_tables()
                .iter()
                .map(|name| StoreHealth {
                    name: name.to_string(),
                    present: tables.iter().any(|t| t == name),
                })
                .collect(),
            schema_version,
        }
    }

    async fn open_verified(&self) -> DbResult<SqlitePool> {
        let pool = pool::open_pool(&self.config).await?;
        schema::upgrade(&pool, self.engine).await?;

        let missing = schema::missing_tables(&pool, self.engine).await?;
        if missing.is_empty() {
            debug!(engine = ?self.engine, "Database ready");
            return Ok(pool);
        }

        warn!(?missing, "Required collections missing, recreating database");
        pool.close().await;
        self.open_fresh().await
    }

    /// Deletes whatever is on disk and opens an empty, upgraded database.
    async fn open_fresh(&self) -> DbResult<SqlitePool> {
        if !self.config.is_in_memory() {
            pool::delete_database_files(&self.config.database_path)?;
        }
        let pool = pool::open_pool(&self.config).await?;
        schema::upgrade(&pool, self.engine).await?;
        Ok(pool)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_connection_is_shared() {
        let manager = Arc::new(ConnectionManager::new(DbConfig::in_memory(), Engine::Document));

        let (a, b) = tokio::join!(manager.connection(), manager.connection());
        let (a, b) = (a.unwrap(), b.unwrap());

        sqlx::query("INSERT INTO articles (key, doc) VALUES ('A1', '{}')")
            .execute(&a)
            .await
            .unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&b)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_health_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buho.db");
        let manager = ConnectionManager::new(DbConfig::new(&path), Engine::Relational);

        let health = manager.check_health().await.unwrap();
        assert!(!health.exists);
        assert!(health.stores.iter().all(|s| !s.present));
        assert!(!path.exists());

        manager.connection().await.unwrap();
        let health = manager.check_health().await.unwrap();
        assert!(health.is_healthy());
        assert_eq!(health.schema_version, 1);

        // Closed pool: probe goes through a read-only connection
        manager.close().await;
        let health = manager.check_health().await.unwrap();
        assert!(health.is_healthy());
    }

    #[tokio::test]
    async fn test_missing_collection_triggers_recreate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buho.db");

        let manager = ConnectionManager::new(DbConfig::new(&path), Engine::Document);
        let pool = manager.connection().await.unwrap();
        sqlx::query("INSERT INTO articles (key, doc) VALUES ('A1', '{}')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("DROP TABLE clients").execute(&pool).await.unwrap();
        manager.close().await;

        let reopened = ConnectionManager::new(DbConfig::new(&path), Engine::Document);
        let pool = reopened.connection().await.unwrap();

        let health = reopened.check_health().await.unwrap();
        assert!(health.is_healthy());
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_recreate_database_empties_collections() {
        let manager = ConnectionManager::new(DbConfig::in_memory(), Engine::Relational);
        let pool = manager.connection().await.unwrap();
        sqlx::query("INSERT INTO articles (sku, name) VALUES ('A1', 'Remera')")
            .execute(&pool)
            .await
            .unwrap();

        manager.recreate_database().await.unwrap();

        let pool = manager.connection().await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_open_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a database file
        let manager = ConnectionManager::new(DbConfig::new(dir.path()), Engine::Document);
        assert!(manager.connection().await.is_err());
    }
}
