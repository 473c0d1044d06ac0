//! # Schema Definitions
//!
//! What each engine needs to find in a database before it serves a call,
//! and how to create it.
//!
//! ## Collections
//! ```text
//! ┌──────────────┬─────────┬──────────────────────────────────────────────┐
//! │ collection   │ key     │ lookup indexes                               │
//! ├──────────────┼─────────┼──────────────────────────────────────────────┤
//! │ articles     │ sku     │ name, department.name, unitPrice1,           │
//! │              │         │ unitInStock                                  │
//! │ clients      │ id      │ name, dni                                    │
//! │ orders       │ id      │ state, customer.id                           │
//! └──────────────┴─────────┴──────────────────────────────────────────────┘
//! ```
//!
//! ## Versioning
//! - Document engine: `PRAGMA user_version`. Below [`DOCUMENT_SCHEMA_VERSION`]
//!   every collection is created if absent, then the version is bumped.
//! - Relational engine: sqlx migrations (see [`crate::migrations`]).
//!
//! Upgrades never drop data. Only `ConnectionManager::recreate_database` is
//! destructive.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;

/// Current document engine schema version.
pub const DOCUMENT_SCHEMA_VERSION: i64 = 1;

// =============================================================================
// Engine
// =============================================================================

/// Physical storage engine behind a database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    /// JSON documents keyed by primary key, JSON-path indexes.
    Document,
    /// Normalized columns plus `order_items`, managed by migrations.
    Relational,
}

impl Engine {
    /// Tables that must exist for the engine to serve calls.
    pub fn required_tables(&self) -> &'static [&'static str] {
        match self {
            Engine::Document => &["articles", "clients", "orders"],
            Engine::Relational => &["articles", "clients", "orders", "order_items"],
        }
    }
}

// =============================================================================
// Document Collections
// =============================================================================

/// A document collection: `(seq, key UNIQUE, doc)` plus JSON-path indexes.
#[derive(Debug, Clone, Copy)]
pub struct Collection {
    pub name: &'static str,
    /// SQLite type of the key column.
    pub key_type: &'static str,
    /// `(index suffix, JSON path)` pairs.
    pub indexes: &'static [(&'static str, &'static str)],
}

pub const ARTICLES: Collection = Collection {
    name: "articles",
    key_type: "TEXT",
    indexes: &[
        ("name", "$.name"),
        ("department", "$.department.name"),
        ("unit_price1", "$.unitPrice1"),
        ("unit_in_stock", "$.unitInStock"),
    ],
};

pub const CLIENTS: Collection = Collection {
    name: "clients",
    key_type: "INTEGER",
    indexes: &[("name", "$.name"), ("dni", "$.dni")],
};

pub const ORDERS: Collection = Collection {
    name: "orders",
    key_type: "INTEGER",
    indexes: &[("state", "$.state"), ("customer_id", "$.customer.id")],
};

pub const DOCUMENT_COLLECTIONS: [Collection; 3] = [ARTICLES, CLIENTS, ORDERS];

impl Collection {
    fn create_statements(&self) -> Vec<String> {
        let mut statements = vec![format!(
            "CREATE TABLE IF NOT EXISTS {name} (\
                seq INTEGER PRIMARY KEY AUTOINCREMENT, \
                key {key_type} NOT NULL UNIQUE, \
                doc TEXT NOT NULL\
            )",
            name = self.name,
            key_type = self.key_type,
        )];
        for (suffix, path) in self.indexes {
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS idx_{name}_{suffix} ON {name} (json_extract(doc, '{path}'))",
                name = self.name,
            ));
        }
        statements
    }
}

// =============================================================================
// Upgrade / Inspection
// =============================================================================

/// Brings the database up to the engine's current schema.
pub async fn upgrade(pool: &SqlitePool, engine: Engine) -> DbResult<()> {
    match engine {
        Engine::Document => upgrade_document(pool).await,
        Engine::Relational => migrations::run_migrations(pool).await,
    }
}

async fn upgrade_document(pool: &SqlitePool) -> DbResult<()> {
    let current = document_version(pool).await?;
    if current >= DOCUMENT_SCHEMA_VERSION {
        debug!(version = current, "Document schema up to date");
        return Ok(());
    }

    info!(
        from = current,
        to = DOCUMENT_SCHEMA_VERSION,
        "Upgrading document schema"
    );

    let mut tx = pool.begin().await?;
    for collection in DOCUMENT_COLLECTIONS {
        for statement in collection.create_statements() {
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| DbError::MigrationFailed(e.to_string()))?;
        }
    }
    // PRAGMA does not accept bound parameters
    sqlx::query(&format!("PRAGMA user_version = {DOCUMENT_SCHEMA_VERSION}"))
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::MigrationFailed(e.to_string()))?;
    tx.commit().await?;

    Ok(())
}

async fn document_version<'e, E>(executor: E) -> DbResult<i64>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(executor)
        .await?;
    Ok(version)
}

/// Schema version as seen by the engine (user_version or last migration).
pub async fn schema_version<'e, E>(executor: E, engine: Engine) -> DbResult<i64>
where
    E: sqlx::SqliteExecutor<'e>,
{
    match engine {
        Engine::Document => document_version(executor).await,
        Engine::Relational => migrations::applied_version(executor).await,
    }
}

/// Names of all user tables present.
pub async fn existing_tables<'e, E>(executor: E) -> DbResult<Vec<String>>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_all(executor)
    .await?;
    Ok(tables)
}

/// Required tables that are absent.
pub async fn missing_tables(pool: &SqlitePool, engine: Engine) -> DbResult<Vec<&'static str>> {
    let existing = existing_tables(pool).await?;
    Ok(engine
        .required_tables()
        .iter()
        .copied()
        .filter(|required| !existing.iter().any(|t| t == required))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{open_pool, DbConfig};

    #[tokio::test]
    async fn test_document_upgrade_creates_collections() {
        let pool = open_pool(&DbConfig::in_memory()).await.unwrap();
        assert_eq!(missing_tables(&pool, Engine::Document).await.unwrap().len(), 3);

        upgrade(&pool, Engine::Document).await.unwrap();

        assert!(missing_tables(&pool, Engine::Document).await.unwrap().is_empty());
        assert_eq!(
            schema_version(&pool, Engine::Document).await.unwrap(),
            DOCUMENT_SCHEMA_VERSION
        );
    }

    #[tokio::test]
    async fn test_document_upgrade_preserves_data() {
        let pool = open_pool(&DbConfig::in_memory()).await.unwrap();
        upgrade(&pool, Engine::Document).await.unwrap();
        sqlx::query("INSERT INTO articles (key, doc) VALUES ('A1', '{\"sku\":\"A1\"}')")
            .execute(&pool)
            .await
            .unwrap();

        // Simulate an older schema
        sqlx::query("PRAGMA user_version = 0").execute(&pool).await.unwrap();
        upgrade(&pool, Engine::Document).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_relational_upgrade_runs_migrations() {
        let pool = open_pool(&DbConfig::in_memory()).await.unwrap();
        upgrade(&pool, Engine::Relational).await.unwrap();

        assert!(missing_tables(&pool, Engine::Relational).await.unwrap().is_empty());
        assert_eq!(schema_version(&pool, Engine::Relational).await.unwrap(), 1);
    }
}
