//! # Record Stores
//!
//! One CRUD + bulk-replace contract ([`RecordStore`]) for articles,
//! customers and orders, served by either engine.
//!
//! ## Layering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   RecordStore<R>  (trait: create, get_all, replace_all, subscribe...)  │
//! │         ▲                                                               │
//! │         │ implemented once, for every engine                           │
//! │   TableStore<R, T>                                                     │
//! │   ├── validation, key assignment, transactions, savepoints             │
//! │   ├── BulkResult bookkeeping                                           │
//! │   └── change feed (watch channel, full-set republish)                  │
//! │         │                                                               │
//! │         │ T: RecordTable<R>  (engine-specific SQL only)                │
//! │         ▼                                                               │
//! │   DocumentTable            RelationalTable                             │
//! │   (key, doc JSON)          (columns + order_items)                     │
//! │                                                                         │
//! │   DocumentStore<R>         SqlArticleStore / SqlClientStore /          │
//! │                            SqlOrderStore                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Bulk Semantics
//! `replace_all` runs in one transaction: clear, then insert every record
//! inside its own savepoint. A bad record is rolled back to its savepoint and
//! reported; its siblings stay. If the clear fails nothing was inserted and
//! the previous contents remain.

pub mod document;
pub mod records;
pub mod relational;

use async_trait::async_trait;
use buho_core::{BulkResult, Customer, RecordError, ValidationError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteArguments, SqliteConnection};
use sqlx::{Connection, Sqlite, SqlitePool};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::connection::ConnectionManager;
use crate::error::{DbError, DbResult};
use crate::schema::Collection;

pub use document::{DocumentStore, DocumentTable};
pub use relational::{RelationalTable, SqlArticleStore, SqlClientStore, SqlOrderStore};

/// Generated keys are retried this many times on collision.
const MAX_KEY_ATTEMPTS: usize = 5;

// =============================================================================
// Keys and Records
// =============================================================================

/// A primary key in bindable form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyValue {
    Int(i64),
    Text(String),
}

impl KeyValue {
    pub fn bind<'q>(
        self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        match self {
            KeyValue::Int(v) => query.bind(v),
            KeyValue::Text(v) => query.bind(v),
        }
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        KeyValue::Int(v)
    }
}

impl From<String> for KeyValue {
    fn from(v: String) -> Self {
        KeyValue::Text(v)
    }
}

/// A value type that a [`RecordStore`] can persist.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + Unpin + 'static {
    type Key: Clone + fmt::Display + Into<KeyValue> + Send + Sync + 'static;

    /// Name used in errors and logs ("Article").
    const ENTITY: &'static str;
    /// Name of the key field on the wire ("sku").
    const KEY_FIELD: &'static str;
    /// Document engine collection.
    const COLLECTION: Collection;

    /// The key, if the record carries a usable one.
    fn key(&self) -> Option<Self::Key>;

    /// Rules for `create`, `update` and `replace_all`.
    fn validate(&self) -> Result<(), ValidationError>;

    /// Rules for `save_multiple`.
    fn validate_for_save(&self) -> Result<(), ValidationError> {
        self.validate()
    }

    /// Generates a key. Returns false for records whose key must come from
    /// the caller.
    fn assign_key(&mut self) -> bool {
        false
    }

    /// Case-insensitive free-text match used by [`SearchableStore`].
    fn matches(&self, _term: &str) -> bool {
        true
    }
}

fn missing_key<R: Record>() -> DbError {
    DbError::from(ValidationError::required(R::KEY_FIELD))
}

/// Assigns a key when absent, then validates.
fn prepare<R: Record>(record: &mut R, strict: bool) -> DbResult<(R::Key, bool)> {
    let generated = record.key().is_none() && record.assign_key();
    if strict {
        record.validate_for_save()?;
    } else {
        record.validate()?;
    }
    let key = record.key().ok_or_else(missing_key::<R>)?;
    Ok((key, generated))
}

fn record_error<R: Record>(index: usize, record: &R, err: &DbError) -> RecordError {
    RecordError::new(
        index,
        record.key().map(|k| k.to_string()),
        err.record_kind(),
        err.to_string(),
    )
}

// =============================================================================
// Store Contract
// =============================================================================

/// CRUD + bulk replace for one record type.
#[async_trait]
pub trait RecordStore<R: Record>: Send + Sync {
    /// Inserts a new record. `DuplicateKey` if the key exists. Records that
    /// can generate keys (orders) get one when absent.
    async fn create(&self, record: R) -> DbResult<R>;

    /// All records in backend insertion order.
    async fn get_all(&self) -> DbResult<Vec<R>>;

    /// Absence is `Ok(None)`.
    async fn get_by_id(&self, key: &R::Key) -> DbResult<Option<R>>;

    /// Full replace by key, inserting when the key is not stored yet.
    /// `NotReady` when the record carries no key.
    async fn update(&self, record: R) -> DbResult<R>;

    /// Idempotent.
    async fn delete(&self, key: &R::Key) -> DbResult<()>;

    async fn count(&self) -> DbResult<u64>;

    async fn clear(&self) -> DbResult<()>;

    /// Atomic clear + best-effort insert.
    async fn replace_all(&self, records: Vec<R>) -> DbResult<BulkResult>;

    /// Best-effort upsert of each record in one transaction.
    async fn save_multiple(&self, records: Vec<R>) -> DbResult<BulkResult>;

    /// Receiver holding the full record set, republished after every mutation.
    async fn subscribe(&self) -> DbResult<watch::Receiver<Vec<R>>>;

    /// Re-reads and republishes the full set.
    async fn refresh(&self) -> DbResult<()>;
}

/// Engine-specific SQL for one record type.
///
/// Every method runs on a connection the caller controls, usually a
/// transaction or a savepoint.
#[async_trait]
pub trait RecordTable<R: Record>: Send + Sync + 'static {
    fn table_name(&self) -> &'static str;

    fn key_column(&self) -> &'static str;

    /// Plain insert; must fail with `DuplicateKey` on an existing key.
    async fn insert(&self, conn: &mut SqliteConnection, record: &R) -> DbResult<()>;

    /// Full replace of an existing row. Returns rows affected.
    async fn update(&self, conn: &mut SqliteConnection, record: &R) -> DbResult<u64>;

    async fn fetch_all(&self, conn: &mut SqliteConnection) -> DbResult<Vec<R>>;

    async fn fetch_by_key(&self, conn: &mut SqliteConnection, key: &R::Key) -> DbResult<Option<R>>;

    /// Insert or full replace, keeping the row's position.
    async fn upsert(&self, conn: &mut SqliteConnection, record: &R) -> DbResult<()> {
        if self.update(conn, record).await? == 0 {
            self.insert(conn, record).await?;
        }
        Ok(())
    }
}

// =============================================================================
// Change Feed
// =============================================================================

/// Full-set publisher backing `subscribe`.
struct ChangeFeed<R> {
    sender: watch::Sender<Vec<R>>,
}

impl<R> ChangeFeed<R> {
    fn new() -> Self {
        let (sender, _) = watch::channel(Vec::new());
        ChangeFeed { sender }
    }

    fn subscribe(&self) -> watch::Receiver<Vec<R>> {
        self.sender.subscribe()
    }

    fn publish(&self, records: Vec<R>) {
        self.sender.send_replace(records);
    }
}

// =============================================================================
// Table Store
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum WriteMode {
    Insert,
    Upsert,
}

/// [`RecordStore`] over any [`RecordTable`].
pub struct TableStore<R: Record, T> {
    manager: Arc<ConnectionManager>,
    table: T,
    feed: ChangeFeed<R>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record, T: RecordTable<R> + Default> TableStore<R, T> {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        TableStore {
            manager,
            table: T::default(),
            feed: ChangeFeed::new(),
            _record: PhantomData,
        }
    }
}

impl<R: Record, T: RecordTable<R>> TableStore<R, T> {
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub(crate) async fn pool(&self) -> DbResult<SqlitePool> {
        self.manager.connection().await
    }

    /// Republishes after a committed mutation. A failed re-read is logged,
    /// the mutation itself already succeeded.
    async fn publish(&self) {
        if let Err(e) = self.refresh().await {
            warn!(entity = R::ENTITY, error = %e, "Could not republish records");
        }
    }

    async fn write_batch(
        &self,
        conn: &mut SqliteConnection,
        records: Vec<R>,
        mode: WriteMode,
    ) -> DbResult<BulkResult> {
        let strict = matches!(mode, WriteMode::Upsert);
        let mut result = BulkResult::default();

        for (index, mut record) in records.into_iter().enumerate() {
            if let Err(e) = prepare(&mut record, strict) {
                debug!(entity = R::ENTITY, index, error = %e, "Record rejected");
                result.record_error(record_error(index, &record, &e));
                continue;
            }

            let mut savepoint = conn.begin().await?;
            let outcome = match mode {
                WriteMode::Insert => self.table.insert(&mut savepoint, &record).await,
                WriteMode::Upsert => self.table.upsert(&mut savepoint, &record).await,
            };
            match outcome {
                Ok(()) => {
                    savepoint.commit().await?;
                    result.record_success();
                }
                Err(e) => {
                    savepoint.rollback().await?;
                    debug!(entity = R::ENTITY, index, error = %e, "Record not stored");
                    result.record_error(record_error(index, &record, &e));
                }
            }
        }

        Ok(result)
    }
}

#[async_trait]
impl<R, T> RecordStore<R> for TableStore<R, T>
where
    R: Record,
    T: RecordTable<R>,
{
    async fn create(&self, mut record: R) -> DbResult<R> {
        let (mut key, generated) = prepare(&mut record, false)?;
        let pool = self.pool().await?;

        let mut attempts = 1;
        loop {
            let mut tx = pool.begin().await?;
            match self.table.insert(&mut tx, &record).await {
                Ok(()) => {
                    tx.commit().await?;
                    break;
                }
                Err(e) if e.is_duplicate() && generated && attempts < MAX_KEY_ATTEMPTS => {
                    attempts += 1;
                    record.assign_key();
                    key = record.key().ok_or_else(missing_key::<R>)?;
                }
                Err(e) if e.is_duplicate() => {
                    return Err(DbError::duplicate(R::KEY_FIELD, key));
                }
                Err(e) => return Err(e),
            }
        }

        debug!(entity = R::ENTITY, key = %key, "Record created");
        self.publish().await;
        Ok(record)
    }

    async fn get_all(&self) -> DbResult<Vec<R>> {
        let pool = self.pool().await?;
        let mut conn = pool.acquire().await?;
        self.table.fetch_all(&mut conn).await
    }

    async fn get_by_id(&self, key: &R::Key) -> DbResult<Option<R>> {
        let pool = self.pool().await?;
        let mut conn = pool.acquire().await?;
        self.table.fetch_by_key(&mut conn, key).await
    }

    async fn update(&self, record: R) -> DbResult<R> {
        let key = record
            .key()
            .ok_or_else(|| DbError::not_ready(R::ENTITY, R::KEY_FIELD))?;
        record.validate()?;

        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;
        self.table.upsert(&mut tx, &record).await?;
        tx.commit().await?;

        debug!(entity = R::ENTITY, key = %key, "Record updated");
        self.publish().await;
        Ok(record)
    }

    async fn delete(&self, key: &R::Key) -> DbResult<()> {
        let pool = self.pool().await?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            self.table.table_name(),
            self.table.key_column()
        );
        let key_value: KeyValue = key.clone().into();
        let result = key_value.bind(sqlx::query(&sql)).execute(&pool).await?;

        debug!(
            entity = R::ENTITY,
            key = %key,
            removed = result.rows_affected(),
            "Record deleted"
        );
        self.publish().await;
        Ok(())
    }

    async fn count(&self) -> DbResult<u64> {
        let pool = self.pool().await?;
        let sql = format!("SELECT COUNT(*) FROM {}", self.table.table_name());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&pool).await?;
        Ok(count as u64)
    }

    async fn clear(&self) -> DbResult<()> {
        let pool = self.pool().await?;
        let sql = format!("DELETE FROM {}", self.table.table_name());
        sqlx::query(&sql).execute(&pool).await?;

        info!(entity = R::ENTITY, "Collection cleared");
        self.publish().await;
        Ok(())
    }

    async fn replace_all(&self, records: Vec<R>) -> DbResult<BulkResult> {
        let total = records.len();
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        let sql = format!("DELETE FROM {}", self.table.table_name());
        sqlx::query(&sql).execute(&mut *tx).await?;

        let result = self.write_batch(&mut tx, records, WriteMode::Insert).await?;
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            entity = R::ENTITY,
            total,
            stored = result.success_count,
            rejected = result.errors.len(),
            "Collection replaced"
        );
        self.publish().await;
        Ok(result)
    }

    async fn save_multiple(&self, records: Vec<R>) -> DbResult<BulkResult> {
        let total = records.len();
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        let result = self.write_batch(&mut tx, records, WriteMode::Upsert).await?;
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            entity = R::ENTITY,
            total,
            stored = result.success_count,
            rejected = result.errors.len(),
            "Records saved"
        );
        self.publish().await;
        Ok(result)
    }

    async fn subscribe(&self) -> DbResult<watch::Receiver<Vec<R>>> {
        let receiver = self.feed.subscribe();
        self.refresh().await?;
        Ok(receiver)
    }

    async fn refresh(&self) -> DbResult<()> {
        let records = self.get_all().await?;
        self.feed.publish(records);
        Ok(())
    }
}

// =============================================================================
// Lookup Extensions
// =============================================================================

/// Case-insensitive search for any store whose records define `matches`.
#[async_trait]
pub trait SearchableStore<R: Record>: RecordStore<R> {
    async fn search_by_name(&self, term: &str) -> DbResult<Vec<R>> {
        let term = buho_core::validation::validate_search_query(term)?;
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|r| r.matches(&term))
            .collect())
    }
}

#[async_trait]
impl<R: Record, S: RecordStore<R> + ?Sized> SearchableStore<R> for S {}

/// Customer lookups by tax id.
#[async_trait]
pub trait ClientLookup: RecordStore<Customer> {
    async fn get_by_dni(&self, dni: &str) -> DbResult<Option<Customer>> {
        let dni = dni.trim();
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .find(|c| c.dni.as_deref().map(str::trim) == Some(dni)))
    }
}

#[async_trait]
impl<S: RecordStore<Customer> + ?Sized> ClientLookup for S {}

// =============================================================================
// Unit Tests
// =============================================================================
//
// The contract tests run against both engines.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use crate::schema::Engine;
    use buho_core::{
        Article, BasketOrder, OrderDraft, OrderItem, RecordErrorKind,
    };
    use chrono::Utc;

    fn manager(engine: Engine) -> Arc<ConnectionManager> {
        Arc::new(ConnectionManager::new(DbConfig::in_memory(), engine))
    }

    fn article_store(engine: Engine) -> Box<dyn RecordStore<Article>> {
        match engine {
            Engine::Document => Box::new(DocumentStore::<Article>::new(manager(engine))),
            Engine::Relational => Box::new(SqlArticleStore::new(manager(engine))),
        }
    }

    fn client_store(engine: Engine) -> Box<dyn RecordStore<Customer>> {
        match engine {
            Engine::Document => Box::new(DocumentStore::<Customer>::new(manager(engine))),
            Engine::Relational => Box::new(SqlClientStore::new(manager(engine))),
        }
    }

    fn order_store(engine: Engine) -> Box<dyn RecordStore<BasketOrder>> {
        match engine {
            Engine::Document => Box::new(DocumentStore::<BasketOrder>::new(manager(engine))),
            Engine::Relational => Box::new(SqlOrderStore::new(manager(engine))),
        }
    }

    const ENGINES: [Engine; 2] = [Engine::Document, Engine::Relational];

    fn sample_order() -> BasketOrder {
        OrderDraft::for_customer(Customer::new(5, "Ana"))
            .with_item(OrderItem::new("A1", "Remera", 2, 1500))
            .into_order(Utc::now())
    }

    #[tokio::test]
    async fn test_replace_all_keeps_valid_subset() {
        for engine in ENGINES {
            let store = article_store(engine);
            let mut stored = Article::new("A1", "Remera");
            stored.unit_price1 = 1000;
            stored.unit_in_stock = 5;
            store.create(stored).await.unwrap();

            let mut fresh = Article::new("A1", "Remera lisa");
            fresh.unit_price1 = 1250;
            fresh.unit_in_stock = 12;
            let result = store
                .replace_all(vec![fresh, Article::new("", "sin sku")])
                .await
                .unwrap();

            assert_eq!(result.success_count, 1, "{engine:?}");
            assert_eq!(result.errors.len(), 1);
            assert_eq!(result.errors[0].index, 1);
            assert_eq!(result.errors[0].kind, RecordErrorKind::Validation);

            let all = store.get_all().await.unwrap();
            assert_eq!(all.len(), 1);
            assert_eq!(all[0].sku, "A1");
            assert_eq!(all[0].name, "Remera lisa");
            assert_eq!(all[0].unit_price1, 1250);
            assert_eq!(all[0].unit_in_stock, 12);
        }
    }

    #[tokio::test]
    async fn test_replace_all_failed_clear_keeps_previous_contents() {
        for engine in ENGINES {
            let manager = manager(engine);
            let store: Box<dyn RecordStore<Article>> = match engine {
                Engine::Document => Box::new(DocumentStore::<Article>::new(manager.clone())),
                Engine::Relational => Box::new(SqlArticleStore::new(manager.clone())),
            };
            store.create(Article::new("OLD-1", "uno")).await.unwrap();
            store.create(Article::new("OLD-2", "dos")).await.unwrap();

            let pool = manager.connection().await.unwrap();
            sqlx::query(
                "CREATE TRIGGER block_clear BEFORE DELETE ON articles \
                 BEGIN SELECT RAISE(ABORT, 'clear blocked'); END",
            )
            .execute(&pool)
            .await
            .unwrap();

            let result = store
                .replace_all(vec![Article::new("NEW", "nuevo")])
                .await;
            assert!(result.is_err(), "{engine:?}");

            let skus: Vec<String> = store
                .get_all()
                .await
                .unwrap()
                .into_iter()
                .map(|a| a.sku)
                .collect();
            assert_eq!(skus, vec!["OLD-1", "OLD-2"], "{engine:?}");
        }
    }

    #[tokio::test]
    async fn test_replace_all_with_nothing_empties() {
        for engine in ENGINES {
            let store = article_store(engine);
            store.create(Article::new("A1", "x")).await.unwrap();

            let result = store.replace_all(vec![]).await.unwrap();
            assert_eq!(result.success_count, 0);
            assert!(result.errors.is_empty());
            assert_eq!(store.count().await.unwrap(), 0, "{engine:?}");
        }
    }

    #[tokio::test]
    async fn test_replace_all_reports_duplicates_in_batch() {
        for engine in ENGINES {
            let store = article_store(engine);
            let result = store
                .replace_all(vec![
                    Article::new("A1", "first"),
                    Article::new("A1", "second"),
                    Article::new("A2", "third"),
                ])
                .await
                .unwrap();

            assert_eq!(result.success_count, 2, "{engine:?}");
            assert_eq!(result.errors[0].kind, RecordErrorKind::DuplicateKey);
            let first = store.get_by_id(&"A1".to_string()).await.unwrap().unwrap();
            assert_eq!(first.name, "first");
        }
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        for engine in ENGINES {
            let store = article_store(engine);
            store.create(Article::new("A1", "x")).await.unwrap();
            store.create(Article::new("A2", "y")).await.unwrap();

            store.delete(&"A1".to_string()).await.unwrap();
            store.delete(&"A1".to_string()).await.unwrap();

            let all = store.get_all().await.unwrap();
            assert_eq!(all.len(), 1, "{engine:?}");
            assert_eq!(all[0].sku, "A2");
        }
    }

    #[tokio::test]
    async fn test_create_duplicate_key_fails() {
        for engine in ENGINES {
            let store = article_store(engine);
            store.create(Article::new("A1", "x")).await.unwrap();
            let err = store.create(Article::new("A1", "y")).await.unwrap_err();
            assert!(err.is_duplicate(), "{engine:?}: {err}");
        }
    }

    #[tokio::test]
    async fn test_update_unknown_key_inserts() {
        for engine in ENGINES {
            let store = article_store(engine);
            store.create(Article::new("A1", "first")).await.unwrap();

            let updated = store.update(Article::new("NEW", "fresh")).await.unwrap();
            assert_eq!(updated.sku, "NEW");

            let all = store.get_all().await.unwrap();
            assert_eq!(all.len(), 2, "{engine:?}");
            assert_eq!(all[1].name, "fresh");
        }
    }

    #[tokio::test]
    async fn test_update_without_key_is_not_ready() {
        for engine in ENGINES {
            let store = client_store(engine);
            let mut keyless = Customer::new(9, "Nadie");
            keyless.id = None;
            let err = store.update(keyless).await.unwrap_err();
            assert!(matches!(err, DbError::NotReady { .. }), "{engine:?}: {err}");

            let err = order_store(engine).update(sample_order()).await.unwrap_err();
            assert!(matches!(err, DbError::NotReady { .. }), "{engine:?}: {err}");
            assert_eq!(store.count().await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_update_replaces_record() {
        for engine in ENGINES {
            let store = client_store(engine);
            store.create(Customer::new(1, "Ana")).await.unwrap();

            let mut changed = Customer::new(1, "Ana María");
            changed.saldo_favor = 2500;
            store.update(changed.clone()).await.unwrap();

            assert_eq!(store.get_by_id(&1).await.unwrap(), Some(changed), "{engine:?}");
            assert_eq!(store.get_by_id(&2).await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_customer_without_id_is_a_record_error() {
        for engine in ENGINES {
            let store = client_store(engine);
            let result = store
                .replace_all(vec![Customer::new(1, "Ana"), Customer::default()])
                .await
                .unwrap();
            assert_eq!(result.success_count, 1, "{engine:?}");
            assert_eq!(result.errors[0].key, None);
        }
    }

    #[tokio::test]
    async fn test_create_assigns_unique_order_ids() {
        for engine in ENGINES {
            let store = order_store(engine);
            let a = store.create(sample_order()).await.unwrap();
            let b = store.create(sample_order()).await.unwrap();

            let (a, b) = (a.id.unwrap(), b.id.unwrap());
            assert!(a > 0 && b > 0);
            assert_ne!(a, b, "{engine:?}");
            assert_eq!(store.count().await.unwrap(), 2);
        }
    }

    #[tokio::test]
    async fn test_order_round_trip_preserves_fields() {
        for engine in ENGINES {
            let store = order_store(engine);
            let created = store.create(sample_order()).await.unwrap();
            let loaded = store.get_by_id(&created.id.unwrap()).await.unwrap().unwrap();
            assert_eq!(loaded, created, "{engine:?}");
        }
    }

    #[tokio::test]
    async fn test_save_multiple_upserts_and_requires_name() {
        for engine in ENGINES {
            let store = article_store(engine);
            store.create(Article::new("A1", "old")).await.unwrap();

            let result = store
                .save_multiple(vec![Article::new("A1", "new"), Article::new("A2", "")])
                .await
                .unwrap();

            assert_eq!(result.success_count, 1, "{engine:?}");
            assert_eq!(result.errors.len(), 1);
            let a1 = store.get_by_id(&"A1".to_string()).await.unwrap().unwrap();
            assert_eq!(a1.name, "new");
            assert_eq!(store.count().await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn test_subscribe_sees_every_mutation() {
        for engine in ENGINES {
            let store = article_store(engine);
            let mut rx = store.subscribe().await.unwrap();
            assert!(rx.borrow_and_update().is_empty());

            store.create(Article::new("A1", "x")).await.unwrap();
            assert!(rx.has_changed().unwrap());
            assert_eq!(rx.borrow_and_update().len(), 1);

            store.clear().await.unwrap();
            assert!(rx.borrow_and_update().is_empty(), "{engine:?}");
        }
    }

    #[tokio::test]
    async fn test_search_and_dni_lookup() {
        for engine in ENGINES {
            let articles = article_store(engine);
            articles.create(Article::new("REM-1", "Remera Azul")).await.unwrap();
            articles.create(Article::new("PAN-1", "Pantalón")).await.unwrap();
            let found = articles.search_by_name("remera").await.unwrap();
            assert_eq!(found.len(), 1, "{engine:?}");

            let clients = client_store(engine);
            let mut ana = Customer::new(1, "Ana");
            ana.dni = Some("30111222".to_string());
            clients.create(ana.clone()).await.unwrap();
            assert_eq!(clients.get_by_dni("30111222").await.unwrap(), Some(ana));
            assert_eq!(clients.get_by_dni("1").await.unwrap(), None);
        }
    }
}
