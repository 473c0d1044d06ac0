//! Document engine: each record is its camelCase JSON, keyed by primary key.
//!
//! Secondary lookups go through `json_extract` on the same paths the
//! collection indexes, so they stay index-backed.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqliteConnection;
use std::marker::PhantomData;

use super::{KeyValue, Record, RecordTable, TableStore};
use crate::error::{DbError, DbResult};

/// [`RecordTable`] over a `(seq, key, doc)` collection.
pub struct DocumentTable<R> {
    _record: PhantomData<fn() -> R>,
}

impl<R> Default for DocumentTable<R> {
    fn default() -> Self {
        DocumentTable {
            _record: PhantomData,
        }
    }
}

/// A [`RecordStore`](super::RecordStore) on the document engine.
pub type DocumentStore<R> = TableStore<R, DocumentTable<R>>;

fn encode<R: Record>(record: &R) -> DbResult<(KeyValue, String)> {
    let key = record
        .key()
        .ok_or_else(|| DbError::from(buho_core::ValidationError::required(R::KEY_FIELD)))?;
    Ok((key.into(), serde_json::to_string(record)?))
}

fn decode<R: Record>(docs: Vec<String>) -> DbResult<Vec<R>> {
    docs.iter()
        .map(|doc| serde_json::from_str(doc).map_err(DbError::from))
        .collect()
}

#[async_trait]
impl<R: Record> RecordTable<R> for DocumentTable<R> {
    fn table_name(&self) -> &'static str {
        R::COLLECTION.name
    }

    fn key_column(&self) -> &'static str {
        "key"
    }

    async fn insert(&self, conn: &mut SqliteConnection, record: &R) -> DbResult<()> {
        let (key, doc) = encode(record)?;
        let sql = format!("INSERT INTO {} (key, doc) VALUES (?, ?)", R::COLLECTION.name);
        key.bind(sqlx::query(&sql)).bind(doc).execute(&mut *conn).await?;
        Ok(())
    }

    async fn update(&self, conn: &mut SqliteConnection, record: &R) -> DbResult<u64> {
        let (key, doc) = encode(record)?;
        let sql = format!("UPDATE {} SET doc = ? WHERE key = ?", R::COLLECTION.name);
        let result = key
            .bind(sqlx::query(&sql).bind(doc))
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, conn: &mut SqliteConnection) -> DbResult<Vec<R>> {
        let sql = format!("SELECT doc FROM {} ORDER BY seq", R::COLLECTION.name);
        let docs: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&mut *conn).await?;
        decode(docs)
    }

    async fn fetch_by_key(&self, conn: &mut SqliteConnection, key: &R::Key) -> DbResult<Option<R>> {
        let sql = format!("SELECT doc FROM {} WHERE key = ?", R::COLLECTION.name);
        let query = sqlx::query_scalar::<_, String>(&sql);
        let key_value: KeyValue = key.clone().into();
        let doc = match key_value {
            KeyValue::Int(v) => query.bind(v),
            KeyValue::Text(v) => query.bind(v),
        }
        .fetch_optional(&mut *conn)
        .await?;

        doc.map(|d| serde_json::from_str(&d).map_err(DbError::from))
            .transpose()
    }
}

impl<R: Record> TableStore<R, DocumentTable<R>> {
    /// Records whose JSON value at `path` equals `value`, in insertion order.
    ///
    /// `path` must be one of the collection's indexed paths.
    pub async fn find_by_path(&self, path: &'static str, value: Value) -> DbResult<Vec<R>> {
        if !R::COLLECTION.indexes.iter().any(|(_, p)| *p == path) {
            return Err(DbError::Internal(format!(
                "{path} is not indexed on {}",
                R::COLLECTION.name
            )));
        }

        let pool = self.pool().await?;
        let sql = format!(
            "SELECT doc FROM {} WHERE json_extract(doc, '{path}') = ? ORDER BY seq",
            R::COLLECTION.name
        );
        let query = sqlx::query_scalar::<_, String>(&sql);
        let query = match value {
            Value::Number(n) if n.is_i64() => query.bind(n.as_i64()),
            Value::Bool(b) => query.bind(b),
            Value::String(s) => query.bind(s),
            other => query.bind(other.to_string()),
        };
        let docs = query.fetch_all(&pool).await?;
        decode(docs)
    }
}
