//! # Import Orchestrator
//!
//! Moves records from a [`RemoteFeed`] into a local [`RecordStore`].
//!
//! ## Flows
//! ```text
//! replace_from_feed():   fetch_all ──► replace_all            (one shot)
//!
//! import_paginated():    clear ──► page 0 ──► save_multiple
//!                                  page 1 ──► save_multiple
//!                                  ...    until last
//!                                  page N fails ──► stop, keep pages 0..N
//! ```
//!
//! Per-record problems land in [`ImportReport::errors`], indexed by position
//! in the feed response. Entries that did not decode are reported next to
//! the ones the store rejected. Failures that stop an import before any data
//! moved are returned as `Err`.

use buho_core::{BulkResult, RecordError, RecordErrorKind};
use buho_store::{Record, RecordStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::SyncResult;
use crate::feed::{FeedBatch, RemoteFeed};

/// Page size when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 500;

// =============================================================================
// Report
// =============================================================================

/// How far an import got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ImportStatus {
    Completed,
    /// Stopped after `pages_imported` pages; those stay stored.
    #[serde(rename_all = "camelCase")]
    Partial { pages_imported: usize },
    /// Nothing was imported.
    Failed,
}

/// Outcome of an import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub success_count: usize,
    pub errors: Vec<RecordError>,
    pub status: ImportStatus,
}

impl ImportReport {
    fn new(result: BulkResult, status: ImportStatus) -> Self {
        Self {
            success_count: result.success_count,
            errors: result.errors,
            status,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == ImportStatus::Completed
    }
}

// =============================================================================
// Importer
// =============================================================================

pub struct Importer<R: Record> {
    store: Arc<dyn RecordStore<R>>,
    feed: Arc<dyn RemoteFeed<R>>,
    page_size: usize,
}

impl<R: Record> Importer<R> {
    pub fn new(store: Arc<dyn RecordStore<R>>, feed: Arc<dyn RemoteFeed<R>>) -> Self {
        Self {
            store,
            feed,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fetches the whole feed and swaps the collection for it.
    ///
    /// A failed fetch leaves the collection untouched.
    pub async fn replace_from_feed(&self) -> SyncResult<ImportReport> {
        let batch = self.feed.fetch_all().await?;
        let fetched = batch.len();

        let (records, pending) = split_batch(batch);
        let result = pending.resolve(self.store.replace_all(records).await?);
        info!(
            entity = R::ENTITY,
            fetched,
            stored = result.success_count,
            rejected = result.errors.len(),
            "Feed import complete"
        );

        Ok(ImportReport::new(result, ImportStatus::Completed))
    }

    /// Clears the collection, then stores the feed page by page.
    pub async fn import_paginated(&self) -> SyncResult<ImportReport> {
        self.store.clear().await?;

        let mut total = BulkResult::default();
        let mut page = 0;

        let status = loop {
            let batch = match self.feed.fetch_page(page, self.page_size).await {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(entity = R::ENTITY, page, error = %e, "Page fetch failed, stopping import");
                    total.record_error(RecordError::new(
                        page,
                        None,
                        RecordErrorKind::Fetch,
                        format!("page {page}: {e}"),
                    ));
                    break stopped_at(page);
                }
            };

            let received = batch.batch.len();
            let last = batch.last;
            let (records, pending) = split_batch(batch.batch);
            match self.store.save_multiple(records).await {
                Ok(result) => total.merge(pending.resolve(result)),
                Err(e) => {
                    warn!(entity = R::ENTITY, page, error = %e, "Page save failed, stopping import");
                    total.record_error(RecordError::new(
                        page,
                        None,
                        RecordErrorKind::Storage,
                        format!("page {page}: {e}"),
                    ));
                    break stopped_at(page);
                }
            }

            info!(entity = R::ENTITY, page, received, stored = total.success_count, "Page imported");
            page += 1;

            if last || received == 0 {
                break ImportStatus::Completed;
            }
        };

        Ok(ImportReport::new(total, status))
    }
}

/// Decode rejects and positions of a batch whose records went to the store.
struct PendingBatch {
    positions: Vec<usize>,
    rejected: Vec<RecordError>,
}

impl PendingBatch {
    /// Store errors are indexed by position in the records handed over;
    /// maps them back to response positions and merges in the rejects.
    fn resolve(self, stored: BulkResult) -> BulkResult {
        let mut errors = self.rejected;
        errors.extend(stored.errors.into_iter().map(|mut error| {
            if let Some(&position) = self.positions.get(error.index) {
                error.index = position;
            }
            error
        }));
        errors.sort_by_key(|error| error.index);

        BulkResult {
            success_count: stored.success_count,
            errors,
        }
    }
}

fn split_batch<R>(batch: FeedBatch<R>) -> (Vec<R>, PendingBatch) {
    let pending = PendingBatch {
        positions: batch.positions,
        rejected: batch.rejected,
    };
    (batch.records, pending)
}

fn stopped_at(page: usize) -> ImportStatus {
    if page == 0 {
        ImportStatus::Failed
    } else {
        ImportStatus::Partial {
            pages_imported: page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedSettings;
    use crate::error::SyncError;
    use crate::feed::{ArticleFeed, FeedResource};
    use buho_core::Article;
    use buho_store::{ConnectionManager, DbConfig, DocumentStore, Engine, SqlArticleStore};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENGINES: [Engine; 2] = [Engine::Document, Engine::Relational];

    fn article_store(engine: Engine) -> Arc<dyn RecordStore<Article>> {
        let manager = Arc::new(ConnectionManager::new(DbConfig::in_memory(), engine));
        match engine {
            Engine::Document => Arc::new(DocumentStore::<Article>::new(manager)),
            Engine::Relational => Arc::new(SqlArticleStore::new(manager)),
        }
    }

    fn feed(server: &MockServer) -> Arc<dyn RemoteFeed<Article>> {
        let settings = FeedSettings {
            base_url: server.uri(),
            max_retries: 1,
            retry_delay_ms: 5,
            ..FeedSettings::default()
        };
        Arc::new(ArticleFeed::new(&settings, FeedResource::ARTICLES).unwrap())
    }

    fn articles(range: std::ops::Range<usize>) -> Vec<Article> {
        range
            .map(|i| Article::new(format!("SKU-{i:04}"), format!("Article {i}")))
            .collect()
    }

    async fn mount_page(server: &MockServer, page: usize, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/itemService/importItems/paginated"))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_paginated_import_keeps_pages_before_failure() {
        for engine in ENGINES {
            let server = MockServer::start().await;
            mount_page(&server, 0, json!({"content": articles(0..500), "last": false})).await;
            Mock::given(method("GET"))
                .and(path("/itemService/importItems/paginated"))
                .and(query_param("page", "1"))
                .respond_with(ResponseTemplate::new(503))
                .mount(&server)
                .await;

            let store = article_store(engine);
            let report = Importer::new(store.clone(), feed(&server))
                .import_paginated()
                .await
                .unwrap();

            assert_eq!(report.success_count, 500, "{engine:?}");
            assert_eq!(report.errors.len(), 1);
            assert_eq!(report.errors[0].kind, RecordErrorKind::Fetch);
            assert_eq!(report.errors[0].index, 1);
            assert_eq!(report.status, ImportStatus::Partial { pages_imported: 1 });
            assert_eq!(store.count().await.unwrap(), 500);
        }
    }

    #[tokio::test]
    async fn test_paginated_import_runs_until_last() {
        for engine in ENGINES {
            let server = MockServer::start().await;
            mount_page(&server, 0, json!({"content": articles(0..3), "last": false})).await;
            mount_page(&server, 1, json!({"content": articles(3..5), "last": true})).await;

            let store = article_store(engine);
            store.create(Article::new("STALE", "Old article")).await.unwrap();

            let report = Importer::new(store.clone(), feed(&server))
                .with_page_size(3)
                .import_paginated()
                .await
                .unwrap();

            assert!(report.is_complete());
            assert_eq!(report.success_count, 5);
            assert!(report.errors.is_empty());
            let stored = store.get_all().await.unwrap();
            assert_eq!(stored.len(), 5);
            assert!(stored.iter().all(|a| a.sku != "STALE"));
        }
    }

    #[tokio::test]
    async fn test_paginated_import_first_page_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/itemService/importItems/paginated"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = article_store(Engine::Document);
        let report = Importer::new(store.clone(), feed(&server))
            .import_paginated()
            .await
            .unwrap();

        assert_eq!(report.status, ImportStatus::Failed);
        assert_eq!(report.success_count, 0);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_paginated_import_reports_invalid_records() {
        let server = MockServer::start().await;
        let mut page = articles(0..2);
        page.push(Article::new("", "No sku"));
        mount_page(&server, 0, json!({"content": page, "last": true})).await;

        let store = article_store(Engine::Relational);
        let report = Importer::new(store.clone(), feed(&server))
            .import_paginated()
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.success_count, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, RecordErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_replace_from_feed() {
        for engine in ENGINES {
            let server = MockServer::start().await;
            let mut body = articles(0..4);
            body.push(Article::new("", "Broken"));
            Mock::given(method("GET"))
                .and(path("/itemService/importItems"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;

            let store = article_store(engine);
            store.create(Article::new("STALE", "Old article")).await.unwrap();

            let report = Importer::new(store.clone(), feed(&server))
                .replace_from_feed()
                .await
                .unwrap();

            assert!(report.is_complete());
            assert_eq!(report.success_count, 4);
            assert_eq!(report.errors.len(), 1);
            assert_eq!(store.count().await.unwrap(), 4);
        }
    }

    #[tokio::test]
    async fn test_replace_from_feed_fetch_failure_keeps_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/itemService/importItems"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = article_store(Engine::Document);
        store.create(Article::new("KEEP", "Existing")).await.unwrap();

        let err = Importer::new(store.clone(), feed(&server))
            .replace_from_feed()
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::HttpStatus { status: 500, .. }));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replace_from_feed_skips_malformed_entries() {
        for engine in ENGINES {
            let server = MockServer::start().await;
            let body = json!([
                {"sku": "A0", "name": "Remera"},
                {"sku": "A1", "name": "Buzo", "unitPrice1": 12.5},
                {"sku": "", "name": "Sin sku"},
                {"sku": "A3", "name": "Gorra"}
            ]);
            Mock::given(method("GET"))
                .and(path("/itemService/importItems"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;

            let store = article_store(engine);
            store.create(Article::new("STALE", "Old article")).await.unwrap();

            let report = Importer::new(store.clone(), feed(&server))
                .replace_from_feed()
                .await
                .unwrap();

            assert!(report.is_complete(), "{engine:?}");
            assert_eq!(report.success_count, 2);
            assert_eq!(report.errors.len(), 2);
            assert_eq!(report.errors[0].index, 1);
            assert_eq!(report.errors[0].kind, RecordErrorKind::Malformed);
            assert_eq!(report.errors[1].index, 2);
            assert_eq!(report.errors[1].kind, RecordErrorKind::Validation);

            let skus: Vec<String> = store.get_all().await.unwrap().into_iter().map(|a| a.sku).collect();
            assert_eq!(skus, vec!["A0", "A3"]);
        }
    }

    #[tokio::test]
    async fn test_paginated_import_skips_malformed_entries() {
        let server = MockServer::start().await;
        let mut page = json!(articles(0..2));
        if let Some(entries) = page.as_array_mut() {
            entries.insert(1, json!({"sku": "BAD", "unitInStock": "muchos"}));
        }
        mount_page(&server, 0, json!({"content": page, "last": true})).await;

        let store = article_store(Engine::Document);
        let report = Importer::new(store.clone(), feed(&server))
            .import_paginated()
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.success_count, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].index, 1);
        assert_eq!(report.errors[0].key.as_deref(), Some("BAD"));
        assert_eq!(report.errors[0].kind, RecordErrorKind::Malformed);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = ImportReport::new(
            BulkResult {
                success_count: 500,
                errors: vec![],
            },
            ImportStatus::Partial { pages_imported: 1 },
        );
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["successCount"], 500);
        assert_eq!(value["status"]["kind"], "partial");
        assert_eq!(value["status"]["pagesImported"], 1);
    }
}
