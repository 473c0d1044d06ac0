//! # Remote Feed
//!
//! HTTP source of articles and customers for imports.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  fetch_all()                 GET <base>/<list_path>        (120 s)      │
//! │  fetch_page(page, size)      GET <base>/<page_path>?page=N&size=M (30 s)│
//! │        │                                                                │
//! │        ▼                                                                │
//! │  attempt ──fail──► retryable? ──no──► Err                               │
//! │     ▲                  │ yes                                            │
//! │     └── sleep(delay × attempt) ◄── attempt ≤ max_retries                │
//! │                                                                         │
//! │  Body: [record, ...]  or  {content, totalElements, totalPages, last}    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A body that is neither shape fails the whole request. Inside a valid body
//! each entry is decoded on its own: an entry that does not fit the record
//! type becomes a `Malformed` [`RecordError`] and its siblings still import.

use async_trait::async_trait;
use backoff::backoff::Backoff;
use buho_core::{Article, Customer, RecordError, RecordErrorKind};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::FeedSettings;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Feed Contract
// =============================================================================

/// Entries of one response that decoded, plus the ones that did not.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedBatch<R> {
    pub records: Vec<R>,
    /// Response position of each entry in `records`.
    pub positions: Vec<usize>,
    /// `Malformed` errors indexed by response position.
    pub rejected: Vec<RecordError>,
}

impl<R> FeedBatch<R> {
    /// Entries received, decoded or not.
    pub fn len(&self) -> usize {
        self.records.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: DeserializeOwned> FeedBatch<R> {
    fn decode(entries: Vec<Value>) -> Self {
        let mut batch = Self {
            records: Vec::with_capacity(entries.len()),
            positions: Vec::with_capacity(entries.len()),
            rejected: Vec::new(),
        };

        for (index, entry) in entries.into_iter().enumerate() {
            let key = wire_key(&entry);
            match serde_json::from_value::<R>(entry) {
                Ok(record) => {
                    batch.records.push(record);
                    batch.positions.push(index);
                }
                Err(e) => batch.rejected.push(RecordError::new(
                    index,
                    key,
                    RecordErrorKind::Malformed,
                    e.to_string(),
                )),
            }
        }

        if !batch.rejected.is_empty() {
            warn!(
                decoded = batch.records.len(),
                rejected = batch.rejected.len(),
                "Feed entries did not decode"
            );
        }
        batch
    }
}

/// Key of an undecodable entry, when it has a readable `sku` or `id`.
fn wire_key(entry: &Value) -> Option<String> {
    ["sku", "id"].iter().find_map(|field| match entry.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// One page of a paginated feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage<R> {
    pub batch: FeedBatch<R>,
    /// No more pages follow.
    pub last: bool,
    pub total_elements: Option<u64>,
}

/// Source of records for an import.
#[async_trait]
pub trait RemoteFeed<R>: Send + Sync {
    /// Everything in one response.
    async fn fetch_all(&self) -> SyncResult<FeedBatch<R>>;

    /// Zero-based page `page` of `size` records.
    async fn fetch_page(&self, page: usize, size: usize) -> SyncResult<FeedPage<R>>;
}

// =============================================================================
// Wire Format
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageEnvelope<R> {
    content: Vec<R>,
    #[serde(default)]
    total_elements: Option<u64>,
    #[serde(default)]
    total_pages: Option<u64>,
    #[serde(default)]
    last: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedBody<R> {
    List(Vec<R>),
    Page(PageEnvelope<R>),
}

impl<R> FeedBody<R> {
    fn into_records(self) -> Vec<R> {
        match self {
            FeedBody::List(records) => records,
            FeedBody::Page(envelope) => envelope.content,
        }
    }

    /// Splits into entries, whether this is the final page, and the total.
    ///
    /// A flat list or an envelope without `last` is final once it comes back short.
    fn into_page(self, page: usize, size: usize) -> (Vec<R>, bool, Option<u64>) {
        match self {
            FeedBody::List(content) => {
                let last = content.len() < size;
                (content, last, None)
            }
            FeedBody::Page(envelope) => {
                let last = envelope.last.unwrap_or_else(|| match envelope.total_pages {
                    Some(total) => page as u64 + 1 >= total,
                    None => envelope.content.len() < size,
                });
                (envelope.content, last, envelope.total_elements)
            }
        }
    }
}

// =============================================================================
// Resources
// =============================================================================

/// Paths of one entity on the back-office API, relative to the base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedResource {
    pub list_path: &'static str,
    pub page_path: &'static str,
    /// Query sent with `fetch_all`.
    pub list_query: &'static [(&'static str, &'static str)],
}

impl FeedResource {
    pub const ARTICLES: FeedResource = FeedResource {
        list_path: "itemService/importItems",
        page_path: "itemService/importItems/paginated",
        list_query: &[],
    };

    pub const CUSTOMERS: FeedResource = FeedResource {
        list_path: "customerService/customersList",
        page_path: "customerService/customersList",
        list_query: &[("page", "0")],
    };
}

// =============================================================================
// Linear Backoff
// =============================================================================

/// Waits `delay × attempt` between attempts, giving up after `max_retries`.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    delay: Duration,
    max_retries: u32,
    attempt: u32,
}

impl LinearBackoff {
    pub fn new(delay: Duration, max_retries: u32) -> Self {
        Self {
            delay,
            max_retries,
            attempt: 0,
        }
    }
}

impl Backoff for LinearBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_retries {
            return None;
        }
        self.attempt += 1;
        Some(self.delay * self.attempt)
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}

// =============================================================================
// HTTP Feed
// =============================================================================

/// [`RemoteFeed`] over the back-office HTTP API.
pub struct HttpFeed<R> {
    client: reqwest::Client,
    base: Url,
    resource: FeedResource,
    settings: FeedSettings,
    _record: PhantomData<fn() -> R>,
}

pub type ArticleFeed = HttpFeed<Article>;
pub type CustomerFeed = HttpFeed<Customer>;

impl<R> HttpFeed<R>
where
    R: DeserializeOwned + Send + 'static,
{
    pub fn new(settings: &FeedSettings, resource: FeedResource) -> SyncResult<Self> {
        let mut base = Url::parse(&settings.base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| SyncError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base,
            resource,
            settings: settings.clone(),
            _record: PhantomData,
        })
    }

    fn endpoint(&self, path: &str) -> SyncResult<Url> {
        Ok(self.base.join(path)?)
    }

    /// GETs `url`, retrying transient failures, and parses the body shape.
    async fn get_body(
        &self,
        url: Url,
        query: Vec<(&str, String)>,
        timeout: Duration,
    ) -> SyncResult<FeedBody<Value>> {
        let policy = LinearBackoff::new(self.settings.retry_delay(), self.settings.max_retries);

        let operation = || {
            let request = self
                .client
                .get(url.clone())
                .query(&query)
                .header(reqwest::header::ACCEPT, "application/json")
                .timeout(timeout);
            async move {
                fetch_bytes(request).await.map_err(|e| {
                    if e.is_retryable() {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        };

        let body = backoff::future::retry_notify(policy, operation, |err: SyncError, wait| {
            warn!(url = %url, error = %err, ?wait, "Feed request failed, retrying");
        })
        .await?;

        debug!(url = %url, bytes = body.len(), "Feed response received");
        Ok(serde_json::from_slice(&body)?)
    }
}

async fn fetch_bytes(request: reqwest::RequestBuilder) -> SyncResult<Vec<u8>> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::HttpStatus {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }
    Ok(response.bytes().await?.to_vec())
}

#[async_trait]
impl<R> RemoteFeed<R> for HttpFeed<R>
where
    R: DeserializeOwned + Send + 'static,
{
    async fn fetch_all(&self) -> SyncResult<FeedBatch<R>> {
        let url = self.endpoint(self.resource.list_path)?;
        let query = self
            .resource
            .list_query
            .iter()
            .map(|(k, v)| (*k, v.to_string()))
            .collect();
        let body = self.get_body(url, query, self.settings.timeout()).await?;
        Ok(FeedBatch::decode(body.into_records()))
    }

    async fn fetch_page(&self, page: usize, size: usize) -> SyncResult<FeedPage<R>> {
        let url = self.endpoint(self.resource.page_path)?;
        let query = vec![("page", page.to_string()), ("size", size.to_string())];
        let body = self.get_body(url, query, self.settings.page_timeout()).await?;
        let (entries, last, total_elements) = body.into_page(page, size);
        Ok(FeedPage {
            batch: FeedBatch::decode(entries),
            last,
            total_elements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer) -> FeedSettings {
        FeedSettings {
            base_url: server.uri(),
            retry_delay_ms: 5,
            ..FeedSettings::default()
        }
    }

    fn articles(n: usize) -> Vec<Article> {
        (0..n)
            .map(|i| Article::new(format!("A{i}"), format!("Article {i}")))
            .collect()
    }

    #[test]
    fn test_linear_backoff() {
        let mut policy = LinearBackoff::new(Duration::from_secs(2), 3);
        assert_eq!(policy.next_backoff(), Some(Duration::from_secs(2)));
        assert_eq!(policy.next_backoff(), Some(Duration::from_secs(4)));
        assert_eq!(policy.next_backoff(), Some(Duration::from_secs(6)));
        assert_eq!(policy.next_backoff(), None);

        policy.reset();
        assert_eq!(policy.next_backoff(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_page_last_inference() {
        let body: FeedBody<u32> = serde_json::from_value(json!([1, 2])).unwrap();
        assert!(body.into_page(0, 5).1);

        let body: FeedBody<u32> =
            serde_json::from_value(json!({"content": [1, 2], "totalPages": 3})).unwrap();
        assert!(!body.into_page(0, 2).1);

        let body: FeedBody<u32> =
            serde_json::from_value(json!({"content": [1, 2], "totalPages": 3})).unwrap();
        assert!(body.into_page(2, 2).1);
    }

    #[tokio::test]
    async fn test_fetch_all_flat_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/itemService/importItems"))
            .respond_with(ResponseTemplate::new(200).set_body_json(articles(3)))
            .expect(1)
            .mount(&server)
            .await;

        let feed = ArticleFeed::new(&settings(&server), FeedResource::ARTICLES).unwrap();
        let fetched = feed.fetch_all().await.unwrap();
        assert_eq!(fetched.len(), 3);
        assert_eq!(fetched.records[2].sku, "A2");
        assert!(fetched.rejected.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_all_rejects_only_bad_entries() {
        let server = MockServer::start().await;
        let body = json!([
            {"sku": "A0", "name": "Remera"},
            {"sku": "A1", "name": "Buzo", "unitPrice1": 12.5},
            "not a record",
            {"sku": "A3", "name": "Gorra", "unitPrice1": 900}
        ]);
        Mock::given(method("GET"))
            .and(path("/itemService/importItems"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let feed = ArticleFeed::new(&settings(&server), FeedResource::ARTICLES).unwrap();
        let fetched = feed.fetch_all().await.unwrap();

        assert_eq!(fetched.len(), 4);
        let skus: Vec<&str> = fetched.records.iter().map(|a| a.sku.as_str()).collect();
        assert_eq!(skus, vec!["A0", "A3"]);
        assert_eq!(fetched.positions, vec![0, 3]);

        assert_eq!(fetched.rejected.len(), 2);
        assert_eq!(fetched.rejected[0].index, 1);
        assert_eq!(fetched.rejected[0].key.as_deref(), Some("A1"));
        assert_eq!(fetched.rejected[0].kind, RecordErrorKind::Malformed);
        assert_eq!(fetched.rejected[1].index, 2);
        assert_eq!(fetched.rejected[1].key, None);
    }

    #[tokio::test]
    async fn test_fetch_all_envelope() {
        let server = MockServer::start().await;
        let body = json!({
            "content": [Customer::new(1, "Ana"), Customer::new(2, "Luis")],
            "totalElements": 2,
            "totalPages": 1,
            "last": true
        });
        Mock::given(method("GET"))
            .and(path("/customerService/customersList"))
            .and(query_param("page", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let feed = CustomerFeed::new(&settings(&server), FeedResource::CUSTOMERS).unwrap();
        let fetched = feed.fetch_all().await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched.records[1].name.as_deref(), Some("Luis"));
    }

    #[tokio::test]
    async fn test_fetch_page_sends_page_and_size() {
        let server = MockServer::start().await;
        let body = json!({
            "content": articles(2),
            "totalElements": 4,
            "totalPages": 2,
            "last": false
        });
        Mock::given(method("GET"))
            .and(path("/itemService/importItems/paginated"))
            .and(query_param("page", "0"))
            .and(query_param("size", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let feed = ArticleFeed::new(&settings(&server), FeedResource::ARTICLES).unwrap();
        let page = feed.fetch_page(0, 2).await.unwrap();
        assert_eq!(page.batch.records.len(), 2);
        assert!(!page.last);
        assert_eq!(page.total_elements, Some(4));
    }

    #[tokio::test]
    async fn test_retries_transient_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/itemService/importItems"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/itemService/importItems"))
            .respond_with(ResponseTemplate::new(200).set_body_json(articles(1)))
            .expect(1)
            .mount(&server)
            .await;

        let feed = ArticleFeed::new(&settings(&server), FeedResource::ARTICLES).unwrap();
        assert_eq!(feed.fetch_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/itemService/importItems"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4)
            .mount(&server)
            .await;

        let feed = ArticleFeed::new(&settings(&server), FeedResource::ARTICLES).unwrap();
        let err = feed.fetch_all().await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_permanent_status_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/itemService/importItems"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let feed = ArticleFeed::new(&settings(&server), FeedResource::ARTICLES).unwrap();
        let err = feed.fetch_all().await.unwrap_err();
        assert!(matches!(err, SyncError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_unexpected_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/itemService/importItems"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": 3})))
            .mount(&server)
            .await;

        let feed = ArticleFeed::new(&settings(&server), FeedResource::ARTICLES).unwrap();
        let err = feed.fetch_all().await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidResponse(_)));
    }
}
