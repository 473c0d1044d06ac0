//! # Unified Order Storage
//!
//! Picks one order backend per process and forwards every order operation to
//! it. Callers never see which engine is behind the façade except through
//! [`OrderStorageFacade::active_backend`].
//!
//! ## Backend Selection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Platform::Native   (android / ios)  ──► Relational engine             │
//! │   Platform::Embedded (everything else) ──► Document engine              │
//! │                                                                         │
//! │   StoreConfig.platform overrides detection (tests, desktop builds).    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Capabilities
//! Optional abilities are discovered through typed accessors on
//! [`OrderStorage`], never by probing for methods:
//!
//! | capability               | Document | Relational |
//! |--------------------------|----------|------------|
//! | `CustomerIndexedLookup`  | yes      | no         |
//! | `SampleDataSeeding`      | yes      | no         |
//!
//! Without the indexed lookup, orders by customer fall back to an in-memory
//! filter of every order.

use async_trait::async_trait;
use buho_core::{
    Article, BasketOrder, BulkResult, Customer, OrderDraft, OrderFilter, OrderPage, OrderState,
    OrderStats,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::connection::ConnectionManager;
use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;
use crate::sample;
use crate::schema::Engine;
use crate::store::{
    DocumentStore, RecordStore, SqlArticleStore, SqlClientStore, SqlOrderStore,
};

// =============================================================================
// Platform / Backend
// =============================================================================

/// Runtime the process runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Native mobile runtime.
    Native,
    /// Embedded or browser-hosted runtime.
    Embedded,
}

impl Platform {
    /// Detected from the build target.
    pub const fn detect() -> Self {
        if cfg!(any(target_os = "android", target_os = "ios")) {
            Platform::Native
        } else {
            Platform::Embedded
        }
    }

    pub const fn engine(&self) -> Engine {
        match self {
            Platform::Native => Engine::Relational,
            Platform::Embedded => Engine::Document,
        }
    }
}

/// Diagnostic name of the active order backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    Relational,
    Document,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Relational => f.write_str("relational"),
            BackendKind::Document => f.write_str("document"),
        }
    }
}

// =============================================================================
// Storage Traits
// =============================================================================

/// Operations every order backend supports.
#[async_trait]
pub trait OrderStorage: Send + Sync {
    fn backend_kind(&self) -> BackendKind;

    async fn create_order(&self, order: BasketOrder) -> DbResult<BasketOrder>;
    async fn get_orders(&self) -> DbResult<Vec<BasketOrder>>;
    async fn get_order_by_id(&self, id: i64) -> DbResult<Option<BasketOrder>>;
    async fn update_order(&self, order: BasketOrder) -> DbResult<BasketOrder>;
    async fn delete_order(&self, id: i64) -> DbResult<()>;
    async fn get_orders_by_state(&self, state: OrderState) -> DbResult<Vec<BasketOrder>>;
    async fn search_orders_by_customer_name(&self, term: &str) -> DbResult<Vec<BasketOrder>>;
    async fn clear_orders(&self) -> DbResult<()>;
    async fn count_orders(&self) -> DbResult<u64>;
    async fn replace_all_orders(&self, orders: Vec<BasketOrder>) -> DbResult<BulkResult>;
    async fn subscribe_orders(&self) -> DbResult<watch::Receiver<Vec<BasketOrder>>>;

    fn customer_index(&self) -> Option<&dyn CustomerIndexedLookup> {
        None
    }

    fn sample_data(&self) -> Option<&dyn SampleDataSeeding> {
        None
    }
}

/// Index-backed lookup of a customer's orders.
#[async_trait]
pub trait CustomerIndexedLookup: Send + Sync {
    async fn orders_by_customer_id(&self, customer_id: i64) -> DbResult<Vec<BasketOrder>>;
}

/// Loads the fixed demo orders.
#[async_trait]
pub trait SampleDataSeeding: Send + Sync {
    async fn load_sample_data(&self) -> DbResult<BulkResult>;
}

async fn orders_matching_name<S>(store: &S, term: &str) -> DbResult<Vec<BasketOrder>>
where
    S: RecordStore<BasketOrder> + ?Sized,
{
    let term = buho_core::validation::validate_search_query(term)?;
    Ok(store
        .get_all()
        .await?
        .into_iter()
        .filter(|o| o.matches_customer_name(&term))
        .collect())
}

#[async_trait]
impl OrderStorage for DocumentStore<BasketOrder> {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Document
    }

    async fn create_order(&self, order: BasketOrder) -> DbResult<BasketOrder> {
        self.create(order).await
    }

    async fn get_orders(&self) -> DbResult<Vec<BasketOrder>> {
        self.get_all().await
    }

    async fn get_order_by_id(&self, id: i64) -> DbResult<Option<BasketOrder>> {
        self.get_by_id(&id).await
    }

    async fn update_order(&self, order: BasketOrder) -> DbResult<BasketOrder> {
        self.update(order).await
    }

    async fn delete_order(&self, id: i64) -> DbResult<()> {
        self.delete(&id).await
    }

    async fn get_orders_by_state(&self, state: OrderState) -> DbResult<Vec<BasketOrder>> {
        self.find_by_path("$.state", json!(state.as_str())).await
    }

    async fn search_orders_by_customer_name(&self, term: &str) -> DbResult<Vec<BasketOrder>> {
        orders_matching_name(self, term).await
    }

    async fn clear_orders(&self) -> DbResult<()> {
        self.clear().await
    }

    async fn count_orders(&self) -> DbResult<u64> {
        self.count().await
    }

    async fn replace_all_orders(&self, orders: Vec<BasketOrder>) -> DbResult<BulkResult> {
        self.replace_all(orders).await
    }

    async fn subscribe_orders(&self) -> DbResult<watch::Receiver<Vec<BasketOrder>>> {
        self.subscribe().await
    }

    fn customer_index(&self) -> Option<&dyn CustomerIndexedLookup> {
        Some(self)
    }

    fn sample_data(&self) -> Option<&dyn SampleDataSeeding> {
        Some(self)
    }
}

#[async_trait]
impl CustomerIndexedLookup for DocumentStore<BasketOrder> {
    async fn orders_by_customer_id(&self, customer_id: i64) -> DbResult<Vec<BasketOrder>> {
        self.find_by_path("$.customer.id", json!(customer_id)).await
    }
}

#[async_trait]
impl SampleDataSeeding for DocumentStore<BasketOrder> {
    /// Adds each sample order; ids already present are reported, not replaced.
    async fn load_sample_data(&self) -> DbResult<BulkResult> {
        let mut result = BulkResult::default();
        for (index, order) in sample::sample_orders(Utc::now()).into_iter().enumerate() {
            let id = order.id;
            match self.create(order).await {
                Ok(_) => result.record_success(),
                Err(e) if e.is_duplicate() => {
                    debug!(?id, "Sample order already exists");
                    result.record_error(buho_core::RecordError::new(
                        index,
                        id.map(|id| id.to_string()),
                        e.record_kind(),
                        e.to_string(),
                    ));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(result)
    }
}

#[async_trait]
impl OrderStorage for SqlOrderStore {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    async fn create_order(&self, order: BasketOrder) -> DbResult<BasketOrder> {
        self.create(order).await
    }

    async fn get_orders(&self) -> DbResult<Vec<BasketOrder>> {
        self.get_all().await
    }

    async fn get_order_by_id(&self, id: i64) -> DbResult<Option<BasketOrder>> {
        self.get_by_id(&id).await
    }

    async fn update_order(&self, order: BasketOrder) -> DbResult<BasketOrder> {
        self.update(order).await
    }

    async fn delete_order(&self, id: i64) -> DbResult<()> {
        self.delete(&id).await
    }

    async fn get_orders_by_state(&self, state: OrderState) -> DbResult<Vec<BasketOrder>> {
        self.orders_by_state(state).await
    }

    async fn search_orders_by_customer_name(&self, term: &str) -> DbResult<Vec<BasketOrder>> {
        orders_matching_name(self, term).await
    }

    async fn clear_orders(&self) -> DbResult<()> {
        self.clear().await
    }

    async fn count_orders(&self) -> DbResult<u64> {
        self.count().await
    }

    async fn replace_all_orders(&self, orders: Vec<BasketOrder>) -> DbResult<BulkResult> {
        self.replace_all(orders).await
    }

    async fn subscribe_orders(&self) -> DbResult<watch::Receiver<Vec<BasketOrder>>> {
        self.subscribe().await
    }
}

// =============================================================================
// Façade
// =============================================================================

/// Where and how to open the store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database: DbConfig,
    /// `None` detects the platform from the build target.
    pub platform: Option<Platform>,
}

impl StoreConfig {
    pub fn new(database: DbConfig) -> Self {
        StoreConfig {
            database,
            platform: None,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform.unwrap_or_else(Platform::detect)
    }
}

/// Single entry point for order, article and customer storage.
pub struct OrderStorageFacade {
    manager: Arc<ConnectionManager>,
    orders: Arc<dyn OrderStorage>,
    articles: Arc<dyn RecordStore<Article>>,
    clients: Arc<dyn RecordStore<Customer>>,
}

impl OrderStorageFacade {
    /// Selects the backend and opens (creating if needed) its database.
    pub async fn open(config: StoreConfig) -> DbResult<Self> {
        let platform = config.platform();
        let engine = platform.engine();
        let manager = Arc::new(ConnectionManager::new(config.database, engine));
        manager.connection().await?;

        let (orders, articles, clients): (
            Arc<dyn OrderStorage>,
            Arc<dyn RecordStore<Article>>,
            Arc<dyn RecordStore<Customer>>,
        ) = match engine {
            Engine::Relational => (
                Arc::new(SqlOrderStore::new(manager.clone())),
                Arc::new(SqlArticleStore::new(manager.clone())),
                Arc::new(SqlClientStore::new(manager.clone())),
            ),
            Engine::Document => (
                Arc::new(DocumentStore::<BasketOrder>::new(manager.clone())),
                Arc::new(DocumentStore::<Article>::new(manager.clone())),
                Arc::new(DocumentStore::<Customer>::new(manager.clone())),
            ),
        };

        info!(?platform, backend = %orders.backend_kind(), "Order storage opened");

        Ok(OrderStorageFacade {
            manager,
            orders,
            articles,
            clients,
        })
    }

    pub fn active_backend(&self) -> BackendKind {
        self.orders.backend_kind()
    }

    pub fn storage(&self) -> Arc<dyn OrderStorage> {
        self.orders.clone()
    }

    pub fn articles(&self) -> Arc<dyn RecordStore<Article>> {
        self.articles.clone()
    }

    pub fn clients(&self) -> Arc<dyn RecordStore<Customer>> {
        self.clients.clone()
    }

    pub fn connection_manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    // -------------------------------------------------------------------------
    // Forwarded operations
    // -------------------------------------------------------------------------

    pub async fn create_order(&self, order: BasketOrder) -> DbResult<BasketOrder> {
        self.orders.create_order(order).await
    }

    /// Creates an order from a draft, filling the order-entry defaults.
    pub async fn create_order_from_draft(&self, draft: OrderDraft) -> DbResult<BasketOrder> {
        self.orders.create_order(draft.into_order(Utc::now())).await
    }

    pub async fn get_orders(&self) -> DbResult<Vec<BasketOrder>> {
        self.orders.get_orders().await
    }

    pub async fn get_order_by_id(&self, id: i64) -> DbResult<Option<BasketOrder>> {
        self.orders.get_order_by_id(id).await
    }

    pub async fn update_order(&self, order: BasketOrder) -> DbResult<BasketOrder> {
        self.orders.update_order(order).await
    }

    pub async fn delete_order(&self, id: i64) -> DbResult<()> {
        self.orders.delete_order(id).await
    }

    pub async fn get_orders_by_state(&self, state: OrderState) -> DbResult<Vec<BasketOrder>> {
        self.orders.get_orders_by_state(state).await
    }

    pub async fn search_orders_by_customer_name(&self, term: &str) -> DbResult<Vec<BasketOrder>> {
        self.orders.search_orders_by_customer_name(term).await
    }

    pub async fn clear_orders(&self) -> DbResult<()> {
        self.orders.clear_orders().await
    }

    pub async fn count_orders(&self) -> DbResult<u64> {
        self.orders.count_orders().await
    }

    pub async fn replace_all_orders(&self, orders: Vec<BasketOrder>) -> DbResult<BulkResult> {
        self.orders.replace_all_orders(orders).await
    }

    pub async fn subscribe_orders(&self) -> DbResult<watch::Receiver<Vec<BasketOrder>>> {
        self.orders.subscribe_orders().await
    }

    /// Uses the backend index when it has one, otherwise filters every order.
    pub async fn get_orders_by_customer_id(&self, customer_id: i64) -> DbResult<Vec<BasketOrder>> {
        if let Some(index) = self.orders.customer_index() {
            return index.orders_by_customer_id(customer_id).await;
        }
        Ok(self
            .orders
            .get_orders()
            .await?
            .into_iter()
            .filter(|o| o.customer_id() == Some(customer_id))
            .collect())
    }

    /// No-op (with a warning) on backends without sample seeding.
    pub async fn load_sample_data(&self) -> DbResult<BulkResult> {
        match self.orders.sample_data() {
            Some(seeder) => seeder.load_sample_data().await,
            None => {
                warn!(backend = %self.active_backend(), "Sample data not available for this backend");
                Ok(BulkResult::default())
            }
        }
    }

    // -------------------------------------------------------------------------
    // Order list helpers
    // -------------------------------------------------------------------------

    pub async fn filter_orders(&self, filter: &OrderFilter) -> DbResult<OrderPage> {
        Ok(filter.apply(self.get_orders().await?))
    }

    /// Free-text search across id, customer contact data, state and branch.
    pub async fn search_orders(&self, term: &str) -> DbResult<Vec<BasketOrder>> {
        let term = buho_core::validation::validate_search_query(term)?;
        Ok(self
            .get_orders()
            .await?
            .into_iter()
            .filter(|o| o.matches_search(&term))
            .collect())
    }

    /// Orders opened within `[start, end]`.
    pub async fn get_orders_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<BasketOrder>> {
        Ok(self
            .get_orders()
            .await?
            .into_iter()
            .filter(|o| o.open >= start && o.open <= end)
            .collect())
    }

    pub async fn order_statistics(&self) -> DbResult<OrderStats> {
        Ok(OrderStats::from_orders(&self.get_orders().await?))
    }

    // -------------------------------------------------------------------------
    // JSON export / import
    // -------------------------------------------------------------------------

    /// Every order as a pretty-printed JSON array.
    pub async fn export_orders_to_json(&self) -> DbResult<String> {
        let orders = self.get_orders().await?;
        Ok(serde_json::to_string_pretty(&orders)?)
    }

    /// Creates every order in `json`. An id already stored gets a fresh one.
    ///
    /// Malformed JSON fails the whole call; a record that cannot be stored is
    /// reported and the rest continue.
    pub async fn import_orders_from_json(&self, json: &str) -> DbResult<BulkResult> {
        let orders: Vec<BasketOrder> = serde_json::from_str(json)
            .map_err(|e| DbError::InvalidJson(format!("order import: {e}")))?;

        let total = orders.len();
        let mut result = BulkResult::default();
        for (index, mut order) in orders.into_iter().enumerate() {
            if let Some(id) = order.key() {
                if self.orders.get_order_by_id(id).await?.is_some() {
                    debug!(id, "Imported order id taken, assigning a new one");
                    order.id = None;
                }
            }
            let key = order.key();
            match self.orders.create_order(order).await {
                Ok(_) => result.record_success(),
                Err(e) => result.record_error(buho_core::RecordError::new(
                    index,
                    key.map(|id| id.to_string()),
                    e.record_kind(),
                    e.to_string(),
                )),
            }
        }

        info!(
            total,
            imported = result.success_count,
            rejected = result.errors.len(),
            "Orders imported from JSON"
        );
        Ok(result)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use buho_core::{OrderItem, OrderState};
    use chrono::{Duration, TimeZone};

    const PLATFORMS: [Platform; 2] = [Platform::Native, Platform::Embedded];

    async fn facade(platform: Platform) -> OrderStorageFacade {
        OrderStorageFacade::open(StoreConfig::new(DbConfig::in_memory()).with_platform(platform))
            .await
            .unwrap()
    }

    fn draft(customer_id: i64, name: &str) -> OrderDraft {
        OrderDraft::for_customer(Customer::new(customer_id, name))
            .with_item(OrderItem::new("A1", "Remera", 1, 1500))
    }

    #[tokio::test]
    async fn test_platform_selects_backend() {
        assert_eq!(facade(Platform::Native).await.active_backend(), BackendKind::Relational);
        assert_eq!(facade(Platform::Embedded).await.active_backend(), BackendKind::Document);
    }

    #[tokio::test]
    async fn test_capabilities_per_backend() {
        let document = facade(Platform::Embedded).await;
        assert!(document.storage().customer_index().is_some());
        assert!(document.storage().sample_data().is_some());

        let relational = facade(Platform::Native).await;
        assert!(relational.storage().customer_index().is_none());
        assert!(relational.storage().sample_data().is_none());
    }

    #[tokio::test]
    async fn test_orders_by_customer_on_both_paths() {
        for platform in PLATFORMS {
            let facade = facade(platform).await;
            facade.create_order_from_draft(draft(1, "Ana")).await.unwrap();
            facade.create_order_from_draft(draft(2, "Luis")).await.unwrap();
            facade.create_order_from_draft(draft(1, "Ana")).await.unwrap();

            let orders = facade.get_orders_by_customer_id(1).await.unwrap();
            assert_eq!(orders.len(), 2, "{platform:?}");
            assert!(orders.iter().all(|o| o.customer_id() == Some(1)));
        }
    }

    #[tokio::test]
    async fn test_state_lookup_and_name_search() {
        for platform in PLATFORMS {
            let facade = facade(platform).await;
            let mut invoiced = draft(1, "Ana");
            invoiced.state = Some(OrderState::Invoiced);
            facade.create_order_from_draft(invoiced).await.unwrap();
            facade.create_order_from_draft(draft(2, "Luis")).await.unwrap();

            let found = facade.get_orders_by_state(OrderState::Invoiced).await.unwrap();
            assert_eq!(found.len(), 1, "{platform:?}");
            let found = facade.search_orders_by_customer_name("LUI").await.unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(facade.search_orders("invoiced").await.unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_sample_data_loads_once() {
        let facade = facade(Platform::Embedded).await;
        let first = facade.load_sample_data().await.unwrap();
        assert_eq!(first.success_count, 3);

        let second = facade.load_sample_data().await.unwrap();
        assert_eq!(second.success_count, 0);
        assert_eq!(second.errors.len(), 3);
        assert_eq!(facade.count_orders().await.unwrap(), 3);

        let stats = facade.order_statistics().await.unwrap();
        assert_eq!((stats.pending, stats.invoiced, stats.cancelled), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_sample_data_unsupported_is_noop() {
        let facade = facade(Platform::Native).await;
        let result = facade.load_sample_data().await.unwrap();
        assert!(result.is_clean());
        assert_eq!(facade.count_orders().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_json_round_trip_reproduces_orders() {
        for platform in PLATFORMS {
            let source = facade(platform).await;
            source.create_order_from_draft(draft(1, "Ana")).await.unwrap();
            source.create_order_from_draft(draft(2, "Luis")).await.unwrap();
            let json = source.export_orders_to_json().await.unwrap();

            let target = facade(platform).await;
            let result = target.import_orders_from_json(&json).await.unwrap();
            assert!(result.is_clean(), "{platform:?}");
            assert_eq!(target.get_orders().await.unwrap(), source.get_orders().await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_import_assigns_new_id_on_collision() {
        for platform in PLATFORMS {
            let facade = facade(platform).await;
            let existing = facade.create_order_from_draft(draft(1, "Ana")).await.unwrap();
            let json = facade.export_orders_to_json().await.unwrap();

            let result = facade.import_orders_from_json(&json).await.unwrap();
            assert_eq!(result.success_count, 1, "{platform:?}");

            let orders = facade.get_orders().await.unwrap();
            assert_eq!(orders.len(), 2);
            assert_ne!(orders[0].id, orders[1].id);
            assert_eq!(orders[0].id, existing.id);
        }
    }

    #[tokio::test]
    async fn test_import_malformed_json_fails() {
        let facade = facade(Platform::Embedded).await;
        let err = facade.import_orders_from_json("[{").await.unwrap_err();
        assert!(matches!(err, DbError::InvalidJson(_)));
    }

    #[tokio::test]
    async fn test_filter_and_date_range() {
        let facade = facade(Platform::Embedded).await;
        let day = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        for offset in 0..3 {
            let order = draft(1, "Ana").into_order(day + Duration::days(offset));
            facade.create_order(order).await.unwrap();
        }

        let range = facade
            .get_orders_by_date_range(day, day + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(range.len(), 2);

        let page = facade
            .filter_orders(&OrderFilter {
                date_from: day.date_naive().succ_opt(),
                date_to: day.date_naive().succ_opt(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.pages, 1);
    }
}
