//! # buho-store: Local Storage for Buho Orders
//!
//! On-device persistence for articles, customers and orders, with two
//! interchangeable SQLite engines behind one set of traits.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Buho Orders Data Flow                            │
//! │                                                                         │
//! │  buho-sync Importer / app screens                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    buho-store (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   OrderStorageFacade ──► dyn OrderStorage  (one backend)        │   │
//! │  │        │                  ├── CustomerIndexedLookup?            │   │
//! │  │        │                  └── SampleDataSeeding?                │   │
//! │  │        ├── articles() ──► dyn RecordStore<Article>              │   │
//! │  │        └── clients()  ──► dyn RecordStore<Customer>             │   │
//! │  │                                                                 │   │
//! │  │   PreOrderService ──► dyn OrderStorage                          │   │
//! │  │                                                                 │   │
//! │  │   TableStore<R, DocumentTable | RelationalTable>                │   │
//! │  │        │                                                        │   │
//! │  │   ConnectionManager (lazy pool, schema upgrade, recovery)       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   SQLite: documents (key, doc JSON) | relational tables          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Pool creation and configuration
//! - [`connection`] - Connection manager and health checks
//! - [`schema`] / [`migrations`] - Schema versioning per engine
//! - [`store`] - Record stores for both engines
//! - [`facade`] - Unified order storage and backend selection
//! - [`pre_order`] - Pre-order overlay
//! - [`error`] - Storage error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use buho_store::{DbConfig, OrderStorageFacade, StoreConfig};
//!
//! let storage = OrderStorageFacade::open(StoreConfig::new(DbConfig::new("buho.db"))).await?;
//! let order = storage.create_order_from_draft(draft).await?;
//! let pending = storage.get_orders_by_state(OrderState::Pending).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod connection;
pub mod error;
pub mod facade;
pub mod ids;
pub mod migrations;
pub mod pool;
pub mod pre_order;
pub mod sample;
pub mod schema;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use connection::{ConnectionManager, DatabaseHealth, StoreHealth};
pub use error::{DbError, DbResult};
pub use facade::{
    BackendKind, CustomerIndexedLookup, OrderStorage, OrderStorageFacade, Platform,
    SampleDataSeeding, StoreConfig,
};
pub use pool::DbConfig;
pub use pre_order::PreOrderService;
pub use schema::Engine;

// Store re-exports for convenience
pub use store::{
    ClientLookup, DocumentStore, Record, RecordStore, SearchableStore, SqlArticleStore,
    SqlClientStore, SqlOrderStore,
};
