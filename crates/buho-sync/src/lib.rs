//! # buho-sync: Remote Feeds and Import for Buho Orders
//!
//! Pulls the article catalog and the customer list from the back office
//! and loads them into the local stores.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Import Architecture                            │
//! │                                                                         │
//! │  ┌───────────────┐      ┌────────────────┐      ┌───────────────────┐  │
//! │  │  BuhoConfig   │─────►│   HttpFeed<R>  │─────►│   Importer<R>     │  │
//! │  │               │      │                │      │                   │  │
//! │  │ base URL      │      │ GET list/pages │      │ replace_from_feed │  │
//! │  │ page size     │      │ linear backoff │      │ import_paginated  │  │
//! │  │ retry policy  │      │ on 0/408/429/5xx│     │                   │  │
//! │  └───────────────┘      └────────────────┘      └─────────┬─────────┘  │
//! │                                                           │            │
//! │                                                           ▼            │
//! │                                        buho_store::RecordStore<R>      │
//! │                                        replace_all / clear /           │
//! │                                        save_multiple                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Feed and database configuration (TOML + environment)
//! - [`feed`] - `RemoteFeed` trait and the HTTP implementation
//! - [`import`] - `Importer` and `ImportReport`
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use buho_sync::{ArticleFeed, BuhoConfig, FeedResource, Importer};
//!
//! let config = BuhoConfig::load(None)?;
//! let storage = OrderStorageFacade::open(config.store_config()).await?;
//! let feed = Arc::new(ArticleFeed::new(&config.feed, FeedResource::ARTICLES)?);
//!
//! let report = Importer::new(storage.articles(), feed)
//!     .with_page_size(config.feed.page_size)
//!     .import_paginated()
//!     .await?;
//! ```

pub mod config;
pub mod error;
pub mod feed;
pub mod import;

pub use config::{BuhoConfig, DatabaseSettings, FeedSettings};
pub use error::{SyncError, SyncResult};
pub use feed::{
    ArticleFeed, CustomerFeed, FeedBatch, FeedPage, FeedResource, HttpFeed, LinearBackoff, RemoteFeed,
};
pub use import::{ImportReport, ImportStatus, Importer};
