//! # buho-core: Pure Domain Model for Buho Orders
//!
//! This crate holds the records the rest of the workspace persists and moves
//! around: articles, customers, basket orders and the bulk outcome types.
//! It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Buho Orders Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  buho-sync (Remote Feed + Import)               │   │
//! │  │        HttpFeed ──► Importer ──► replace_all / save_multiple    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  buho-store (Local Persistence)                 │   │
//! │  │   ConnectionManager, RecordStore, OrderStorageFacade, PreOrder  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ buho-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   order   │  │   bulk    │  │ validation│  │   │
//! │  │   │  Article  │  │BasketOrder│  │BulkResult │  │   rules   │  │   │
//! │  │   │ Customer  │  │OrderState │  │RecordError│  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Catalog and customer records (Article, Customer, references)
//! - [`order`] - BasketOrder, OrderState, OrderDraft, OrderFilter
//! - [`bulk`] - BulkResult and RecordError for best-effort batch operations
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Per-record validation rules
//!
//! ## Example Usage
//!
//! ```rust
//! use buho_core::order::OrderState;
//!
//! // Legacy spellings collapse to one canonical state
//! let state: OrderState = "en-proceso".parse().unwrap();
//! assert_eq!(state, OrderState::InProcess);
//! assert_eq!(state.as_str(), "InProcess");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod bulk;
pub mod error;
pub mod money;
pub mod order;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use bulk::{BulkResult, RecordError, RecordErrorKind};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use order::{
    BasketOrder, DeliveryAddress, OrderDraft, OrderFilter, OrderItem, OrderPage, OrderState,
    OrderStats, OrderUser,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Tax situation assigned to customers the source system leaves blank.
pub const DEFAULT_IVA_SITUATION: &str = "CONSUMIDOR_FINAL";

/// Price list assigned to customers the source system leaves blank.
pub const DEFAULT_LIST_PRICE: i64 = 1;

/// Orders per page when filtering through the façade.
pub const ORDER_PAGE_SIZE: usize = 25;

/// Prefix of pre-order temporary ids (`pre_<millis>`).
pub const PRE_ORDER_TEMP_PREFIX: &str = "pre_";
