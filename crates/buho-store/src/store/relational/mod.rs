//! # Relational Engine
//!
//! Records mapped onto the normalized tables created by the migrations.
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐   1    * ┌─────────────┐
//! │  articles    │    │  clients     │    │  orders      │─────────►│ order_items │
//! │  sku UNIQUE  │    │  id UNIQUE   │    │  id UNIQUE   │ cascade  │ order_id FK │
//! └──────────────┘    └──────────────┘    └──────────────┘          └─────────────┘
//! ```
//!
//! Nested references are flattened into `<ref>_id` / `<ref>_name` columns
//! and rebuilt on read. Array fields are stored as JSON text.

mod articles;
mod clients;
mod orders;

use buho_core::{Article, BasketOrder, BranchRef, CatalogRef, Customer};
use std::marker::PhantomData;

use super::TableStore;

/// [`RecordTable`](super::RecordTable) over the relational tables of `R`.
pub struct RelationalTable<R> {
    _record: PhantomData<fn() -> R>,
}

impl<R> Default for RelationalTable<R> {
    fn default() -> Self {
        RelationalTable {
            _record: PhantomData,
        }
    }
}

pub type SqlArticleStore = TableStore<Article, RelationalTable<Article>>;
pub type SqlClientStore = TableStore<Customer, RelationalTable<Customer>>;
pub type SqlOrderStore = TableStore<BasketOrder, RelationalTable<BasketOrder>>;

/// Rebuilds a flattened reference; absent when both columns are NULL.
fn catalog_ref(id: Option<i64>, name: Option<String>) -> Option<CatalogRef> {
    match (id, name) {
        (None, None) => None,
        (id, name) => Some(CatalogRef {
            id,
            name: name.unwrap_or_default(),
        }),
    }
}

fn flatten_ref(reference: Option<&CatalogRef>) -> (Option<i64>, Option<String>) {
    reference.map_or((None, None), |r| (r.id, Some(r.name.clone())))
}

fn branch_ref(id: Option<i64>, business_name: Option<String>) -> Option<BranchRef> {
    match (id, business_name) {
        (None, None) => None,
        (id, business_name) => Some(BranchRef { id, business_name }),
    }
}
