//! # Domain Types
//!
//! Catalog and customer records synchronized from the remote service and
//! persisted on-device.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Article      │   │    Customer     │   │   CatalogRef    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  sku (key)      │   │  id (key)       │   │  id             │       │
//! │  │  name           │   │  dni            │   │  name           │       │
//! │  │  unitPrice1..5  │   │  listPrice      │   └─────────────────┘       │
//! │  │  department ────┼──►│  branch ────────┼──► BranchRef               │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Records serialize as camelCase JSON. That is the shape the remote feed
//! sends, the shape the document engine stores, and the shape exported to
//! the frontend through the generated TypeScript bindings.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::{DEFAULT_IVA_SITUATION, DEFAULT_LIST_PRICE};

// =============================================================================
// References
// =============================================================================

/// Denormalized `{id, name}` reference (department, supplier, brand).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
}

impl CatalogRef {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
        }
    }
}

/// Branch (store location) reference carried by customers and orders.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BranchRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
}

impl BranchRef {
    pub fn new(id: i64, business_name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            business_name: Some(business_name.into()),
        }
    }
}

// =============================================================================
// Article
// =============================================================================

/// A sellable catalog article, keyed by SKU.
///
/// Every field except `sku` has a serde default so that sparse feed records
/// still deserialize; missing keys are caught by validation, per record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Stock Keeping Unit - primary key.
    #[serde(default)]
    pub sku: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Price lists 1 to 5, in cents.
    #[serde(default)]
    pub unit_price1: i64,
    #[serde(default)]
    pub unit_price2: i64,
    #[serde(default)]
    pub unit_price3: i64,
    #[serde(default)]
    pub unit_price4: i64,
    #[serde(default)]
    pub unit_price5: i64,

    #[serde(default)]
    pub unit_in_stock: i64,

    #[serde(default)]
    pub sizes: Vec<String>,

    #[serde(default)]
    pub designs: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<CatalogRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<CatalogRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<CatalogRef>,

    #[serde(default)]
    pub tax_code1: i64,
}

impl Article {
    pub fn new(sku: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Price for a customer's price list (1-5). Out-of-range lists fall back
    /// to list 1.
    pub fn price_for_list(&self, list_price: i64) -> Money {
        let cents = match list_price {
            2 => self.unit_price2,
            3 => self.unit_price3,
            4 => self.unit_price4,
            5 => self.unit_price5,
            _ => self.unit_price1,
        };
        Money::from_cents(cents)
    }

    /// Case-insensitive substring match on name, SKU and description.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&term)
            || self.sku.to_lowercase().contains(&term)
            || self.description.to_lowercase().contains(&term)
    }
}

// =============================================================================
// Customer
// =============================================================================

fn default_list_price() -> i64 {
    DEFAULT_LIST_PRICE
}

fn default_iva_situation() -> String {
    DEFAULT_IVA_SITUATION.to_string()
}

fn default_enabled() -> bool {
    true
}

/// A customer as assigned by the source system.
///
/// `id` is optional on the wire; a record without one is rejected by
/// validation, never by deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Tax identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dni: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cellphone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Pricing tier (selects `Article::unit_priceN`).
    #[serde(default = "default_list_price")]
    pub list_price: i64,

    #[serde(default = "default_iva_situation")]
    pub iva_situation: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchRef>,

    /// Running balance in favor of the customer, in cents.
    #[serde(default)]
    pub saldo_favor: i64,

    #[serde(default)]
    pub total_reward_points: i64,

    #[serde(default)]
    pub checking_account_enabled: bool,

    /// Checking account limit, in cents.
    #[serde(default)]
    pub cta_cte_limit_amount: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    #[serde(default)]
    pub status: String,

    /// ISO date as sent by the source system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday_date: Option<String>,
}

impl Default for Customer {
    fn default() -> Self {
        Self {
            id: None,
            dni: None,
            name: None,
            last_name: None,
            email: None,
            cellphone: None,
            alternative_phone: None,
            address: None,
            zip_code: None,
            city: None,
            district: None,
            state: None,
            list_price: DEFAULT_LIST_PRICE,
            iva_situation: DEFAULT_IVA_SITUATION.to_string(),
            enabled: true,
            branch: None,
            saldo_favor: 0,
            total_reward_points: 0,
            checking_account_enabled: false,
            cta_cte_limit_amount: 0,
            customer_type: None,
            observation: None,
            status: String::new(),
            birthday_date: None,
        }
    }
}

impl Customer {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// "Name LastName", skipping blank parts.
    pub fn display_name(&self) -> String {
        [self.name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Case-insensitive substring match on full name and DNI.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.display_name().to_lowercase().contains(&term)
            || self
                .dni
                .as_deref()
                .is_some_and(|dni| dni.to_lowercase().contains(&term))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
