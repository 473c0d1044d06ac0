//! # Orders
//!
//! The basket order record, its canonical lifecycle state, and the pure
//! helpers built on top (drafts, filtering, statistics).
//!
//! ## Order Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BasketOrder                                                            │
//! │  ├── id, index, type, open, state, operator                            │
//! │  ├── user ─────────────► OrderUser { id, userName }                    │
//! │  ├── customer ─────────► Customer (snapshot at order time)             │
//! │  ├── customerDelivery ─► DeliveryAddress (snapshot)                    │
//! │  ├── items[] ──────────► OrderItem { sku, name, qty, unitPrice, ... }  │
//! │  ├── totalAmount, deliveryAmount (cents)                               │
//! │  ├── branch ───────────► BranchRef                                     │
//! │  └── isPreOrder, tempId, createdAt, needsSync (pre-order overlay)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## State Canonicalization
//! Orders arrive with a mix of English and Spanish state spellings. Every
//! spelling is folded into [`OrderState`] on the way in; the canonical name
//! is the only thing ever written back out.
//!
//! ```text
//! "pending" / "pendiente"                 ──► Pending
//! "en-proceso"                            ──► InProcess
//! "cancelled" / "Canceled" / "cancelado"  ──► Cancelled
//! "completado"                            ──► Completed
//! ```

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::CoreError;
use crate::money::Money;
use crate::types::{BranchRef, Customer};
use crate::ORDER_PAGE_SIZE;

// =============================================================================
// Order State
// =============================================================================

/// Canonical order lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum OrderState {
    Open,
    Closed,
    Draft,
    #[default]
    Pending,
    InProcess,
    Approved,
    Invoiced,
    Delivered,
    Cancelled,
    Completed,
}

impl OrderState {
    pub const ALL: [OrderState; 10] = [
        OrderState::Open,
        OrderState::Closed,
        OrderState::Draft,
        OrderState::Pending,
        OrderState::InProcess,
        OrderState::Approved,
        OrderState::Invoiced,
        OrderState::Delivered,
        OrderState::Cancelled,
        OrderState::Completed,
    ];

    /// Canonical stored name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderState::Open => "Open",
            OrderState::Closed => "Closed",
            OrderState::Draft => "Draft",
            OrderState::Pending => "Pending",
            OrderState::InProcess => "InProcess",
            OrderState::Approved => "Approved",
            OrderState::Invoiced => "Invoiced",
            OrderState::Delivered => "Delivered",
            OrderState::Cancelled => "Cancelled",
            OrderState::Completed => "Completed",
        }
    }

    /// Spanish label shown in the order list.
    pub const fn label(&self) -> &'static str {
        match self {
            OrderState::Open => "Abierto",
            OrderState::Closed => "Cerrado",
            OrderState::Draft => "Borrador",
            OrderState::Pending => "Pendiente",
            OrderState::InProcess => "En Proceso",
            OrderState::Approved => "Aprobado",
            OrderState::Invoiced => "Facturado",
            OrderState::Delivered => "Entregado",
            OrderState::Cancelled => "Cancelado",
            OrderState::Completed => "Completado",
        }
    }
}

impl FromStr for OrderState {
    type Err = CoreError;

    /// Accepts canonical names case-insensitively plus the legacy aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let state = match normalized.as_str() {
            "open" | "abierto" => OrderState::Open,
            "closed" | "cerrado" => OrderState::Closed,
            "draft" | "borrador" => OrderState::Draft,
            "pending" | "pendiente" => OrderState::Pending,
            "inprocess" | "in-process" | "in_process" | "en-proceso" => OrderState::InProcess,
            "approved" | "aprobado" => OrderState::Approved,
            "invoiced" | "facturado" => OrderState::Invoiced,
            "delivered" | "entregado" => OrderState::Delivered,
            "cancelled" | "canceled" | "cancelado" => OrderState::Cancelled,
            "completed" | "completado" => OrderState::Completed,
            _ => return Err(CoreError::UnknownOrderState(s.to_string())),
        };
        Ok(state)
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OrderState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OrderState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Snapshots
// =============================================================================

/// Operator who took the order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub user_name: String,
}

impl OrderUser {
    pub fn new(id: i64, user_name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            user_name: user_name.into(),
        }
    }
}

/// Delivery address as captured when the order was taken.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cellphone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl DeliveryAddress {
    /// Home delivery means a non-blank address was captured.
    pub fn is_home_delivery(&self) -> bool {
        self.address.as_deref().is_some_and(|a| !a.trim().is_empty())
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line in an order. Article data is frozen at order time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub article_sku: String,
    #[serde(default)]
    pub article_name: String,
    #[serde(default)]
    pub article_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design: Option<String>,
    pub quantity: i64,
    /// Unit price in cents.
    pub unit_price: i64,
}

impl OrderItem {
    pub fn new(sku: impl Into<String>, name: impl Into<String>, quantity: i64, unit_price: i64) -> Self {
        Self {
            article_sku: sku.into(),
            article_name: name.into(),
            quantity,
            unit_price,
            ..Default::default()
        }
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Basket Order
// =============================================================================

fn default_order_type() -> String {
    "Normal".to_string()
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A customer order.
///
/// The trailing pre-order fields are only present on orders created through
/// the pre-order overlay; regular orders serialize without them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BasketOrder {
    /// Server-assigned or locally generated. `None` (or a non-positive value
    /// from legacy payloads) means "assign one on create".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    #[serde(default)]
    pub index: i64,

    #[serde(rename = "type", default = "default_order_type")]
    pub order_type: String,

    #[serde(default = "Utc::now")]
    #[ts(as = "String")]
    pub open: DateTime<Utc>,

    #[serde(default)]
    pub state: OrderState,

    #[serde(default)]
    pub operator: String,

    #[serde(default)]
    pub user: OrderUser,

    #[serde(default)]
    pub customer: Customer,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_delivery: Option<DeliveryAddress>,

    #[serde(default)]
    pub items: Vec<OrderItem>,

    /// Cents.
    #[serde(default)]
    pub total_amount: i64,

    /// Cents.
    #[serde(default)]
    pub delivery_amount: i64,

    #[serde(default)]
    pub branch: BranchRef,

    #[serde(default)]
    pub send: String,
    #[serde(default)]
    pub payment: String,
    #[serde(default)]
    pub payment_status: String,
    #[serde(default)]
    pub observation: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_pre_order: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(as = "Option<String>")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_sync: Option<bool>,
}

impl BasketOrder {
    /// The id if it is usable as a key.
    pub fn key(&self) -> Option<i64> {
        self.id.filter(|id| *id > 0)
    }

    pub fn customer_id(&self) -> Option<i64> {
        self.customer.id
    }

    /// Sum of line totals.
    pub fn items_total(&self) -> Money {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    /// Order total plus delivery.
    pub fn grand_total(&self) -> Money {
        Money::from_cents(self.total_amount) + Money::from_cents(self.delivery_amount)
    }

    /// Case-insensitive match on customer name and last name.
    pub fn matches_customer_name(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        let name = self.customer.name.as_deref().unwrap_or_default().to_lowercase();
        let last_name = self
            .customer
            .last_name
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        name.contains(&term) || last_name.contains(&term)
    }

    /// Free-text match across id, customer contact data, state and branch.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        let contains = |field: Option<&str>| {
            field.is_some_and(|value| value.to_lowercase().contains(&term))
        };
        self.id.is_some_and(|id| id.to_string().contains(&term))
            || self.matches_customer_name(&term)
            || contains(self.customer.email.as_deref())
            || contains(self.customer.cellphone.as_deref())
            || self.state.as_str().to_lowercase().contains(&term)
            || contains(self.branch.business_name.as_deref())
    }

    /// Removes the pre-order overlay fields.
    pub fn strip_pre_order(&mut self) {
        self.is_pre_order = false;
        self.temp_id = None;
        self.created_at = None;
        self.needs_sync = None;
    }
}

// =============================================================================
// Order Draft
// =============================================================================

/// A partially filled order, as produced by the order-entry screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub order_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<OrderState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<OrderUser>,
    #[serde(default)]
    pub customer: Customer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_delivery: Option<DeliveryAddress>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
}

impl OrderDraft {
    pub fn for_customer(customer: Customer) -> Self {
        Self {
            customer,
            ..Default::default()
        }
    }

    pub fn with_item(mut self, item: OrderItem) -> Self {
        self.items.push(item);
        self
    }

    /// Fills the defaults used by direct order creation. The id is left
    /// unset so the store assigns one.
    ///
    /// When no total is given, the items total is used.
    pub fn into_order(self, now: DateTime<Utc>) -> BasketOrder {
        let total_amount = self
            .total_amount
            .unwrap_or_else(|| self.items.iter().map(OrderItem::line_total).sum::<Money>().cents());

        BasketOrder {
            id: None,
            index: 0,
            order_type: self.order_type.unwrap_or_else(default_order_type),
            open: now,
            state: self.state.unwrap_or(OrderState::Pending),
            operator: self.operator.unwrap_or_else(|| "system".to_string()),
            user: self.user.unwrap_or_else(|| OrderUser::new(1, "system")),
            customer: self.customer,
            customer_delivery: self.customer_delivery,
            items: self.items,
            total_amount,
            delivery_amount: self.delivery_amount.unwrap_or(0),
            branch: self.branch.unwrap_or_else(|| BranchRef::new(1, "Default")),
            send: self.send.unwrap_or_default(),
            payment: self.payment.unwrap_or_default(),
            payment_status: self.payment_status.unwrap_or_default(),
            observation: self.observation.unwrap_or_default(),
            is_pre_order: false,
            temp_id: None,
            created_at: None,
            needs_sync: None,
        }
    }
}

// =============================================================================
// Filtering
// =============================================================================

/// Branch id the order list uses to mean "every branch".
pub const ALL_BRANCHES: i64 = 9_999_999;

/// Order list filter. Every criterion is optional; `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    #[serde(default)]
    pub state: Option<OrderState>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub basket_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub branch: Option<i64>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub date_from: Option<NaiveDate>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub date_to: Option<NaiveDate>,
    #[serde(default = "first_page")]
    pub page: usize,
}

fn first_page() -> usize {
    1
}

impl Default for OrderFilter {
    fn default() -> Self {
        Self {
            state: None,
            customer_name: None,
            basket_id: None,
            user_id: None,
            branch: None,
            date_from: None,
            date_to: None,
            page: 1,
        }
    }
}

/// One page of filtered orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub rows: Vec<BasketOrder>,
    /// Total number of pages for the filtered set.
    pub pages: usize,
}

impl OrderFilter {
    pub fn matches(&self, order: &BasketOrder) -> bool {
        if self.state.is_some_and(|state| order.state != state) {
            return false;
        }
        if let Some(name) = self.customer_name.as_deref() {
            if !name.is_empty() && !order.matches_customer_name(name) {
                return false;
            }
        }
        if self.basket_id.is_some_and(|id| order.id != Some(id)) {
            return false;
        }
        if self.user_id.is_some_and(|id| order.user.id != Some(id)) {
            return false;
        }
        if let Some(branch) = self.branch.filter(|b| *b != ALL_BRANCHES) {
            if order.branch.id != Some(branch) {
                return false;
            }
        }
        // Date range applies only when both ends are set; the end day is inclusive.
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            let start = Utc.from_utc_datetime(&from.and_time(NaiveTime::MIN));
            if order.open < start {
                return false;
            }
            if let Some(next_day) = to.succ_opt() {
                if order.open >= Utc.from_utc_datetime(&next_day.and_time(NaiveTime::MIN)) {
                    return false;
                }
            }
        }
        true
    }

    /// Filters, then slices out `page` using [`ORDER_PAGE_SIZE`].
    pub fn apply(&self, orders: Vec<BasketOrder>) -> OrderPage {
        let filtered: Vec<BasketOrder> = orders.into_iter().filter(|o| self.matches(o)).collect();
        let pages = filtered.len().div_ceil(ORDER_PAGE_SIZE);
        let start = self.page.saturating_sub(1) * ORDER_PAGE_SIZE;
        let rows = filtered
            .into_iter()
            .skip(start)
            .take(ORDER_PAGE_SIZE)
            .collect();
        OrderPage { rows, pages }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Order counts per headline state plus the summed total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total: usize,
    pub pending: usize,
    pub invoiced: usize,
    pub cancelled: usize,
    pub total_amount: Money,
}

impl OrderStats {
    pub fn from_orders(orders: &[BasketOrder]) -> Self {
        orders.iter().fold(
            OrderStats {
                total: orders.len(),
                ..Default::default()
            },
            |mut stats, order| {
                match order.state {
                    OrderState::Pending => stats.pending += 1,
                    OrderState::Invoiced => stats.invoiced += 1,
                    OrderState::Cancelled => stats.cancelled += 1,
                    _ => {}
                }
                stats.total_amount += Money::from_cents(order.total_amount);
                stats
            },
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn order_for(name: &str, state: OrderState) -> BasketOrder {
        let mut order = OrderDraft::for_customer(Customer::new(1, name)).into_order(Utc::now());
        order.state = state;
        order
    }

    #[test]
    fn test_legacy_state_spellings() {
        let cases = [
            ("pending", OrderState::Pending),
            ("pendiente", OrderState::Pending),
            ("en-proceso", OrderState::InProcess),
            ("cancelled", OrderState::Cancelled),
            ("Canceled", OrderState::Cancelled),
            ("cancelado", OrderState::Cancelled),
            ("completado", OrderState::Completed),
            ("Invoiced", OrderState::Invoiced),
        ];
        for (raw, expected) in cases {
            assert_eq!(raw.parse::<OrderState>().unwrap(), expected, "{raw}");
        }
        assert!("shipped".parse::<OrderState>().is_err());
    }

    #[test]
    fn test_state_serializes_canonical_name() {
        let state: OrderState = serde_json::from_str("\"en-proceso\"").unwrap();
        assert_eq!(serde_json::to_string(&state).unwrap(), "\"InProcess\"");
        for state in OrderState::ALL {
            assert_eq!(state.as_str().parse::<OrderState>().unwrap(), state);
        }
    }

    #[test]
    fn test_draft_defaults() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let order = OrderDraft::default()
            .with_item(OrderItem::new("A1", "Remera", 2, 1500))
            .into_order(now);

        assert_eq!(order.id, None);
        assert_eq!(order.order_type, "Normal");
        assert_eq!(order.state, OrderState::Pending);
        assert_eq!(order.operator, "system");
        assert_eq!(order.branch, BranchRef::new(1, "Default"));
        assert_eq!(order.user, OrderUser::new(1, "system"));
        assert_eq!(order.total_amount, 3000);
        assert_eq!(order.open, now);
    }

    #[test]
    fn test_regular_order_has_no_pre_order_fields() {
        let order = order_for("Ana", OrderState::Pending);
        let json = serde_json::to_value(&order).unwrap();
        assert!(json.get("isPreOrder").is_none());
        assert!(json.get("tempId").is_none());
        assert_eq!(json["type"], "Normal");
    }

    #[test]
    fn test_legacy_zero_id_is_not_a_key() {
        let order: BasketOrder = serde_json::from_str(r#"{"id": 0, "state": "pendiente"}"#).unwrap();
        assert_eq!(order.key(), None);
        assert_eq!(order.state, OrderState::Pending);
    }

    #[test]
    fn test_filter_pagination() {
        let orders: Vec<_> = (0..30).map(|_| order_for("Ana", OrderState::Pending)).collect();

        let first = OrderFilter::default().apply(orders.clone());
        assert_eq!(first.pages, 2);
        assert_eq!(first.rows.len(), 25);

        let second = OrderFilter {
            page: 2,
            ..Default::default()
        }
        .apply(orders);
        assert_eq!(second.rows.len(), 5);
    }

    #[test]
    fn test_filter_criteria() {
        let mut ana = order_for("Ana", OrderState::Invoiced);
        ana.open = Utc.with_ymd_and_hms(2024, 3, 10, 23, 30, 0).unwrap();
        let luis = order_for("Luis", OrderState::Pending);

        let by_state = OrderFilter {
            state: Some(OrderState::Invoiced),
            ..Default::default()
        };
        assert!(by_state.matches(&ana));
        assert!(!by_state.matches(&luis));

        let by_name = OrderFilter {
            customer_name: Some("LU".to_string()),
            ..Default::default()
        };
        assert!(by_name.matches(&luis));

        let by_day = OrderFilter {
            date_from: NaiveDate::from_ymd_opt(2024, 3, 10),
            date_to: NaiveDate::from_ymd_opt(2024, 3, 10),
            ..Default::default()
        };
        assert!(by_day.matches(&ana));

        let all_branches = OrderFilter {
            branch: Some(ALL_BRANCHES),
            ..Default::default()
        };
        assert!(all_branches.matches(&ana));
    }

    #[test]
    fn test_stats() {
        let mut orders = vec![
            order_for("a", OrderState::Pending),
            order_for("b", OrderState::Invoiced),
            order_for("c", OrderState::Cancelled),
        ];
        orders[0].total_amount = 1000;
        orders[1].total_amount = 2500;

        let stats = OrderStats::from_orders(&orders);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.invoiced, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.total_amount.cents(), 3500);
    }
}
