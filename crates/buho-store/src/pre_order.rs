//! # Pre-Order Overlay
//!
//! Pre-orders are regular orders tagged with `isPreOrder`, a `pre_<millis>`
//! temporary id, their creation time and a `needsSync` flag. They live in the
//! same order collection as everything else; the overlay only filters and
//! tags.
//!
//! ```text
//!   save(draft) ──► tagged order ──► OrderStorage::create_order
//!                                          │
//!   promote(id) ──► strip tags ──► create_order (new id)
//!                                          │
//!                                          └──► delete_order(id)
//!                                               fails? PromotionPartial
//! ```

use buho_core::{BasketOrder, BulkResult, OrderDraft, OrderState, RecordError, PRE_ORDER_TEMP_PREFIX};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::facade::OrderStorage;

const ENTITY: &str = "PreOrder";

/// Tagging, listing and promotion of pre-orders on top of an order backend.
pub struct PreOrderService {
    storage: Arc<dyn OrderStorage>,
    feed: watch::Sender<Vec<BasketOrder>>,
}

impl PreOrderService {
    pub fn new(storage: Arc<dyn OrderStorage>) -> Self {
        let (feed, _) = watch::channel(Vec::new());
        PreOrderService { storage, feed }
    }

    /// Stores `draft` as a new pre-order. The state defaults to `Draft`.
    pub async fn save(&self, mut draft: OrderDraft) -> DbResult<BasketOrder> {
        let now = Utc::now();
        draft.state.get_or_insert(OrderState::Draft);

        let mut order = draft.into_order(now);
        order.is_pre_order = true;
        order.temp_id = Some(format!("{PRE_ORDER_TEMP_PREFIX}{}", now.timestamp_millis()));
        order.created_at = Some(now);
        order.needs_sync = Some(false);

        let saved = self.storage.create_order(order).await?;
        debug!(id = ?saved.id, temp_id = ?saved.temp_id, "Pre-order saved");
        self.publish().await;
        Ok(saved)
    }

    /// Every pre-order, in storage order.
    pub async fn list(&self) -> DbResult<Vec<BasketOrder>> {
        Ok(self
            .storage
            .get_orders()
            .await?
            .into_iter()
            .filter(|o| o.is_pre_order)
            .collect())
    }

    /// `None` when the id is absent or belongs to a regular order.
    pub async fn get_pre_order_by_id(&self, id: i64) -> DbResult<Option<BasketOrder>> {
        Ok(self
            .storage
            .get_order_by_id(id)
            .await?
            .filter(|o| o.is_pre_order))
    }

    pub async fn update_pre_order(&self, mut order: BasketOrder) -> DbResult<BasketOrder> {
        order.is_pre_order = true;
        let updated = self.storage.update_order(order).await?;
        self.publish().await;
        Ok(updated)
    }

    pub async fn delete_pre_order(&self, id: i64) -> DbResult<()> {
        self.storage.delete_order(id).await?;
        self.publish().await;
        Ok(())
    }

    /// Flags a pre-order for upload.
    pub async fn mark_for_sync(&self, id: i64) -> DbResult<BasketOrder> {
        let mut order = self
            .get_pre_order_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found(ENTITY, id))?;
        order.needs_sync = Some(true);
        self.update_pre_order(order).await
    }

    /// Pre-orders flagged for upload.
    pub async fn pending_sync(&self) -> DbResult<Vec<BasketOrder>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|o| o.needs_sync == Some(true))
            .collect())
    }

    /// Deletes every pre-order; regular orders stay.
    pub async fn clear_all(&self) -> DbResult<()> {
        let ids: Vec<i64> = self.list().await?.iter().filter_map(BasketOrder::key).collect();
        for id in &ids {
            self.storage.delete_order(*id).await?;
        }
        info!(removed = ids.len(), "Pre-orders cleared");
        self.publish().await;
        Ok(())
    }

    /// Turns a pre-order into a regular order with a new id, then deletes the
    /// pre-order.
    ///
    /// If the new order is stored but the delete fails, both exist and
    /// [`DbError::PromotionPartial`] names both ids.
    pub async fn promote(&self, id: i64) -> DbResult<BasketOrder> {
        let mut order = self
            .get_pre_order_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found(ENTITY, id))?;
        order.strip_pre_order();
        order.id = None;

        let created = self.storage.create_order(order).await?;
        let order_id = created.id.unwrap_or_default();

        if let Err(e) = self.storage.delete_order(id).await {
            warn!(pre_order_id = id, order_id, error = %e, "Promoted pre-order not removed");
            self.publish().await;
            return Err(DbError::PromotionPartial {
                pre_order_id: id,
                order_id,
                message: e.to_string(),
            });
        }

        info!(pre_order_id = id, order_id, "Pre-order promoted");
        self.publish().await;
        Ok(created)
    }

    /// Pre-orders as a pretty-printed JSON array.
    pub async fn export_to_json(&self) -> DbResult<String> {
        Ok(serde_json::to_string_pretty(&self.list().await?)?)
    }

    /// Creates every pre-order in `json` whose id is not already stored.
    ///
    /// Malformed JSON fails the whole call. Skipped and failed records are
    /// reported by index; the rest continue.
    pub async fn import_from_json(&self, json: &str) -> DbResult<BulkResult> {
        let orders: Vec<BasketOrder> = serde_json::from_str(json)
            .map_err(|e| DbError::InvalidJson(format!("pre-order import: {e}")))?;

        let mut result = BulkResult::default();
        for (index, mut order) in orders.into_iter().enumerate() {
            let key = order.key();
            let exists = match key {
                Some(id) => self.storage.get_order_by_id(id).await?.is_some(),
                None => false,
            };
            let outcome = match key {
                Some(id) if exists => Err(DbError::duplicate("id", id)),
                _ => {
                    order.is_pre_order = true;
                    self.storage.create_order(order).await.map(|_| ())
                }
            };
            match outcome {
                Ok(()) => result.record_success(),
                Err(e) => {
                    debug!(index, error = %e, "Pre-order not imported");
                    result.record_error(RecordError::new(
                        index,
                        key.map(|id| id.to_string()),
                        e.record_kind(),
                        e.to_string(),
                    ));
                }
            }
        }

        self.publish().await;
        Ok(result)
    }

    /// Receiver holding the full pre-order list.
    pub async fn subscribe(&self) -> DbResult<watch::Receiver<Vec<BasketOrder>>> {
        let receiver = self.feed.subscribe();
        self.feed.send_replace(self.list().await?);
        Ok(receiver)
    }

    async fn publish(&self) {
        match self.list().await {
            Ok(pre_orders) => {
                self.feed.send_replace(pre_orders);
            }
            Err(e) => warn!(error = %e, "Could not republish pre-orders"),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
