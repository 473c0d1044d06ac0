use async_trait::async_trait;
use buho_core::{BasketOrder, DeliveryAddress, OrderItem, OrderState, OrderUser};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::FromRow;
use std::collections::HashMap;

use super::{branch_ref, RelationalTable};
use crate::error::{DbError, DbResult};
use crate::store::{RecordTable, SqlOrderStore};

const COLUMNS: &str = "id, index_order, type, open_date, state, operator, user_id, user_name, \
    customer_id, customer_name, customer_last_name, customer_snapshot, \
    delivery_id, delivery_name, delivery_last_name, delivery_email, delivery_phone, \
    delivery_address, delivery_city, delivery_zip_code, delivery_state, has_delivery, \
    total_amount, delivery_amount, branch_id, branch_name, send, payment, payment_status, \
    observation, is_pre_order, temp_id, created_at, needs_sync";

const ITEM_COLUMNS: &str = "order_id, article_sku, article_name, article_description, size, \
    design, quantity, unit_price";

#[derive(Debug, FromRow)]
struct OrderRow {
    id: i64,
    index_order: i64,
    #[sqlx(rename = "type")]
    order_type: String,
    open_date: DateTime<Utc>,
    state: OrderState,
    operator: String,
    user_id: Option<i64>,
    user_name: String,
    customer_snapshot: String,
    delivery_id: Option<i64>,
    delivery_name: Option<String>,
    delivery_last_name: Option<String>,
    delivery_email: Option<String>,
    delivery_phone: Option<String>,
    delivery_address: Option<String>,
    delivery_city: Option<String>,
    delivery_zip_code: Option<String>,
    delivery_state: Option<String>,
    has_delivery: bool,
    total_amount: i64,
    delivery_amount: i64,
    branch_id: Option<i64>,
    branch_name: Option<String>,
    send: String,
    payment: String,
    payment_status: String,
    observation: String,
    is_pre_order: bool,
    temp_id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    needs_sync: Option<bool>,
}

#[derive(Debug, FromRow)]
struct ItemRow {
    order_id: i64,
    article_sku: String,
    article_name: String,
    article_description: String,
    size: Option<String>,
    design: Option<String>,
    quantity: i64,
    unit_price: i64,
}

impl From<ItemRow> for OrderItem {
    fn from(row: ItemRow) -> Self {
        OrderItem {
            article_sku: row.article_sku,
            article_name: row.article_name,
            article_description: row.article_description,
            size: row.size,
            design: row.design,
            quantity: row.quantity,
            unit_price: row.unit_price,
        }
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> DbResult<BasketOrder> {
        let customer_delivery = self.has_delivery.then(|| DeliveryAddress {
            id: self.delivery_id,
            name: self.delivery_name,
            last_name: self.delivery_last_name,
            email: self.delivery_email,
            cellphone: self.delivery_phone,
            address: self.delivery_address,
            city: self.delivery_city,
            zip_code: self.delivery_zip_code,
            state: self.delivery_state,
        });

        Ok(BasketOrder {
            id: Some(self.id),
            index: self.index_order,
            order_type: self.order_type,
            open: self.open_date,
            state: self.state,
            operator: self.operator,
            user: OrderUser {
                id: self.user_id,
                user_name: self.user_name,
            },
            customer: serde_json::from_str(&self.customer_snapshot)?,
            customer_delivery,
            items,
            total_amount: self.total_amount,
            delivery_amount: self.delivery_amount,
            branch: branch_ref(self.branch_id, self.branch_name).unwrap_or_default(),
            send: self.send,
            payment: self.payment,
            payment_status: self.payment_status,
            observation: self.observation,
            is_pre_order: self.is_pre_order,
            temp_id: self.temp_id,
            created_at: self.created_at,
            needs_sync: self.needs_sync,
        })
    }
}

fn order_id(order: &BasketOrder) -> DbResult<i64> {
    order
        .key()
        .ok_or_else(|| DbError::from(buho_core::ValidationError::required("id")))
}

async fn insert_items(conn: &mut SqliteConnection, id: i64, items: &[OrderItem]) -> DbResult<()> {
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items (
                order_id, position, article_sku, article_name, article_description,
                size, design, quantity, unit_price, subtotal
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(position as i64)
        .bind(&item.article_sku)
        .bind(&item.article_name)
        .bind(&item.article_description)
        .bind(&item.size)
        .bind(&item.design)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.line_total().cents())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl RecordTable<BasketOrder> for RelationalTable<BasketOrder> {
    fn table_name(&self) -> &'static str {
        "orders"
    }

    fn key_column(&self) -> &'static str {
        "id"
    }

    async fn insert(&self, conn: &mut SqliteConnection, o: &BasketOrder) -> DbResult<()> {
        let id = order_id(o)?;
        let delivery = o.customer_delivery.clone().unwrap_or_default();

        sqlx::query(&format!(
            "INSERT INTO orders ({COLUMNS}) VALUES (\
             ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, \
             ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(id)
        .bind(o.index)
        .bind(&o.order_type)
        .bind(o.open)
        .bind(o.state)
        .bind(&o.operator)
        .bind(o.user.id)
        .bind(&o.user.user_name)
        .bind(o.customer.id)
        .bind(&o.customer.name)
        .bind(&o.customer.last_name)
        .bind(serde_json::to_string(&o.customer)?)
        .bind(delivery.id)
        .bind(delivery.name)
        .bind(delivery.last_name)
        .bind(delivery.email)
        .bind(delivery.cellphone)
        .bind(delivery.address)
        .bind(delivery.city)
        .bind(delivery.zip_code)
        .bind(delivery.state)
        .bind(o.customer_delivery.is_some())
        .bind(o.total_amount)
        .bind(o.delivery_amount)
        .bind(o.branch.id)
        .bind(&o.branch.business_name)
        .bind(&o.send)
        .bind(&o.payment)
        .bind(&o.payment_status)
        .bind(&o.observation)
        .bind(o.is_pre_order)
        .bind(&o.temp_id)
        .bind(o.created_at)
        .bind(o.needs_sync)
        .execute(&mut *conn)
        .await?;

        insert_items(conn, id, &o.items).await
    }

    async fn update(&self, conn: &mut SqliteConnection, o: &BasketOrder) -> DbResult<u64> {
        let id = order_id(o)?;
        let delivery = o.customer_delivery.clone().unwrap_or_default();

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                index_order = ?, type = ?, open_date = ?, state = ?, operator = ?,
                user_id = ?, user_name = ?,
                customer_id = ?, customer_name = ?, customer_last_name = ?, customer_snapshot = ?,
                delivery_id = ?, delivery_name = ?, delivery_last_name = ?, delivery_email = ?,
                delivery_phone = ?, delivery_address = ?, delivery_city = ?,
                delivery_zip_code = ?, delivery_state = ?, has_delivery = ?,
                total_amount = ?, delivery_amount = ?, branch_id = ?, branch_name = ?,
                send = ?, payment = ?, payment_status = ?, observation = ?,
                is_pre_order = ?, temp_id = ?, created_at = ?, needs_sync = ?
            WHERE id = ?
            "#,
        )
        .bind(o.index)
        .bind(&o.order_type)
        .bind(o.open)
        .bind(o.state)
        .bind(&o.operator)
        .bind(o.user.id)
        .bind(&o.user.user_name)
        .bind(o.customer.id)
        .bind(&o.customer.name)
        .bind(&o.customer.last_name)
        .bind(serde_json::to_string(&o.customer)?)
        .bind(delivery.id)
        .bind(delivery.name)
        .bind(delivery.last_name)
        .bind(delivery.email)
        .bind(delivery.cellphone)
        .bind(delivery.address)
        .bind(delivery.city)
        .bind(delivery.zip_code)
        .bind(delivery.state)
        .bind(o.customer_delivery.is_some())
        .bind(o.total_amount)
        .bind(o.delivery_amount)
        .bind(o.branch.id)
        .bind(&o.branch.business_name)
        .bind(&o.send)
        .bind(&o.payment)
        .bind(&o.payment_status)
        .bind(&o.observation)
        .bind(o.is_pre_order)
        .bind(&o.temp_id)
        .bind(o.created_at)
        .bind(o.needs_sync)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(0);
        }

        sqlx::query("DELETE FROM order_items WHERE order_id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        insert_items(conn, id, &o.items).await?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, conn: &mut SqliteConnection) -> DbResult<Vec<BasketOrder>> {
        let rows: Vec<OrderRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM orders ORDER BY seq"))
                .fetch_all(&mut *conn)
                .await?;

        let item_rows: Vec<ItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items ORDER BY order_id, position"
        ))
        .fetch_all(&mut *conn)
        .await?;

        let mut items: HashMap<i64, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            items.entry(row.order_id).or_default().push(row.into());
        }

        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect()
    }

    async fn fetch_by_key(&self, conn: &mut SqliteConnection, id: &i64) -> DbResult<Option<BasketOrder>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM orders WHERE id = ?"))
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let item_rows: Vec<ItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ? ORDER BY position"
        ))
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        row.into_order(item_rows.into_iter().map(OrderItem::from).collect())
            .map(Some)
    }
}

impl RelationalTable<BasketOrder> {
    async fn fetch_by_state(
        &self,
        conn: &mut SqliteConnection,
        state: OrderState,
    ) -> DbResult<Vec<BasketOrder>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM orders WHERE state = ? ORDER BY seq")
            .bind(state)
            .fetch_all(&mut *conn)
            .await?;

        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(order) = self.fetch_by_key(conn, &id).await? {
                orders.push(order);
            }
        }
        Ok(orders)
    }
}

impl SqlOrderStore {
    /// Orders in `state`, through the `state` column index.
    pub async fn orders_by_state(&self, state: OrderState) -> DbResult<Vec<BasketOrder>> {
        let pool = self.pool().await?;
        let mut conn = pool.acquire().await?;
        self.table.fetch_by_state(&mut conn, state).await
    }
}

#[cfg(test)]
mod tests {
    use crate::connection::ConnectionManager;
    use crate::pool::DbConfig;
    use crate::schema::Engine;
    use crate::store::{RecordStore, SqlOrderStore};
    use buho_core::{Customer, DeliveryAddress, OrderDraft, OrderItem, OrderState};
    use chrono::Utc;
    use std::sync::Arc;

    async fn store() -> (Arc<ConnectionManager>, SqlOrderStore) {
        let manager = Arc::new(ConnectionManager::new(DbConfig::in_memory(), Engine::Relational));
        (manager.clone(), SqlOrderStore::new(manager))
    }

    async fn item_count(manager: &ConnectionManager) -> i64 {
        let pool = manager.connection().await.unwrap();
        sqlx::query_scalar("SELECT COUNT(*) FROM order_items")
            .fetch_one(&pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_order_with_delivery_round_trips() {
        let (_, store) = store().await;
        let mut draft = OrderDraft::for_customer(Customer::new(5, "Ana"))
            .with_item(OrderItem::new("A1", "Remera", 2, 1500))
            .with_item(OrderItem::new("B2", "Gorra", 1, 800));
        draft.customer_delivery = Some(DeliveryAddress {
            address: Some("San Martín 100".to_string()),
            city: Some("Rosario".to_string()),
            ..Default::default()
        });
        draft.state = Some(OrderState::InProcess);

        let created = store.create(draft.into_order(Utc::now())).await.unwrap();
        let loaded = store.get_by_id(&created.id.unwrap()).await.unwrap().unwrap();

        assert_eq!(loaded, created);
        assert_eq!(loaded.items[1].article_sku, "B2");
    }

    #[tokio::test]
    async fn test_update_replaces_items_and_delete_cascades() {
        let (manager, store) = store().await;
        let order = OrderDraft::default()
            .with_item(OrderItem::new("A1", "x", 1, 100))
            .with_item(OrderItem::new("A2", "y", 1, 100))
            .into_order(Utc::now());
        let mut order = store.create(order).await.unwrap();
        assert_eq!(item_count(&manager).await, 2);

        order.items.truncate(1);
        order.state = OrderState::Invoiced;
        store.update(order.clone()).await.unwrap();
        assert_eq!(item_count(&manager).await, 1);

        store.delete(&order.id.unwrap()).await.unwrap();
        assert_eq!(item_count(&manager).await, 0);
    }

    #[tokio::test]
    async fn test_clear_removes_items() {
        let (manager, store) = store().await;
        let order = OrderDraft::default()
            .with_item(OrderItem::new("A1", "x", 1, 100))
            .into_order(Utc::now());
        store.create(order).await.unwrap();

        store.clear().await.unwrap();
        assert_eq!(item_count(&manager).await, 0);
    }

    #[tokio::test]
    async fn test_orders_by_state_uses_canonical_column() {
        let (_, store) = store().await;
        for state in [OrderState::Pending, OrderState::Cancelled, OrderState::Pending] {
            let mut draft = OrderDraft::default();
            draft.state = Some(state);
            store.create(draft.into_order(Utc::now())).await.unwrap();
        }

        assert_eq!(store.orders_by_state(OrderState::Pending).await.unwrap().len(), 2);
        assert_eq!(store.orders_by_state(OrderState::Cancelled).await.unwrap().len(), 1);
        assert!(store.orders_by_state(OrderState::Draft).await.unwrap().is_empty());
    }
}
