use async_trait::async_trait;
use buho_core::Customer;
use sqlx::sqlite::SqliteConnection;
use sqlx::FromRow;

use super::{branch_ref, RelationalTable};
use crate::error::{DbError, DbResult};
use crate::store::RecordTable;

const COLUMNS: &str = "id, dni, name, last_name, email, cellphone, alternative_phone, address, \
    zip_code, city, district, state, list_price, iva_situation, enabled, branch_id, branch_name, \
    saldo_favor, total_reward_points, checking_account_enabled, cta_cte_limit_amount, \
    customer_type, observation, status, birthday_date";

#[derive(Debug, FromRow)]
struct ClientRow {
    id: i64,
    dni: Option<String>,
    name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    cellphone: Option<String>,
    alternative_phone: Option<String>,
    address: Option<String>,
    zip_code: Option<String>,
    city: Option<String>,
    district: Option<String>,
    state: Option<String>,
    list_price: i64,
    iva_situation: String,
    enabled: bool,
    branch_id: Option<i64>,
    branch_name: Option<String>,
    saldo_favor: i64,
    total_reward_points: i64,
    checking_account_enabled: bool,
    cta_cte_limit_amount: i64,
    customer_type: Option<String>,
    observation: Option<String>,
    status: String,
    birthday_date: Option<String>,
}

impl From<ClientRow> for Customer {
    fn from(row: ClientRow) -> Self {
        Customer {
            id: Some(row.id),
            dni: row.dni,
            name: row.name,
            last_name: row.last_name,
            email: row.email,
            cellphone: row.cellphone,
            alternative_phone: row.alternative_phone,
            address: row.address,
            zip_code: row.zip_code,
            city: row.city,
            district: row.district,
            state: row.state,
            list_price: row.list_price,
            iva_situation: row.iva_situation,
            enabled: row.enabled,
            branch: branch_ref(row.branch_id, row.branch_name),
            saldo_favor: row.saldo_favor,
            total_reward_points: row.total_reward_points,
            checking_account_enabled: row.checking_account_enabled,
            cta_cte_limit_amount: row.cta_cte_limit_amount,
            customer_type: row.customer_type,
            observation: row.observation,
            status: row.status,
            birthday_date: row.birthday_date,
        }
    }
}

#[async_trait]
impl RecordTable<Customer> for RelationalTable<Customer> {
    fn table_name(&self) -> &'static str {
        "clients"
    }

    fn key_column(&self) -> &'static str {
        "id"
    }

    async fn insert(&self, conn: &mut SqliteConnection, c: &Customer) -> DbResult<()> {
        let id = c.id.ok_or_else(|| DbError::from(buho_core::ValidationError::required("id")))?;
        let branch = c.branch.clone().unwrap_or_default();

        sqlx::query(&format!(
            "INSERT INTO clients ({COLUMNS}) VALUES \
             (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(id)
        .bind(&c.dni)
        .bind(&c.name)
        .bind(&c.last_name)
        .bind(&c.email)
        .bind(&c.cellphone)
        .bind(&c.alternative_phone)
        .bind(&c.address)
        .bind(&c.zip_code)
        .bind(&c.city)
        .bind(&c.district)
        .bind(&c.state)
        .bind(c.list_price)
        .bind(&c.iva_situation)
        .bind(c.enabled)
        .bind(branch.id)
        .bind(branch.business_name)
        .bind(c.saldo_favor)
        .bind(c.total_reward_points)
        .bind(c.checking_account_enabled)
        .bind(c.cta_cte_limit_amount)
        .bind(&c.customer_type)
        .bind(&c.observation)
        .bind(&c.status)
        .bind(&c.birthday_date)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn update(&self, conn: &mut SqliteConnection, c: &Customer) -> DbResult<u64> {
        let branch = c.branch.clone().unwrap_or_default();

        let result = sqlx::query(
            r#"
            UPDATE clients SET
                dni = ?, name = ?, last_name = ?, email = ?, cellphone = ?, alternative_phone = ?,
                address = ?, zip_code = ?, city = ?, district = ?, state = ?,
                list_price = ?, iva_situation = ?, enabled = ?,
                branch_id = ?, branch_name = ?,
                saldo_favor = ?, total_reward_points = ?,
                checking_account_enabled = ?, cta_cte_limit_amount = ?,
                customer_type = ?, observation = ?, status = ?, birthday_date = ?
            WHERE id = ?
            "#,
        )
        .bind(&c.dni)
        .bind(&c.name)
        .bind(&c.last_name)
        .bind(&c.email)
        .bind(&c.cellphone)
        .bind(&c.alternative_phone)
        .bind(&c.address)
        .bind(&c.zip_code)
        .bind(&c.city)
        .bind(&c.district)
        .bind(&c.state)
        .bind(c.list_price)
        .bind(&c.iva_situation)
        .bind(c.enabled)
        .bind(branch.id)
        .bind(branch.business_name)
        .bind(c.saldo_favor)
        .bind(c.total_reward_points)
        .bind(c.checking_account_enabled)
        .bind(c.cta_cte_limit_amount)
        .bind(&c.customer_type)
        .bind(&c.observation)
        .bind(&c.status)
        .bind(&c.birthday_date)
        .bind(c.id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, conn: &mut SqliteConnection) -> DbResult<Vec<Customer>> {
        let rows: Vec<ClientRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM clients ORDER BY seq"))
                .fetch_all(&mut *conn)
                .await?;
        Ok(rows.into_iter().map(Customer::from).collect())
    }

    async fn fetch_by_key(&self, conn: &mut SqliteConnection, id: &i64) -> DbResult<Option<Customer>> {
        let row: Option<ClientRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM clients WHERE id = ?"))
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(row.map(Customer::from))
    }
}
