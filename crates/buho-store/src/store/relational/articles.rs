use async_trait::async_trait;
use buho_core::Article;
use sqlx::sqlite::SqliteConnection;
use sqlx::FromRow;

use super::{catalog_ref, flatten_ref, RelationalTable};
use crate::error::DbResult;
use crate::store::RecordTable;

const COLUMNS: &str = "sku, name, description, unit_price1, unit_price2, unit_price3, \
    unit_price4, unit_price5, unit_in_stock, sizes, designs, department_id, department_name, \
    supplier_id, supplier_name, brand_id, brand_name, tax_code1";

#[derive(Debug, FromRow)]
struct ArticleRow {
    sku: String,
    name: String,
    description: String,
    unit_price1: i64,
    unit_price2: i64,
    unit_price3: i64,
    unit_price4: i64,
    unit_price5: i64,
    unit_in_stock: i64,
    sizes: String,
    designs: String,
    department_id: Option<i64>,
    department_name: Option<String>,
    supplier_id: Option<i64>,
    supplier_name: Option<String>,
    brand_id: Option<i64>,
    brand_name: Option<String>,
    tax_code1: i64,
}

impl ArticleRow {
    fn into_article(self) -> DbResult<Article> {
        Ok(Article {
            sku: self.sku,
            name: self.name,
            description: self.description,
            unit_price1: self.unit_price1,
            unit_price2: self.unit_price2,
            unit_price3: self.unit_price3,
            unit_price4: self.unit_price4,
            unit_price5: self.unit_price5,
            unit_in_stock: self.unit_in_stock,
            sizes: serde_json::from_str(&self.sizes)?,
            designs: serde_json::from_str(&self.designs)?,
            department: catalog_ref(self.department_id, self.department_name),
            supplier: catalog_ref(self.supplier_id, self.supplier_name),
            brand: catalog_ref(self.brand_id, self.brand_name),
            tax_code1: self.tax_code1,
        })
    }
}

#[async_trait]
impl RecordTable<Article> for RelationalTable<Article> {
    fn table_name(&self) -> &'static str {
        "articles"
    }

    fn key_column(&self) -> &'static str {
        "sku"
    }

    async fn insert(&self, conn: &mut SqliteConnection, a: &Article) -> DbResult<()> {
        let (department_id, department_name) = flatten_ref(a.department.as_ref());
        let (supplier_id, supplier_name) = flatten_ref(a.supplier.as_ref());
        let (brand_id, brand_name) = flatten_ref(a.brand.as_ref());

        sqlx::query(&format!(
            "INSERT INTO articles ({COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&a.sku)
        .bind(&a.name)
        .bind(&a.description)
        .bind(a.unit_price1)
        .bind(a.unit_price2)
        .bind(a.unit_price3)
        .bind(a.unit_price4)
        .bind(a.unit_price5)
        .bind(a.unit_in_stock)
        .bind(serde_json::to_string(&a.sizes)?)
        .bind(serde_json::to_string(&a.designs)?)
        .bind(department_id)
        .bind(department_name)
        .bind(supplier_id)
        .bind(supplier_name)
        .bind(brand_id)
        .bind(brand_name)
        .bind(a.tax_code1)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn update(&self, conn: &mut SqliteConnection, a: &Article) -> DbResult<u64> {
        let (department_id, department_name) = flatten_ref(a.department.as_ref());
        let (supplier_id, supplier_name) = flatten_ref(a.supplier.as_ref());
        let (brand_id, brand_name) = flatten_ref(a.brand.as_ref());

        let result = sqlx::query(
            r#"
            UPDATE articles SET
                name = ?, description = ?,
                unit_price1 = ?, unit_price2 = ?, unit_price3 = ?, unit_price4 = ?, unit_price5 = ?,
                unit_in_stock = ?, sizes = ?, designs = ?,
                department_id = ?, department_name = ?,
                supplier_id = ?, supplier_name = ?,
                brand_id = ?, brand_name = ?,
                tax_code1 = ?
            WHERE sku = ?
            "#,
        )
        .bind(&a.name)
        .bind(&a.description)
        .bind(a.unit_price1)
        .bind(a.unit_price2)
        .bind(a.unit_price3)
        .bind(a.unit_price4)
        .bind(a.unit_price5)
        .bind(a.unit_in_stock)
        .bind(serde_json::to_string(&a.sizes)?)
        .bind(serde_json::to_string(&a.designs)?)
        .bind(department_id)
        .bind(department_name)
        .bind(supplier_id)
        .bind(supplier_name)
        .bind(brand_id)
        .bind(brand_name)
        .bind(a.tax_code1)
        .bind(&a.sku)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, conn: &mut SqliteConnection) -> DbResult<Vec<Article>> {
        let rows: Vec<ArticleRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM articles ORDER BY seq"))
                .fetch_all(&mut *conn)
                .await?;
        rows.into_iter().map(ArticleRow::into_article).collect()
    }

    async fn fetch_by_key(&self, conn: &mut SqliteConnection, sku: &String) -> DbResult<Option<Article>> {
        let row: Option<ArticleRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM articles WHERE sku = ?"))
                .bind(sku)
                .fetch_optional(&mut *conn)
                .await?;
        row.map(ArticleRow::into_article).transpose()
    }
}

#[cfg(test)]
mod tests {
    use crate::connection::ConnectionManager;
    use crate::pool::DbConfig;
    use crate::schema::Engine;
    use crate::store::{RecordStore, SqlArticleStore};
    use buho_core::{Article, CatalogRef};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_article_columns_round_trip() {
        let manager = Arc::new(ConnectionManager::new(DbConfig::in_memory(), Engine::Relational));
        let store = SqlArticleStore::new(manager);

        let article = Article {
            description: "Algodón".to_string(),
            unit_price1: 1500,
            unit_price5: 900,
            unit_in_stock: 12,
            sizes: vec!["S".to_string(), "M".to_string()],
            designs: vec!["Liso".to_string()],
            department: Some(CatalogRef::new(3, "Indumentaria")),
            brand: Some(CatalogRef::new(8, "Buho")),
            tax_code1: 21,
            ..Article::new("REM-1", "Remera")
        };
        store.create(article.clone()).await.unwrap();

        let loaded = store.get_by_id(&"REM-1".to_string()).await.unwrap();
        assert_eq!(loaded, Some(article));
    }
}
