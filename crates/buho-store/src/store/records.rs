//! [`Record`] bindings for the three persisted types.

use buho_core::validation::{
    validate_article, validate_article_for_save, validate_customer, validate_order,
};
use buho_core::{Article, BasketOrder, Customer, ValidationError};

use super::Record;
use crate::ids::next_order_id;
use crate::schema::{self, Collection};

impl Record for Article {
    type Key = String;

    const ENTITY: &'static str = "Article";
    const KEY_FIELD: &'static str = "sku";
    const COLLECTION: Collection = schema::ARTICLES;

    fn key(&self) -> Option<String> {
        let sku = self.sku.trim();
        (!sku.is_empty()).then(|| self.sku.clone())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_article(self)
    }

    fn validate_for_save(&self) -> Result<(), ValidationError> {
        validate_article_for_save(self)
    }

    fn matches(&self, term: &str) -> bool {
        Article::matches(self, term)
    }
}

impl Record for Customer {
    type Key = i64;

    const ENTITY: &'static str = "Customer";
    const KEY_FIELD: &'static str = "id";
    const COLLECTION: Collection = schema::CLIENTS;

    fn key(&self) -> Option<i64> {
        self.id.filter(|id| *id > 0)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_customer(self)
    }

    fn matches(&self, term: &str) -> bool {
        Customer::matches(self, term)
    }
}

impl Record for BasketOrder {
    type Key = i64;

    const ENTITY: &'static str = "Order";
    const KEY_FIELD: &'static str = "id";
    const COLLECTION: Collection = schema::ORDERS;

    fn key(&self) -> Option<i64> {
        BasketOrder::key(self)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_order(self)
    }

    fn assign_key(&mut self) -> bool {
        self.id = Some(next_order_id());
        true
    }

    fn matches(&self, term: &str) -> bool {
        self.matches_search(term)
    }
}
