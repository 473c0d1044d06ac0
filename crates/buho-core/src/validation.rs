//! # Validation Module
//!
//! Per-record validation applied by the record stores before every write.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Deserialization (serde)                                      │
//! │  └── Shape of the JSON document; sparse records still decode           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Required keys, sane quantities and prices                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── PRIMARY KEY / UNIQUE constraints                                  │
//! │  └── Foreign key constraints (order_items)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failure here rejects one record. Batch callers turn it into a
//! [`RecordError`](crate::bulk::RecordError) and move on.

use crate::error::ValidationError;
use crate::order::BasketOrder;
use crate::types::{Article, Customer};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Upper bound for a single order line.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a SKU.
///
/// Only emptiness is rejected; the source catalog uses free-form codes.
///
/// ## Example
/// ```rust
/// use buho_core::validation::validate_sku;
///
/// assert!(validate_sku("COKE 330").is_ok());
/// assert!(validate_sku("  ").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    if sku.trim().is_empty() {
        return Err(ValidationError::required("sku"));
    }
    Ok(())
}

/// Validates a search query, returning the trimmed term.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

/// Validates a line quantity.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed.
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

/// Article key check used by `create`, `update` and `replace_all`.
pub fn validate_article(article: &Article) -> ValidationResult<()> {
    validate_sku(&article.sku)?;
    for (field, cents) in [
        ("unitPrice1", article.unit_price1),
        ("unitPrice2", article.unit_price2),
        ("unitPrice3", article.unit_price3),
        ("unitPrice4", article.unit_price4),
        ("unitPrice5", article.unit_price5),
    ] {
        validate_price_cents(field, cents)?;
    }
    Ok(())
}

/// Stricter article check for paginated saves: a name is required too.
pub fn validate_article_for_save(article: &Article) -> ValidationResult<()> {
    validate_article(article)?;
    if article.name.trim().is_empty() {
        return Err(ValidationError::required("name"));
    }
    Ok(())
}

/// Customers need the numeric id assigned by the source system.
pub fn validate_customer(customer: &Customer) -> ValidationResult<()> {
    match customer.id {
        None => Err(ValidationError::required("id")),
        Some(id) if id <= 0 => Err(ValidationError::MustBePositive {
            field: "id".to_string(),
        }),
        Some(_) => Ok(()),
    }
}

/// Order lines must reference an article and carry a positive quantity.
pub fn validate_order(order: &BasketOrder) -> ValidationResult<()> {
    for item in &order.items {
        validate_sku(&item.article_sku)?;
        validate_quantity(item.quantity)?;
        validate_price_cents("unitPrice", item.unit_price)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
