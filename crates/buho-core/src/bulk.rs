//! # Bulk Outcomes
//!
//! Batch operations (`replace_all`, `save_multiple`, JSON imports) are
//! best-effort per record: one bad record never aborts its siblings. The
//! outcome of every attempted record lands in a [`BulkResult`].
//!
//! ```text
//! records ──► [ validate ─► insert ] × n ──► BulkResult
//!                  │            │              ├── success_count
//!                  └────────────┴─────────────►└── errors[] (index, key, kind)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// Why a single record was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RecordErrorKind {
    /// Missing or invalid field.
    Validation,
    /// Key already present (earlier in the batch, or in the store for imports).
    DuplicateKey,
    /// The record could not be decoded.
    Malformed,
    /// The engine rejected the write.
    Storage,
    /// A whole page of a paginated import could not be fetched.
    Fetch,
}

impl fmt::Display for RecordErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordErrorKind::Validation => "validation",
            RecordErrorKind::DuplicateKey => "duplicate_key",
            RecordErrorKind::Malformed => "malformed",
            RecordErrorKind::Storage => "storage",
            RecordErrorKind::Fetch => "fetch",
        };
        f.write_str(s)
    }
}

/// A per-record failure inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RecordError {
    /// Position in the input batch (page number for fetch errors).
    pub index: usize,
    /// Record key when one could be read.
    pub key: Option<String>,
    pub kind: RecordErrorKind,
    pub message: String,
}

impl RecordError {
    pub fn new(
        index: usize,
        key: Option<String>,
        kind: RecordErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            index,
            key,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "#{} ({}): {} {}", self.index, key, self.kind, self.message),
            None => write!(f, "#{}: {} {}", self.index, self.kind, self.message),
        }
    }
}

/// Aggregate outcome of a batch operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BulkResult {
    pub success_count: usize,
    pub errors: Vec<RecordError>,
}

impl BulkResult {
    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    pub fn record_error(&mut self, error: RecordError) {
        self.errors.push(error);
    }

    /// Folds another batch outcome into this one (paginated imports).
    pub fn merge(&mut self, other: BulkResult) {
        self.success_count += other.success_count;
        self.errors.extend(other.errors);
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}
