//! # Sync Error Types
//!
//! Error types for feed fetches and imports.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Payload             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  ConnectionFailed│ │  InvalidResponse        │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │                         │ │
//! │  │  ConfigLoad/Save│  │  HttpStatus     │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │    Database     │  Store failures that stop an import before any    │
//! │  │  Database(..)   │  data moved (clear, connection)                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use buho_store::DbError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// HTTP statuses worth another attempt.
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Sync error type covering feed, config and import failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid feed URL.
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The server could not be reached (status 0).
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The request did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    // =========================================================================
    // Payload Errors
    // =========================================================================
    /// The body was not a list or a page envelope of the expected record.
    #[error("Invalid feed response: {0}")]
    InvalidResponse(String),

    // =========================================================================
    // Database Errors
    // =========================================================================
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Conversion Implementations
// =============================================================================

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        if err.is_timeout() {
            SyncError::Timeout(url)
        } else if let Some(status) = err.status() {
            SyncError::HttpStatus {
                status: status.as_u16(),
                url,
            }
        } else if err.is_decode() {
            SyncError::InvalidResponse(err.to_string())
        } else if err.is_connect() || err.is_request() {
            SyncError::ConnectionFailed(err.to_string())
        } else {
            SyncError::Internal(err.to_string())
        }
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::InvalidResponse(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if the fetch can be attempted again.
    ///
    /// ## Retryable Errors
    /// - Connection failures (status 0)
    /// - Timeouts
    /// - 408, 429, 500, 502, 503, 504
    ///
    /// Everything else (4xx, bad payloads, config, database) is permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ConnectionFailed(_) | SyncError::Timeout(_) => true,
            SyncError::HttpStatus { status, .. } => RETRYABLE_STATUSES.contains(status),
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// The HTTP status as the feed caller sees it (0 when nothing came back).
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::HttpStatus { status, .. } => Some(*status),
            SyncError::ConnectionFailed(_) => Some(0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::ConnectionFailed("refused".into()).is_retryable());
        assert!(SyncError::Timeout("http://feed/items".into()).is_retryable());
        for status in RETRYABLE_STATUSES {
            let err = SyncError::HttpStatus {
                status,
                url: "http://feed/items".into(),
            };
            assert!(err.is_retryable(), "{status} should be retried");
        }

        assert!(!SyncError::HttpStatus {
            status: 404,
            url: "http://feed/items".into()
        }
        .is_retryable());
        assert!(!SyncError::HttpStatus {
            status: 501,
            url: "http://feed/items".into()
        }
        .is_retryable());
        assert!(!SyncError::InvalidResponse("not a list".into()).is_retryable());
        assert!(!SyncError::InvalidConfig("page_size".into()).is_retryable());
    }

    #[test]
    fn test_config_errors() {
        assert!(SyncError::InvalidUrl("ftp://x".into()).is_config_error());
        assert!(!SyncError::Timeout("x".into()).is_config_error());
    }

    #[test]
    fn test_status_and_display() {
        let err = SyncError::HttpStatus {
            status: 503,
            url: "http://feed/items".into(),
        };
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("503"));
        assert_eq!(SyncError::ConnectionFailed("x".into()).status(), Some(0));

        let db: SyncError = DbError::PoolExhausted.into();
        assert!(matches!(db, SyncError::Database(_)));
        assert_eq!(db.status(), None);
    }
}
