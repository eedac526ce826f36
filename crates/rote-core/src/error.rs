//! Error types for rote operations.
//!
//! This module provides the error hierarchy with structured error codes,
//! field-level validation detail, and suggestions for resolution.

use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for rote operations.
pub type LearnResult<T> = Result<T, LearnError>;

/// Main error type for all rote operations.
#[derive(Error, Debug)]
pub enum LearnError {
    /// Input validation failed. Rejected before any state mutation.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        details: HashMap<String, String>,
        suggestion: Option<String>,
    },

    /// No memory state exists for the learner/card pair.
    #[error("Learning state not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        learner_id: Option<String>,
        card_id: Option<i64>,
    },

    /// A concurrent update raced this one. The whole operation can be
    /// retried safely; the transition is side-effect-free until the
    /// atomic write.
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        code: ErrorCode,
        retryable: bool,
    },

    /// Database operation failed. Not retried automatically.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (VAL_xxx)
    ValInvalidRating,
    ValInvalidLimit,
    ValInvalidPage,
    ValInvalidDuration,
    ValInvalidDateRange,

    // Learning state (STATE_xxx)
    StateNotFound,

    // Conflict (CONFLICT_xxx)
    ConflictConcurrentUpdate,

    // Database (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValInvalidRating => "VAL_001",
            ErrorCode::ValInvalidLimit => "VAL_002",
            ErrorCode::ValInvalidPage => "VAL_003",
            ErrorCode::ValInvalidDuration => "VAL_004",
            ErrorCode::ValInvalidDateRange => "VAL_005",
            ErrorCode::StateNotFound => "STATE_001",
            ErrorCode::ConflictConcurrentUpdate => "CONFLICT_001",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl LearnError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>, code: ErrorCode) -> Self {
        Self::Validation {
            message: message.into(),
            code,
            details: HashMap::new(),
            suggestion: None,
        }
    }

    /// Create a validation error with field-level detail.
    pub fn validation_field(
        message: impl Into<String>,
        code: ErrorCode,
        field: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        let mut details = HashMap::new();
        details.insert(field.into(), detail.into());
        Self::Validation {
            message: message.into(),
            code,
            details,
            suggestion: None,
        }
    }

    /// Create a not found error for a learner/card pair.
    pub fn state_not_found(learner_id: impl Into<String>, card_id: i64) -> Self {
        let learner_id = learner_id.into();
        Self::NotFound {
            message: format!(
                "No learning state for card {} of learner '{}'",
                card_id, learner_id
            ),
            code: ErrorCode::StateNotFound,
            learner_id: Some(learner_id),
            card_id: Some(card_id),
        }
    }

    /// Create a retryable conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            code: ErrorCode::ConflictConcurrentUpdate,
            retryable: true,
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::Conflict { code, .. } => *code,
            Self::Database { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether the caller should retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { retryable: true, .. })
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::NotFound { .. } => {
                Some("Please check the card ID and ensure it is tracked for this learner")
            }
            Self::Conflict { .. } => Some("Please retry the review submission"),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for LearnError {
    fn from(err: rusqlite::Error) -> Self {
        // Busy/locked means another writer holds the row; surfaced as a
        // retryable conflict rather than a fatal database failure.
        if let rusqlite::Error::SqliteFailure(e, _) = &err {
            if matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) {
                return Self::Conflict {
                    message: err.to_string(),
                    code: ErrorCode::ConflictConcurrentUpdate,
                    retryable: true,
                };
            }
        }

        Self::Database {
            message: err.to_string(),
            code: ErrorCode::DbOperationFailed,
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = LearnError::validation_field(
            "rating must be between 0 and 3",
            ErrorCode::ValInvalidRating,
            "rating",
            "got 4",
        );
        assert_eq!(err.code(), ErrorCode::ValInvalidRating);
        assert!(err.to_string().contains("rating must be between 0 and 3"));
    }

    #[test]
    fn test_state_not_found_error() {
        let err = LearnError::state_not_found("learner-1", 42);
        assert_eq!(err.code(), ErrorCode::StateNotFound);
        assert!(err.to_string().contains("42"));
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_conflict_is_retryable() {
        let err = LearnError::conflict("row is locked");
        assert!(err.is_retryable());
        assert_eq!(err.code(), ErrorCode::ConflictConcurrentUpdate);
    }

    #[test]
    fn test_database_error_not_retryable() {
        let err = LearnError::database("disk I/O error");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::ValInvalidRating.as_str(), "VAL_001");
        assert_eq!(ErrorCode::StateNotFound.as_str(), "STATE_001");
        assert_eq!(ErrorCode::ConflictConcurrentUpdate.as_str(), "CONFLICT_001");
    }

    #[test]
    fn test_busy_sqlite_error_maps_to_conflict() {
        let sqlite_err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        let err = LearnError::from(sqlite_err);
        assert!(err.is_retryable());
    }
}
