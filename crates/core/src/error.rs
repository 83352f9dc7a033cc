//! Domain error model and the error-kind taxonomy.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Classification shared by every layer.
///
/// Each layer keeps its own error enum, but all of them collapse onto one of
/// these kinds. The HTTP layer only looks at the kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Referenced pickup point does not exist.
    NotFound,
    /// A reception is already in progress for the pickup point.
    Conflict,
    /// The operation needs an in-progress reception and there is none.
    NoActiveReception,
    /// Removal requested but the active reception holds no products.
    NoProductsInReception,
    /// A history window bound failed to parse.
    InvalidDateFormat,
    /// Any other malformed caller argument (id, city, product type).
    InvalidArgument,
    /// The store could not open a transaction.
    TransactionStartFailed,
    /// The store could not commit a transaction.
    TransactionCommitFailed,
    /// Any other query/exec failure in the store.
    StoreUnavailable,
}

impl ErrorKind {
    /// `true` for kinds caused by the caller's input or the current state,
    /// `false` for infrastructure failures.
    pub fn is_client_error(self) -> bool {
        matches!(
            self,
            ErrorKind::NotFound
                | ErrorKind::Conflict
                | ErrorKind::NoActiveReception
                | ErrorKind::NoProductsInReception
                | ErrorKind::InvalidDateFormat
                | ErrorKind::InvalidArgument
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NoActiveReception => "no_active_reception",
            ErrorKind::NoProductsInReception => "no_products_in_reception",
            ErrorKind::InvalidDateFormat => "invalid_date_format",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::TransactionStartFailed => "transaction_start_failed",
            ErrorKind::TransactionCommitFailed => "transaction_commit_failed",
            ErrorKind::StoreUnavailable => "store_unavailable",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain-level error.
///
/// Deterministic failures only (parsing, invariants). Storage concerns belong
/// to the infra crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. unknown city).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A timestamp argument did not parse as RFC 3339.
    #[error("invalid {field}: {value:?} is not an RFC 3339 timestamp ({reason})")]
    InvalidDateFormat {
        field: &'static str,
        value: String,
        reason: String,
    },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_date(field: &'static str, value: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidDateFormat {
            field,
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation(_) | DomainError::InvalidId(_) => ErrorKind::InvalidArgument,
            // Only reachable by acting on a closed reception.
            DomainError::InvariantViolation(_) => ErrorKind::Conflict,
            DomainError::InvalidDateFormat { .. } => ErrorKind::InvalidDateFormat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_error_names_the_field() {
        let err = DomainError::invalid_date("endDate", "yesterday", "input contains invalid characters");
        assert_eq!(err.kind(), ErrorKind::InvalidDateFormat);
        assert!(err.to_string().contains("endDate"));
        assert!(err.to_string().contains("yesterday"));
    }

    #[test]
    fn infrastructure_kinds_are_not_client_errors() {
        assert!(!ErrorKind::TransactionStartFailed.is_client_error());
        assert!(!ErrorKind::TransactionCommitFailed.is_client_error());
        assert!(!ErrorKind::StoreUnavailable.is_client_error());
        assert!(ErrorKind::NoProductsInReception.is_client_error());
    }
}
