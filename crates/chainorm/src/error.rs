//! Error types for chainorm

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for chainorm operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for statement construction and execution.
///
/// Errors are `Clone` so that a chain can carry its first failure forward to
/// the finisher and the schema registry can cache a failed resolution.
#[derive(Debug, Clone, Error)]
pub enum OrmError {
    /// Bad or ambiguous model metadata
    #[error("Schema error: {0}")]
    Schema(String),

    /// Malformed condition composition
    #[error("Sequencing error: {0}")]
    Sequencing(String),

    /// Statement failed a build-time check (e.g. missing where clause)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Reference to a field absent from the schema
    #[error("Field resolution error: {0}")]
    FieldResolution(String),

    /// Cancellation or deadline observed before dispatch
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(Duration),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Query execution error
    #[error("Query error: {0}")]
    Query(Arc<tokio_postgres::Error>),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Transaction boundary failure
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Several errors recorded on one chain, oldest first
    #[error("{}", join_messages(.0))]
    Multiple(Vec<OrmError>),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

fn join_messages(errors: &[OrmError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl OrmError {
    /// Create a schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    /// Create a sequencing error
    pub fn sequencing(message: impl Into<String>) -> Self {
        Self::Sequencing(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a field resolution error
    pub fn field_resolution(message: impl Into<String>) -> Self {
        Self::FieldResolution(message.into())
    }

    /// Create a cancellation error
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Append `other` after `self`, flattening nested lists.
    pub fn combine(self, other: OrmError) -> Self {
        let mut errors = match self {
            Self::Multiple(errors) => errors,
            single => vec![single],
        };
        match other {
            Self::Multiple(more) => errors.extend(more),
            single => errors.push(single),
        }
        Self::Multiple(errors)
    }

    /// Iterate over this error and, for `Multiple`, every contained error.
    pub fn iter(&self) -> impl Iterator<Item = &OrmError> {
        let slice: &[OrmError] = match self {
            Self::Multiple(errors) => errors.as_slice(),
            single => std::slice::from_ref(single),
        };
        slice.iter()
    }

    fn any(&self, pred: impl Fn(&OrmError) -> bool) -> bool {
        self.iter().any(pred)
    }

    /// Check if this is (or contains) a schema error
    pub fn is_schema(&self) -> bool {
        self.any(|e| matches!(e, Self::Schema(_)))
    }

    /// Check if this is (or contains) a sequencing error
    pub fn is_sequencing(&self) -> bool {
        self.any(|e| matches!(e, Self::Sequencing(_)))
    }

    /// Check if this is (or contains) a validation error
    pub fn is_validation(&self) -> bool {
        self.any(|e| matches!(e, Self::Validation(_)))
    }

    /// Check if this is (or contains) a field resolution error
    pub fn is_field_resolution(&self) -> bool {
        self.any(|e| matches!(e, Self::FieldResolution(_)))
    }

    /// Check if this is (or contains) a cancellation error
    pub fn is_cancelled(&self) -> bool {
        self.any(|e| matches!(e, Self::Cancelled(_)))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        self.any(|e| matches!(e, Self::NotFound(_)))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        self.any(|e| matches!(e, Self::Timeout(_)))
    }
}

impl From<tokio_postgres::Error> for OrmError {
    fn from(err: tokio_postgres::Error) -> Self {
        Self::Query(Arc::new(err))
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_flattens_and_joins_messages() {
        let err = OrmError::sequencing("first")
            .combine(OrmError::field_resolution("second"))
            .combine(OrmError::validation("third"));

        let OrmError::Multiple(list) = &err else {
            panic!("expected Multiple, got {err:?}");
        };
        assert_eq!(list.len(), 3);
        assert_eq!(
            err.to_string(),
            "Sequencing error: first; Field resolution error: second; Validation error: third"
        );
    }

    #[test]
    fn predicates_look_through_multiple() {
        let err = OrmError::schema("a").combine(OrmError::cancelled("b"));
        assert!(err.is_schema());
        assert!(err.is_cancelled());
        assert!(!err.is_validation());
    }
}
