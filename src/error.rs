use crate::quote::QuoteStatus;

/// A field-level validation failure, addressed to the offending field.
/// `row` is set when the field belongs to an additional-item row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub row: Option<usize>,
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn form(field: &str, reason: &str) -> Self {
        Self {
            row: None,
            field: field.into(),
            reason: reason.into(),
        }
    }
    pub fn item(row: usize, field: &str, reason: &str) -> Self {
        Self {
            row: Some(row),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.row {
            Some(i) => write!(f, "item {}: {}: {}", i + 1, self.field, self.reason),
            None => write!(f, "{}: {}", self.field, self.reason),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum QuoteError {
    #[error("validation failed: {}", format_field_errors(.0))]
    Validation(Vec<FieldError>),
    #[error("unknown cost code: {0}")]
    InvalidCostCode(String),
    #[error("missing or non-numeric default for cost code {0}")]
    UnresolvedDefault(String),
    #[error("actor {0} lacks the approval capability")]
    Forbidden(String),
    #[error("quote version is approved and read-only")]
    Immutable,
    #[error("status transition {from:?} -> {to:?} is not permitted")]
    InvalidTransition { from: QuoteStatus, to: QuoteStatus },
    #[error("quote {0} is not the latest version of its group")]
    NotLatest(String),
    #[error("version number race detected for group {0}, retry the save")]
    ConcurrencyConflict(String),
    #[error("quote not found: {0}")]
    NotFound(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl From<sled::Error> for QuoteError {
    fn from(e: sled::Error) -> Self {
        QuoteError::Persistence(e.to_string())
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
