use std::fmt;

use thiserror::Error;

/// Result type alias for tracker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tracker operations
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("storage error during {operation}")]
    Persistence {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Validation and malformed-input errors are the caller's fault
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidInput(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Extension for tagging storage failures with the attempted operation
pub(crate) trait PersistenceContext<T> {
    fn during(self, operation: &'static str) -> Result<T>;
}

impl<T> PersistenceContext<T> for std::result::Result<T, rusqlite::Error> {
    fn during(self, operation: &'static str) -> Result<T> {
        self.map_err(|source| Error::Persistence { operation, source })
    }
}

/// Which rule a field violated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    Required,
    InvalidFormat,
    InvalidLength,
    InvalidValue,
    InvalidRange,
    InvalidCharacter,
}

impl ValidationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationKind::Required => "required",
            ValidationKind::InvalidFormat => "invalid format",
            ValidationKind::InvalidLength => "invalid length",
            ValidationKind::InvalidValue => "invalid value",
            ValidationKind::InvalidRange => "invalid range",
            ValidationKind::InvalidCharacter => "invalid character",
        }
    }
}

/// A single field-level violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub kind: ValidationKind,
    pub message: String,
    pub value: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.field, self.message, self.kind.as_str())
    }
}

/// Every violation found while validating one entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        field: &'static str,
        kind: ValidationKind,
        message: impl Into<String>,
        value: impl ToString,
    ) {
        self.errors.push(FieldError {
            field,
            kind,
            message: message.into(),
            value: value.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn has(&self, field: &str, kind: ValidationKind) -> bool {
        self.errors.iter().any(|e| e.field == field && e.kind == kind)
    }

    /// Ok when nothing was recorded, otherwise the aggregate error
    pub fn into_result(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed: ")?;
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}
