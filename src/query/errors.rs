use thiserror::Error;

/// Structured errors raised while compiling filter criteria into SQL.
///
/// Every variant describes a caller mistake (an unknown field, a value of the
/// wrong shape, a bad page request). None of them is retried; callers either
/// fix the request or surface the message.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    /// Field key is absent from the schema catalog.
    #[error("unknown filter field '{field}'")]
    UnknownField {
        /// Key as supplied by the caller.
        field: String,
    },
    /// A value list was supplied for a range field, or a range for a
    /// categorical field.
    #[error("field '{field}' expects {expected}")]
    ShapeMismatch {
        /// Offending field key.
        field: String,
        /// Human readable description of the accepted shape.
        expected: &'static str,
    },
    /// Range lower bound is greater than the upper bound.
    #[error("range for '{field}' has min {min} greater than max {max}")]
    InvertedRange {
        /// Offending field key.
        field: String,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// Range bound is NaN or infinite.
    #[error("range bound for '{field}' must be finite")]
    NonFiniteBound {
        /// Offending field key.
        field: String,
    },
    /// Page number or page size is zero.
    #[error("{what} must be at least 1")]
    InvalidPagination {
        /// Which pagination parameter was rejected.
        what: &'static str,
    },
    /// Batched attribute lookup was requested for zero entities.
    #[error("batched lookup for '{field}' requires at least one entity id")]
    EmptyBatch {
        /// Attribute field key.
        field: String,
    },
    /// Named analysis template does not exist.
    #[error("unknown analysis '{name}'")]
    UnknownAnalysis {
        /// Name as supplied by the caller.
        name: String,
    },
    /// Analysis category name is not one of the known groups.
    #[error("unknown analysis category '{name}'")]
    UnknownCategory {
        /// Name as supplied by the caller.
        name: String,
    },
}

impl CompileError {
    /// Builds a [`CompileError::UnknownField`].
    pub fn unknown_field(field: impl Into<String>) -> Self {
        CompileError::UnknownField {
            field: field.into(),
        }
    }

    /// Builds a [`CompileError::ShapeMismatch`].
    pub fn shape_mismatch(field: impl Into<String>, expected: &'static str) -> Self {
        CompileError::ShapeMismatch {
            field: field.into(),
            expected,
        }
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::UnknownField { .. } => "UnknownField",
            CompileError::ShapeMismatch { .. } => "ShapeMismatch",
            CompileError::InvertedRange { .. } => "InvalidBounds",
            CompileError::NonFiniteBound { .. } => "NonFiniteFloat",
            CompileError::InvalidPagination { .. } => "InvalidPagination",
            CompileError::EmptyBatch { .. } => "EmptyBatch",
            CompileError::UnknownAnalysis { .. } => "UnknownAnalysis",
            CompileError::UnknownCategory { .. } => "UnknownCategory",
        }
    }
}
