//! Error types for vexec operations.

use arrow::error::ArrowError;
use thiserror::Error;

/// Result type alias using [`VexecError`].
pub type Result<T> = std::result::Result<T, VexecError>;

/// Error types for vexec operations.
#[derive(Debug, Error)]
pub enum VexecError {
    // ==================== Registration / Shape Errors ====================
    /// No function is registered under the given name.
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// A function with the same name and argument types is already registered.
    #[error("Duplicate function: {0}")]
    DuplicateFunction(String),

    /// The function exists but no overload accepts the given argument types.
    #[error("Signature mismatch: {0}")]
    SignatureMismatch(String),

    /// Wrong number of inputs for a function or descriptor.
    #[error("Arity mismatch: expected {expected} inputs, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// Malformed plan description.
    #[error("Plan error: {0}")]
    PlanError(String),

    // ==================== Type Tag Errors ====================
    /// Type tag mismatch on a checked downcast.
    #[error("Type error: expected {expected}, got {actual}")]
    TypeError { expected: String, actual: String },

    // ==================== Capacity Errors ====================
    /// A builder reservation would exceed the configured memory limit.
    #[error("Memory limit exceeded: {used} bytes requested, limit is {limit} bytes")]
    MemoryLimitExceeded { used: usize, limit: usize },

    // ==================== Batch Errors ====================
    /// An input column is shorter than the requested row count.
    #[error("Input column {column} has {len} rows, {count} requested")]
    InsufficientRows {
        column: usize,
        len: usize,
        count: usize,
    },

    /// A column or row index is out of range.
    #[error("Index {index} out of bounds (len {len})")]
    ColumnOutOfBounds { index: usize, len: usize },

    // ==================== Execution Errors ====================
    /// A node lifecycle call was made in the wrong state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// General execution errors.
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Error raised by the arrow library.
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

impl VexecError {
    /// Builds a [`VexecError::TypeError`] from any two displayable type names.
    pub fn type_error(expected: impl ToString, actual: impl ToString) -> Self {
        VexecError::TypeError {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}
