//! Per-invocation context handed to every function call.

use crate::config::{ExecConfig, DEFAULT_STRING_SIZE_HINT};

/// Read-only state shared by all function invocations of a query.
///
/// Functions receive it on every call; it is never owned by a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionContext {
    string_size_hint: usize,
}

impl Default for FunctionContext {
    fn default() -> Self {
        FunctionContext {
            string_size_hint: DEFAULT_STRING_SIZE_HINT,
        }
    }
}

impl FunctionContext {
    /// Creates a context from the execution config.
    #[must_use]
    pub fn new(config: &ExecConfig) -> Self {
        FunctionContext {
            string_size_hint: config.string_size_hint,
        }
    }

    /// Expected bytes per string result, used to seed data reservations.
    #[must_use]
    pub fn string_size_hint(&self) -> usize {
        self.string_size_hint
    }
}
