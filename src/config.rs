//! Execution configuration.

/// Assumed size in bytes of an "average" string when seeding output reservations.
pub const DEFAULT_STRING_SIZE_HINT: usize = 10;

/// Configuration for function execution and the nodes that drive it.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Bytes per element reserved up front for variable-length outputs.
    pub string_size_hint: usize,
    /// Memory limit in bytes for each output builder a node creates (0 = unlimited).
    pub memory_limit: usize,
    /// Initial number of groups the grouping table is sized for.
    pub group_capacity_hint: usize,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            string_size_hint: DEFAULT_STRING_SIZE_HINT,
            memory_limit: 0,
            group_capacity_hint: 0,
        }
    }
}

impl ExecConfig {
    /// Creates a new execution configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-element string size hint.
    #[must_use]
    pub fn with_string_size_hint(mut self, string_size_hint: usize) -> Self {
        self.string_size_hint = string_size_hint;
        self
    }

    /// Sets the memory limit in bytes.
    #[must_use]
    pub fn with_memory_limit(mut self, memory_limit: usize) -> Self {
        self.memory_limit = memory_limit;
        self
    }

    /// Sets the initial grouping table capacity.
    #[must_use]
    pub fn with_group_capacity_hint(mut self, group_capacity_hint: usize) -> Self {
        self.group_capacity_hint = group_capacity_hint;
        self
    }

    /// Returns the memory limit as an option (`None` when unlimited).
    #[must_use]
    pub fn memory_limit(&self) -> Option<usize> {
        (self.memory_limit > 0).then_some(self.memory_limit)
    }
}
