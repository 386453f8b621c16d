//! Query-wide state shared by every node of a plan.

use std::sync::Arc;

use crate::config::ExecConfig;
use crate::udf::{FunctionContext, FunctionRegistry};

/// Function registry and configuration for one query.
#[derive(Debug, Clone)]
pub struct ExecState {
    registry: Arc<FunctionRegistry>,
    config: ExecConfig,
    function_context: FunctionContext,
}

impl ExecState {
    /// Creates a state with the default configuration.
    #[must_use]
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self::with_config(registry, ExecConfig::default())
    }

    /// Creates a state with an explicit configuration.
    #[must_use]
    pub fn with_config(registry: Arc<FunctionRegistry>, config: ExecConfig) -> Self {
        let function_context = FunctionContext::new(&config);
        ExecState {
            registry,
            config,
            function_context,
        }
    }

    /// Returns the function registry.
    #[must_use]
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    /// Returns the context passed to every function invocation.
    #[must_use]
    pub fn function_context(&self) -> &FunctionContext {
        &self.function_context
    }
}
