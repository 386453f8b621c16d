//! Contract tests for function executors, the registry, and execution nodes.

mod blocking_agg_contract;
mod scalar_contract;
