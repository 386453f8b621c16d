//! User-defined functions: the typed traits users implement, the
//! type-erased executors that run them over columns, and the registry that
//! resolves them by name and argument types.

mod aggregate;
mod context;
mod registry;
mod scalar;

pub use aggregate::{Accumulator, AggregateSignature, Uda, UdaWrapper};
pub use context::FunctionContext;
pub use registry::{FunctionRegistry, ScalarUdfDefinition, UdaDefinition};
pub use scalar::{ScalarSignature, ScalarUdf, ScalarUdfExecutor, ScalarUdfWrapper};
