//! vexec - vectorized execution of user-defined functions
//!
//! Typed scalar functions and aggregates are registered once, resolved by
//! name and argument types, and executed over arrow arrays or column
//! buffers. The blocking aggregation node drives aggregates over a stream
//! of row batches.

pub mod column;
pub mod config;
pub mod error;
pub mod exec;
pub mod types;
pub mod udf;

pub use config::ExecConfig;
pub use error::{Result, VexecError};
pub use exec::{
    AggregateArg, AggregateExpression, BlockingAggNode, BlockingAggregateOperator, CollectSink,
    ColumnRef, ExecNode, ExecState, MapExpression, MapNode, MapOperator, RowBatch,
    RowDescriptor, SelectionVector,
};
pub use types::{
    BoolValue, DataType, Float64Value, Int64Value, StringValue, Time64NsValue, UdfValue, Value,
};
pub use udf::{
    Accumulator, FunctionContext, FunctionRegistry, ScalarUdf, ScalarUdfExecutor, Uda,
};
