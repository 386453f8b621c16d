//! Push-based execution: row batches, plan descriptions, and the nodes that
//! run scalar functions and aggregates over them.

mod batch;
mod blocking_agg;
mod map;
mod node;
mod plan;
mod sink;
mod state;

pub use batch::{RowBatch, RowDescriptor, SelectionVector};
pub use blocking_agg::BlockingAggNode;
pub use map::MapNode;
pub use node::{ExecNode, NodeState};
pub use plan::{
    AggregateArg, AggregateExpression, BlockingAggregateOperator, ColumnRef, MapExpression,
    MapOperator,
};
pub use sink::{BatchHandle, CollectSink};
pub use state::ExecState;
