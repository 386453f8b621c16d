//! The push-based execution node interface.

use std::fmt;

use crate::error::{Result, VexecError};
use crate::exec::{ExecState, RowBatch};

/// Lifecycle position of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Constructed, not yet validated.
    Created,
    /// Plan validated against the registry and descriptors.
    Initialized,
    /// Per-query state allocated.
    Prepared,
    /// Accepting batches.
    Opened,
    /// Resources released.
    Closed,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeState::Created => "created",
            NodeState::Initialized => "initialized",
            NodeState::Prepared => "prepared",
            NodeState::Opened => "opened",
            NodeState::Closed => "closed",
        };
        f.write_str(name)
    }
}

impl NodeState {
    /// Fails unless the node is in `expected`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` naming the node and the rejected operation.
    pub fn expect(self, expected: NodeState, node: &str, op: &str) -> Result<()> {
        if self == expected {
            Ok(())
        } else {
            Err(VexecError::InvalidState(format!(
                "{node}: cannot {op} while {self}, expected {expected}"
            )))
        }
    }
}

/// A node in a push-based pipeline.
///
/// A driver calls `prepare`, `open`, then `consume_next` once per input
/// batch, then `close`. Nodes forward lifecycle calls to their children, and
/// push their output batches to them through `consume_next`.
pub trait ExecNode: Send {
    /// Returns a short name for logs and errors.
    fn name(&self) -> &'static str;

    /// Registers a consumer of this node's output.
    fn add_child(&mut self, child: Box<dyn ExecNode>);

    /// Allocates per-query state.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if called out of order.
    fn prepare(&mut self, state: &ExecState) -> Result<()>;

    /// Starts accepting batches.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if called out of order.
    fn open(&mut self, state: &ExecState) -> Result<()>;

    /// Consumes one input batch.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the node is not open, or any error raised
    /// while processing the batch or by a child consuming output.
    fn consume_next(&mut self, state: &ExecState, batch: &RowBatch) -> Result<()>;

    /// Releases per-query state. Valid from any state except closed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if already closed.
    fn close(&mut self, state: &ExecState) -> Result<()>;
}
