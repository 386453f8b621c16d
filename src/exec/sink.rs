//! Terminal node that collects every batch it receives.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::exec::{ExecNode, ExecState, RowBatch};

/// Shared view of the batches a [`CollectSink`] has received.
#[derive(Debug, Clone, Default)]
pub struct BatchHandle {
    batches: Arc<Mutex<Vec<RowBatch>>>,
}

impl BatchHandle {
    /// Returns copies of the collected batches in arrival order.
    #[must_use]
    pub fn batches(&self) -> Vec<RowBatch> {
        self.batches.lock().clone()
    }

    /// Removes and returns the collected batches.
    #[must_use]
    pub fn take(&self) -> Vec<RowBatch> {
        std::mem::take(&mut *self.batches.lock())
    }

    /// Returns the number of collected batches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.lock().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Node that stores every consumed batch for the caller to inspect.
#[derive(Debug, Default)]
pub struct CollectSink {
    handle: BatchHandle,
}

impl CollectSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle that stays valid after the sink is moved into a plan.
    #[must_use]
    pub fn handle(&self) -> BatchHandle {
        self.handle.clone()
    }
}

impl ExecNode for CollectSink {
    fn name(&self) -> &'static str {
        "CollectSink"
    }

    fn add_child(&mut self, _child: Box<dyn ExecNode>) {}

    fn prepare(&mut self, _state: &ExecState) -> Result<()> {
        Ok(())
    }

    fn open(&mut self, _state: &ExecState) -> Result<()> {
        Ok(())
    }

    fn consume_next(&mut self, _state: &ExecState, batch: &RowBatch) -> Result<()> {
        self.handle.batches.lock().push(batch.clone());
        Ok(())
    }

    fn close(&mut self, _state: &ExecState) -> Result<()> {
        Ok(())
    }
}
