//! Blocking aggregation: folds every input batch into per-group
//! accumulators and emits a single result batch at end of stream.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::ArrayRef;
use tracing::{debug, trace};

use crate::column::ColumnBuilder;
use crate::error::{Result, VexecError};
use crate::exec::{
    AggregateArg, BlockingAggregateOperator, ExecNode, ExecState, NodeState, RowBatch,
    RowDescriptor, SelectionVector,
};
use crate::types::{repeat_value, ArrayView, DataType, Value};
use crate::udf::{Accumulator, FunctionContext, UdaDefinition};

const NODE_NAME: &str = "BlockingAggNode";

#[derive(Debug)]
enum ResolvedArg {
    Column(usize),
    Literal(Value),
}

#[derive(Debug)]
struct ResolvedAggregate {
    definition: Arc<UdaDefinition>,
    args: Vec<ResolvedArg>,
}

impl ResolvedAggregate {
    fn inputs(&self, batch: &RowBatch) -> Vec<ArrayRef> {
        self.args
            .iter()
            .map(|arg| match arg {
                ResolvedArg::Column(index) => Arc::clone(batch.column(*index)),
                ResolvedArg::Literal(value) => repeat_value(value, batch.num_rows()),
            })
            .collect()
    }
}

fn instantiate_all(values: &[ResolvedAggregate]) -> Vec<Box<dyn Accumulator>> {
    values.iter().map(|v| v.definition.instantiate()).collect()
}

/// Groups in first-seen order, each with one accumulator per aggregate.
struct GroupTable {
    index: HashMap<Vec<Value>, usize>,
    keys: Vec<Vec<Value>>,
    accumulators: Vec<Vec<Box<dyn Accumulator>>>,
}

impl GroupTable {
    fn with_capacity(capacity: usize) -> Self {
        GroupTable {
            index: HashMap::with_capacity(capacity),
            keys: Vec::with_capacity(capacity),
            accumulators: Vec::with_capacity(capacity),
        }
    }

    fn find_or_insert(&mut self, key: Vec<Value>, values: &[ResolvedAggregate]) -> usize {
        if let Some(&group) = self.index.get(&key) {
            return group;
        }
        let group = self.keys.len();
        self.keys.push(key.clone());
        self.index.insert(key, group);
        self.accumulators.push(instantiate_all(values));
        group
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}

enum AggTable {
    Ungrouped(Vec<Box<dyn Accumulator>>),
    Grouped(GroupTable),
}

/// Execution node computing aggregates over its whole input.
///
/// Nothing is emitted until the end-of-stream batch arrives; then exactly one
/// batch holding the group key columns followed by the aggregate columns is
/// pushed to the child. Without grouping columns the output has one row.
pub struct BlockingAggNode {
    state: NodeState,
    input_desc: RowDescriptor,
    output_desc: RowDescriptor,
    output_names: Vec<String>,
    values: Vec<ResolvedAggregate>,
    group_columns: Vec<usize>,
    group_types: Vec<DataType>,
    table: Option<AggTable>,
    children: Vec<Box<dyn ExecNode>>,
    finished: bool,
    batches_consumed: usize,
}

impl Default for BlockingAggNode {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockingAggNode {
    /// Creates an uninitialized node.
    #[must_use]
    pub fn new() -> Self {
        BlockingAggNode {
            state: NodeState::Created,
            input_desc: RowDescriptor::default(),
            output_desc: RowDescriptor::default(),
            output_names: Vec::new(),
            values: Vec::new(),
            group_columns: Vec::new(),
            group_types: Vec::new(),
            table: None,
            children: Vec::new(),
            finished: false,
            batches_consumed: 0,
        }
    }

    /// Validates the plan and resolves every aggregate against the registry.
    ///
    /// # Errors
    ///
    /// Returns `PlanError` for a malformed plan or input count,
    /// `ColumnOutOfBounds` for a column reference past the input,
    /// `ArityMismatch` if the output descriptor has the wrong width,
    /// `UnknownFunction` or `SignatureMismatch` from the registry, and
    /// `TypeError` if an output column's type disagrees with the plan.
    pub fn init(
        &mut self,
        state: &ExecState,
        plan: &BlockingAggregateOperator,
        output_desc: &RowDescriptor,
        input_descs: &[RowDescriptor],
    ) -> Result<()> {
        self.state.expect(NodeState::Created, NODE_NAME, "init")?;
        plan.validate()?;
        let [input_desc] = input_descs else {
            return Err(VexecError::PlanError(format!(
                "{NODE_NAME} takes one input, got {}",
                input_descs.len()
            )));
        };
        let width = plan.groups.len() + plan.values.len();
        if output_desc.size() != width {
            return Err(VexecError::ArityMismatch {
                expected: width,
                actual: output_desc.size(),
            });
        }

        let input_type = |index: usize| {
            input_desc.type_at(index).ok_or(VexecError::ColumnOutOfBounds {
                index,
                len: input_desc.size(),
            })
        };

        let mut group_columns = Vec::with_capacity(plan.groups.len());
        let mut group_types = Vec::with_capacity(plan.groups.len());
        for (position, group) in plan.groups.iter().enumerate() {
            let dt = input_type(group.index)?;
            check_output_type(output_desc, position, dt)?;
            group_columns.push(group.index);
            group_types.push(dt);
        }

        let mut values = Vec::with_capacity(plan.values.len());
        for (position, expr) in plan.values.iter().enumerate() {
            let mut args = Vec::with_capacity(expr.args.len());
            let mut arg_types = Vec::with_capacity(expr.args.len());
            for arg in &expr.args {
                match arg {
                    AggregateArg::Column(col) => {
                        arg_types.push(input_type(col.index)?);
                        args.push(ResolvedArg::Column(col.index));
                    }
                    AggregateArg::Literal(value) => {
                        arg_types.push(value.data_type());
                        args.push(ResolvedArg::Literal(value.clone()));
                    }
                }
            }
            let definition = state.registry().uda(&expr.name, &arg_types)?;
            check_output_type(
                output_desc,
                plan.groups.len() + position,
                definition.signature().finalize_return_type,
            )?;
            values.push(ResolvedAggregate { definition, args });
        }

        self.input_desc = input_desc.clone();
        self.output_desc = output_desc.clone();
        self.output_names = plan.output_names();
        self.values = values;
        self.group_columns = group_columns;
        self.group_types = group_types;
        self.state = NodeState::Initialized;
        debug!(
            values = self.values.len(),
            groups = self.group_columns.len(),
            "{NODE_NAME} initialized"
        );
        Ok(())
    }

    /// Returns the output column names, group names first.
    #[must_use]
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> NodeState {
        self.state
    }

    fn consume_rows(&mut self, ctx: &FunctionContext, batch: &RowBatch) -> Result<()> {
        let Some(table) = self.table.as_mut() else {
            return Err(VexecError::InvalidState(format!(
                "{NODE_NAME}: no aggregation state"
            )));
        };
        let inputs: Vec<Vec<ArrayRef>> = self.values.iter().map(|v| v.inputs(batch)).collect();
        let num_rows = batch.num_rows();

        match table {
            AggTable::Ungrouped(accumulators) => {
                for (acc, args) in accumulators.iter_mut().zip(&inputs) {
                    acc.update_arrow(ctx, args, num_rows)?;
                }
            }
            AggTable::Grouped(groups) => {
                let views = self
                    .group_columns
                    .iter()
                    .zip(&self.group_types)
                    .map(|(&index, &dt)| ArrayView::with_type(batch.column(index).as_ref(), dt))
                    .collect::<Result<Vec<_>>>()?;

                // Bucket rows per group, then update each group once per aggregate.
                let mut buckets: Vec<(usize, SelectionVector)> = Vec::new();
                let mut bucket_of: HashMap<usize, usize> = HashMap::new();
                for row in 0..num_rows {
                    let key: Vec<Value> = views.iter().map(|view| view.value(row)).collect();
                    let group = groups.find_or_insert(key, &self.values);
                    let bucket = *bucket_of.entry(group).or_insert_with(|| {
                        buckets.push((group, SelectionVector::default()));
                        buckets.len() - 1
                    });
                    buckets[bucket].1.push(row)?;
                }

                for (group, rows) in &buckets {
                    for (acc, args) in groups.accumulators[*group].iter_mut().zip(&inputs) {
                        acc.update_arrow_selected(ctx, args, rows)?;
                    }
                }
                trace!(
                    rows = num_rows,
                    batch_groups = buckets.len(),
                    total_groups = groups.len(),
                    "{NODE_NAME} grouped batch"
                );
            }
        }
        Ok(())
    }

    fn emit(&mut self, state: &ExecState) -> Result<()> {
        let Some(table) = self.table.take() else {
            return Err(VexecError::InvalidState(format!(
                "{NODE_NAME}: no aggregation state"
            )));
        };
        let ctx = state.function_context();
        let limit = state.config().memory_limit();
        let num_rows = match &table {
            AggTable::Ungrouped(_) => 1,
            AggTable::Grouped(groups) => groups.len(),
        };
        let mut builders: Vec<Box<dyn ColumnBuilder>> = self
            .output_desc
            .types()
            .iter()
            .map(|dt| dt.new_builder(limit))
            .collect();
        for builder in &mut builders {
            builder.reserve(num_rows)?;
        }

        let num_keys = self.group_columns.len();
        match table {
            AggTable::Ungrouped(accumulators) => {
                for (acc, builder) in accumulators.into_iter().zip(&mut builders) {
                    acc.finalize_arrow(ctx, &mut **builder)?;
                }
            }
            AggTable::Grouped(groups) => {
                for (key, accumulators) in groups.keys.into_iter().zip(groups.accumulators) {
                    for (value, builder) in key.iter().zip(&mut builders) {
                        builder.append_value(value)?;
                    }
                    for (acc, builder) in accumulators.into_iter().zip(&mut builders[num_keys..]) {
                        acc.finalize_arrow(ctx, &mut **builder)?;
                    }
                }
            }
        }

        let mut output = RowBatch::new(self.output_desc.clone(), num_rows);
        for builder in &mut builders {
            output.add_column(builder.finish()?)?;
        }
        output.set_eos(true);
        debug!(rows = num_rows, batches = self.batches_consumed, "{NODE_NAME} emitting result");
        for child in &mut self.children {
            child.consume_next(state, &output)?;
        }
        Ok(())
    }
}

fn check_output_type(desc: &RowDescriptor, position: usize, expected: DataType) -> Result<()> {
    match desc.type_at(position) {
        Some(actual) if actual == expected => Ok(()),
        Some(actual) => Err(VexecError::type_error(
            format!("{expected} at output column {position}"),
            actual,
        )),
        None => Err(VexecError::ColumnOutOfBounds {
            index: position,
            len: desc.size(),
        }),
    }
}

impl ExecNode for BlockingAggNode {
    fn name(&self) -> &'static str {
        NODE_NAME
    }

    fn add_child(&mut self, child: Box<dyn ExecNode>) {
        self.children.push(child);
    }

    fn prepare(&mut self, state: &ExecState) -> Result<()> {
        self.state.expect(NodeState::Initialized, NODE_NAME, "prepare")?;
        if self.children.len() != 1 {
            return Err(VexecError::PlanError(format!(
                "{NODE_NAME} needs exactly one child, has {}",
                self.children.len()
            )));
        }
        self.table = Some(if self.group_columns.is_empty() {
            AggTable::Ungrouped(instantiate_all(&self.values))
        } else {
            AggTable::Grouped(GroupTable::with_capacity(state.config().group_capacity_hint))
        });
        for child in &mut self.children {
            child.prepare(state)?;
        }
        self.state = NodeState::Prepared;
        debug!("{NODE_NAME} prepared");
        Ok(())
    }

    fn open(&mut self, state: &ExecState) -> Result<()> {
        self.state.expect(NodeState::Prepared, NODE_NAME, "open")?;
        for child in &mut self.children {
            child.open(state)?;
        }
        self.state = NodeState::Opened;
        Ok(())
    }

    fn consume_next(&mut self, state: &ExecState, batch: &RowBatch) -> Result<()> {
        self.state.expect(NodeState::Opened, NODE_NAME, "consume")?;
        if self.finished {
            return Err(VexecError::InvalidState(format!(
                "{NODE_NAME}: batch received after end of stream"
            )));
        }
        if batch.desc() != &self.input_desc {
            return Err(VexecError::type_error(
                format!("{:?}", self.input_desc.types()),
                format!("{:?}", batch.desc().types()),
            ));
        }
        if !batch.is_complete() {
            return Err(VexecError::ArityMismatch {
                expected: self.input_desc.size(),
                actual: batch.num_columns(),
            });
        }

        trace!(rows = batch.num_rows(), eos = batch.eos(), "{NODE_NAME} consuming batch");
        self.consume_rows(state.function_context(), batch)?;
        self.batches_consumed += 1;

        if batch.eos() {
            self.finished = true;
            self.emit(state)?;
        }
        Ok(())
    }

    fn close(&mut self, state: &ExecState) -> Result<()> {
        if self.state == NodeState::Closed {
            return Err(VexecError::InvalidState(format!("{NODE_NAME}: already closed")));
        }
        self.table = None;
        self.state = NodeState::Closed;
        for child in &mut self.children {
            child.close(state)?;
        }
        debug!(batches = self.batches_consumed, "{NODE_NAME} closed");
        Ok(())
    }
}
