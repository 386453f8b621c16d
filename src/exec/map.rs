//! Projection node evaluating scalar function expressions per batch.

use std::sync::Arc;

use arrow::array::ArrayRef;
use tracing::{debug, trace};

use crate::error::{Result, VexecError};
use crate::exec::{ExecNode, ExecState, MapExpression, MapOperator, NodeState, RowBatch, RowDescriptor};
use crate::types::{repeat_value, DataType, Value};
use crate::udf::{FunctionContext, FunctionRegistry, ScalarUdfDefinition, ScalarUdfExecutor};

const NODE_NAME: &str = "MapNode";

enum ResolvedExpr {
    Column(usize),
    Literal(Value),
    Call {
        definition: Arc<ScalarUdfDefinition>,
        executor: Option<Box<dyn ScalarUdfExecutor>>,
        args: Vec<ResolvedExpr>,
    },
}

impl ResolvedExpr {
    fn resolve(
        expr: &MapExpression,
        input: &RowDescriptor,
        registry: &FunctionRegistry,
    ) -> Result<(Self, DataType)> {
        match expr {
            MapExpression::Column(col) => {
                let dt = input.type_at(col.index).ok_or(VexecError::ColumnOutOfBounds {
                    index: col.index,
                    len: input.size(),
                })?;
                Ok((ResolvedExpr::Column(col.index), dt))
            }
            MapExpression::Literal(value) => {
                Ok((ResolvedExpr::Literal(value.clone()), value.data_type()))
            }
            MapExpression::Call { name, args } => {
                let mut resolved = Vec::with_capacity(args.len());
                let mut arg_types = Vec::with_capacity(args.len());
                for arg in args {
                    let (expr, dt) = Self::resolve(arg, input, registry)?;
                    resolved.push(expr);
                    arg_types.push(dt);
                }
                let definition = registry.scalar(name, &arg_types)?;
                let return_type = definition.signature().return_type;
                Ok((
                    ResolvedExpr::Call {
                        definition,
                        executor: None,
                        args: resolved,
                    },
                    return_type,
                ))
            }
        }
    }

    fn instantiate(&mut self) {
        if let ResolvedExpr::Call {
            definition,
            executor,
            args,
        } = self
        {
            *executor = Some(definition.instantiate());
            for arg in args {
                arg.instantiate();
            }
        }
    }

    fn evaluate(
        &self,
        ctx: &FunctionContext,
        batch: &RowBatch,
        memory_limit: Option<usize>,
    ) -> Result<ArrayRef> {
        match self {
            ResolvedExpr::Column(index) => Ok(Arc::clone(batch.column(*index))),
            ResolvedExpr::Literal(value) => Ok(repeat_value(value, batch.num_rows())),
            ResolvedExpr::Call {
                definition,
                executor,
                args,
            } => {
                let Some(executor) = executor else {
                    return Err(VexecError::InvalidState(format!(
                        "{NODE_NAME}: {} evaluated before prepare",
                        definition.name()
                    )));
                };
                let inputs = args
                    .iter()
                    .map(|arg| arg.evaluate(ctx, batch, memory_limit))
                    .collect::<Result<Vec<_>>>()?;
                let mut builder = executor.signature().return_type.new_builder(memory_limit);
                executor.exec_batch_arrow(ctx, &inputs, &mut *builder, batch.num_rows())?;
                builder.finish()
            }
        }
    }
}

/// Execution node computing one output column per expression.
///
/// Every input batch yields one output batch with the same row count and the
/// same end-of-stream flag, pushed to every child.
pub struct MapNode {
    state: NodeState,
    input_desc: RowDescriptor,
    output_desc: RowDescriptor,
    column_names: Vec<String>,
    exprs: Vec<ResolvedExpr>,
    children: Vec<Box<dyn ExecNode>>,
}

impl Default for MapNode {
    fn default() -> Self {
        Self::new()
    }
}

impl MapNode {
    /// Creates an uninitialized node.
    #[must_use]
    pub fn new() -> Self {
        MapNode {
            state: NodeState::Created,
            input_desc: RowDescriptor::default(),
            output_desc: RowDescriptor::default(),
            column_names: Vec::new(),
            exprs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Validates the plan and resolves every call against the registry.
    ///
    /// # Errors
    ///
    /// Returns `PlanError` for a malformed plan or input count,
    /// `ArityMismatch` if the output descriptor has the wrong width,
    /// `UnknownFunction` or `SignatureMismatch` from the registry, and
    /// `TypeError` if an output column's type disagrees with its expression.
    pub fn init(
        &mut self,
        state: &ExecState,
        plan: &MapOperator,
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
        if output_desc.size() != plan.expressions.len() {
            return Err(VexecError::ArityMismatch {
                expected: plan.expressions.len(),
                actual: output_desc.size(),
            });
        }

        let mut exprs = Vec::with_capacity(plan.expressions.len());
        for (position, expr) in plan.expressions.iter().enumerate() {
            let (resolved, dt) = ResolvedExpr::resolve(expr, input_desc, state.registry())?;
            if output_desc.type_at(position) != Some(dt) {
                return Err(VexecError::type_error(
                    format!("{dt} at output column {position}"),
                    output_desc.types()[position],
                ));
            }
            exprs.push(resolved);
        }

        self.input_desc = input_desc.clone();
        self.output_desc = output_desc.clone();
        self.column_names = plan.column_names.clone();
        self.exprs = exprs;
        self.state = NodeState::Initialized;
        debug!(columns = self.exprs.len(), "{NODE_NAME} initialized");
        Ok(())
    }

    /// Returns the output column names.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }
}

impl ExecNode for MapNode {
    fn name(&self) -> &'static str {
        NODE_NAME
    }

    fn add_child(&mut self, child: Box<dyn ExecNode>) {
        self.children.push(child);
    }

    fn prepare(&mut self, state: &ExecState) -> Result<()> {
        self.state.expect(NodeState::Initialized, NODE_NAME, "prepare")?;
        for expr in &mut self.exprs {
            expr.instantiate();
        }
        for child in &mut self.children {
            child.prepare(state)?;
        }
        self.state = NodeState::Prepared;
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
        if batch.desc() != &self.input_desc || !batch.is_complete() {
            return Err(VexecError::type_error(
                format!("{:?}", self.input_desc.types()),
                format!("{:?}", &batch.desc().types()[..batch.num_columns()]),
            ));
        }
        let ctx = state.function_context();
        let limit = state.config().memory_limit();
        let mut output = RowBatch::new(self.output_desc.clone(), batch.num_rows());
        for expr in &self.exprs {
            output.add_column(expr.evaluate(ctx, batch, limit)?)?;
        }
        output.set_eos(batch.eos());
        trace!(rows = output.num_rows(), eos = output.eos(), "{NODE_NAME} produced batch");
        for child in &mut self.children {
            child.consume_next(state, &output)?;
        }
        Ok(())
    }

    fn close(&mut self, state: &ExecState) -> Result<()> {
        if self.state == NodeState::Closed {
            return Err(VexecError::InvalidState(format!("{NODE_NAME}: already closed")));
        }
        self.exprs.clear();
        self.state = NodeState::Closed;
        for child in &mut self.children {
            child.close(state)?;
        }
        Ok(())
    }
}
