//! Contract tests for the blocking aggregation node.
//!
//! These tests verify:
//! - Nothing is emitted before end of stream, then exactly one batch
//! - Grouped output holds one row per distinct key
//! - Each accumulator is finalized exactly once
//! - Lifecycle calls out of order are rejected

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array};

use vexec::exec::BatchHandle;
use vexec::{
    AggregateArg, AggregateExpression, BlockingAggNode, BlockingAggregateOperator, CollectSink,
    ColumnRef, DataType, ExecNode, ExecState, Result, RowBatch, RowDescriptor, Value, VexecError,
};

use crate::common::{
    batch, finalize_calls, init_tracing, ints, reset_finalize_calls, rows, strings,
    test_registry,
};

fn column(index: usize) -> AggregateArg {
    AggregateArg::Column(ColumnRef::new(0, index))
}

fn agg(name: &str, args: Vec<AggregateArg>) -> AggregateExpression {
    AggregateExpression::new(name, args)
}

/// Builds an initialized, prepared, and opened node feeding a collecting sink.
fn open_node(
    state: &ExecState,
    plan: &BlockingAggregateOperator,
    output: Vec<DataType>,
    input: Vec<DataType>,
) -> (BlockingAggNode, BatchHandle) {
    let mut node = BlockingAggNode::new();
    let sink = CollectSink::new();
    let handle = sink.handle();
    node.add_child(Box::new(sink));
    node.init(state, plan, &RowDescriptor::new(output), &[RowDescriptor::new(input)])
        .unwrap();
    node.prepare(state).unwrap();
    node.open(state).unwrap();
    (node, handle)
}

#[test]
fn test_ungrouped_minsum_over_two_batches() {
    // Contract: sum(min(in1, in2)) over both batches is 23, emitted once at eos
    init_tracing();
    let state = ExecState::new(test_registry());
    let plan = BlockingAggregateOperator::new(
        vec![agg("minsum", vec![column(0), column(1)])],
        vec!["out".to_string()],
    );
    let (mut node, handle) = open_node(
        &state,
        &plan,
        vec![DataType::Int64],
        vec![DataType::Int64, DataType::Int64],
    );

    node.consume_next(&state, &batch(vec![ints(&[1, 2, 3, 4]), ints(&[2, 5, 6, 8])], false))
        .unwrap();
    assert!(handle.is_empty(), "no output before end of stream");

    node.consume_next(&state, &batch(vec![ints(&[5, 6, 3, 4]), ints(&[1, 5, 3, 8])], true))
        .unwrap();
    let out = handle.batches();
    assert_eq!(out.len(), 1);
    assert!(out[0].eos());
    assert_eq!(out[0].num_columns(), 1);
    assert_eq!(rows(&out[0]), vec![vec![Value::Int64(23)]]);

    node.close(&state).unwrap();
    assert_eq!(handle.len(), 1);
}

#[test]
fn test_grouped_sum() {
    // Contract: keys [A, A, B] with values [1, 2, 3] yield (A, 3) and (B, 3)
    let state = ExecState::new(test_registry());
    let plan = BlockingAggregateOperator::new(
        vec![agg("sum", vec![column(1)])],
        vec!["total".to_string()],
    )
    .with_groups(vec![ColumnRef::new(0, 0)], vec!["key".to_string()]);
    let (mut node, handle) = open_node(
        &state,
        &plan,
        vec![DataType::String, DataType::Int64],
        vec![DataType::String, DataType::Int64],
    );

    node.consume_next(&state, &batch(vec![strings(&["A", "A", "B"]), ints(&[1, 2, 3])], true))
        .unwrap();

    let out = handle.batches();
    assert_eq!(out.len(), 1);
    let mut result = rows(&out[0]);
    result.sort_by(|a, b| a[0].compare(&b[0]).unwrap());
    assert_eq!(
        result,
        vec![
            vec![Value::String("A".into()), Value::Int64(3)],
            vec![Value::String("B".into()), Value::Int64(3)],
        ]
    );
    assert_eq!(node.output_names(), &["key".to_string(), "total".to_string()]);
}

#[test]
fn test_grouped_on_boolean_and_float_keys() {
    // Contract: composite keys of non-string types group by value, in first-seen order
    let state = ExecState::new(test_registry());
    let plan = BlockingAggregateOperator::new(
        vec![agg("sum", vec![column(2)])],
        vec!["total".to_string()],
    )
    .with_groups(
        vec![ColumnRef::new(0, 0), ColumnRef::new(0, 1)],
        vec!["flag".to_string(), "ratio".to_string()],
    );
    let (mut node, handle) = open_node(
        &state,
        &plan,
        vec![DataType::Boolean, DataType::Float64, DataType::Int64],
        vec![DataType::Boolean, DataType::Float64, DataType::Int64],
    );

    let flags = |v: &[bool]| -> ArrayRef { Arc::new(BooleanArray::from(v.to_vec())) };
    let ratios = |v: &[f64]| -> ArrayRef { Arc::new(Float64Array::from(v.to_vec())) };
    node.consume_next(
        &state,
        &batch(
            vec![
                flags(&[true, false, true, true]),
                ratios(&[0.5, 0.5, 0.5, 1.5]),
                ints(&[1, 2, 4, 8]),
            ],
            false,
        ),
    )
    .unwrap();
    node.consume_next(
        &state,
        &batch(
            vec![flags(&[false, true]), ratios(&[0.5, 1.5]), ints(&[16, 32])],
            true,
        ),
    )
    .unwrap();

    let out = handle.batches();
    assert_eq!(out.len(), 1);
    assert_eq!(
        rows(&out[0]),
        vec![
            vec![Value::Boolean(true), Value::Float64(0.5), Value::Int64(5)],
            vec![Value::Boolean(false), Value::Float64(0.5), Value::Int64(18)],
            vec![Value::Boolean(true), Value::Float64(1.5), Value::Int64(40)],
        ]
    );
}

#[test]
fn test_grouped_output_converts_to_record_batch() {
    // Contract: output batches carry names through the record batch conversion
    let state = ExecState::new(test_registry());
    let plan = BlockingAggregateOperator::new(
        vec![
            agg("count", vec![column(0)]),
            agg("sum", vec![column(1)]),
        ],
        vec!["n".to_string(), "total".to_string()],
    )
    .with_groups(vec![ColumnRef::new(0, 0)], vec!["key".to_string()]);
    let (mut node, handle) = open_node(
        &state,
        &plan,
        vec![DataType::String, DataType::Int64, DataType::Int64],
        vec![DataType::String, DataType::Int64],
    );
    node.consume_next(&state, &batch(vec![strings(&["x", "y", "x"]), ints(&[1, 2, 3])], false))
        .unwrap();
    node.consume_next(&state, &batch(vec![strings(&["y"]), ints(&[10])], true))
        .unwrap();

    let out = handle.take();
    let record = out[0].to_record_batch(node.output_names()).unwrap();
    assert_eq!(record.num_rows(), 2);
    assert_eq!(record.schema().field(2).name(), "total");
    assert_eq!(
        rows(&out[0]),
        vec![
            vec![Value::String("x".into()), Value::Int64(2), Value::Int64(4)],
            vec![Value::String("y".into()), Value::Int64(2), Value::Int64(12)],
        ]
    );
    assert!(handle.is_empty());
}

#[test]
fn test_literal_argument_is_broadcast() {
    // Contract: a literal argument behaves like a constant column
    let state = ExecState::new(test_registry());
    let plan = BlockingAggregateOperator::new(
        vec![agg(
            "minsum",
            vec![column(0), AggregateArg::Literal(Value::Int64(3))],
        )],
        vec!["capped".to_string()],
    );
    let (mut node, handle) = open_node(&state, &plan, vec![DataType::Int64], vec![DataType::Int64]);
    node.consume_next(&state, &batch(vec![ints(&[1, 5, 2, 9])], true))
        .unwrap();
    assert_eq!(rows(&handle.batches()[0]), vec![vec![Value::Int64(9)]]);
}

#[test]
fn test_each_accumulator_finalized_once() {
    // Contract: the node finalizes every accumulator exactly once
    reset_finalize_calls();
    let state = ExecState::new(test_registry());
    let plan = BlockingAggregateOperator::new(
        vec![agg("counted_sum", vec![column(1)])],
        vec!["total".to_string()],
    )
    .with_groups(vec![ColumnRef::new(0, 0)], vec!["key".to_string()]);
    let (mut node, handle) = open_node(
        &state,
        &plan,
        vec![DataType::String, DataType::Int64],
        vec![DataType::String, DataType::Int64],
    );
    node.consume_next(&state, &batch(vec![strings(&["a", "b", "c", "a"]), ints(&[1, 2, 3, 4])], true))
        .unwrap();
    assert_eq!(finalize_calls(), 3);

    // After end of stream the node refuses input instead of finalizing again.
    let err = node
        .consume_next(&state, &batch(vec![strings(&["a"]), ints(&[1])], true))
        .unwrap_err();
    assert!(matches!(err, VexecError::InvalidState(_)));
    node.close(&state).unwrap();
    assert_eq!(finalize_calls(), 3);
    assert_eq!(handle.len(), 1);
}

#[test]
fn test_empty_input_ungrouped_emits_initial_result() {
    // Contract: without groups, an empty stream still yields one row
    let state = ExecState::new(test_registry());
    let plan = BlockingAggregateOperator::new(
        vec![agg("sum", vec![column(0)])],
        vec!["total".to_string()],
    );
    let (mut node, handle) = open_node(&state, &plan, vec![DataType::Int64], vec![DataType::Int64]);
    node.consume_next(&state, &batch(vec![ints(&[])], true)).unwrap();
    assert_eq!(rows(&handle.batches()[0]), vec![vec![Value::Int64(0)]]);
}

#[test]
fn test_empty_input_grouped_emits_empty_batch() {
    // Contract: with groups, an empty stream yields one batch with zero rows
    let state = ExecState::new(test_registry());
    let plan = BlockingAggregateOperator::new(
        vec![agg("sum", vec![column(1)])],
        vec!["total".to_string()],
    )
    .with_groups(vec![ColumnRef::new(0, 0)], vec!["key".to_string()]);
    let (mut node, handle) = open_node(
        &state,
        &plan,
        vec![DataType::String, DataType::Int64],
        vec![DataType::String, DataType::Int64],
    );
    node.consume_next(&state, &batch(vec![strings(&[]), ints(&[])], true))
        .unwrap();
    let out = handle.batches();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].num_rows(), 0);
    assert!(out[0].eos());
}

#[test]
fn test_init_rejects_unknown_function_and_bad_types() {
    // Contract: plan errors surface at init, not during execution
    let state = ExecState::new(test_registry());
    let input = [RowDescriptor::new(vec![DataType::Int64])];

    let unknown = BlockingAggregateOperator::new(
        vec![agg("median", vec![column(0)])],
        vec!["m".to_string()],
    );
    assert!(matches!(
        BlockingAggNode::new().init(&state, &unknown, &RowDescriptor::new(vec![DataType::Int64]), &input),
        Err(VexecError::UnknownFunction(_))
    ));

    let mismatched = BlockingAggregateOperator::new(
        vec![agg("count", vec![column(0)])],
        vec!["n".to_string()],
    );
    assert!(matches!(
        BlockingAggNode::new().init(&state, &mismatched, &RowDescriptor::new(vec![DataType::Int64]), &input),
        Err(VexecError::SignatureMismatch(_))
    ));

    let out_of_range = BlockingAggregateOperator::new(
        vec![agg("sum", vec![column(4)])],
        vec!["s".to_string()],
    );
    assert!(matches!(
        BlockingAggNode::new().init(&state, &out_of_range, &RowDescriptor::new(vec![DataType::Int64]), &input),
        Err(VexecError::ColumnOutOfBounds { index: 4, len: 1 })
    ));

    let sum = BlockingAggregateOperator::new(
        vec![agg("sum", vec![column(0)])],
        vec!["s".to_string()],
    );
    assert!(matches!(
        BlockingAggNode::new().init(&state, &sum, &RowDescriptor::new(vec![]), &input),
        Err(VexecError::ArityMismatch { expected: 1, actual: 0 })
    ));
    assert!(matches!(
        BlockingAggNode::new().init(&state, &sum, &RowDescriptor::new(vec![DataType::Int64]), &[]),
        Err(VexecError::PlanError(_))
    ));
}

#[test]
fn test_lifecycle_order_is_enforced() {
    // Contract: prepare, open, and consume are only valid in order
    let state = ExecState::new(test_registry());
    let plan = BlockingAggregateOperator::new(
        vec![agg("sum", vec![column(0)])],
        vec!["total".to_string()],
    );
    let mut node = BlockingAggNode::new();
    node.add_child(Box::new(CollectSink::new()));
    assert!(matches!(node.prepare(&state), Err(VexecError::InvalidState(_))));

    node.init(
        &state,
        &plan,
        &RowDescriptor::new(vec![DataType::Int64]),
        &[RowDescriptor::new(vec![DataType::Int64])],
    )
    .unwrap();
    assert!(matches!(node.open(&state), Err(VexecError::InvalidState(_))));
    node.prepare(&state).unwrap();
    assert!(matches!(
        node.consume_next(&state, &batch(vec![ints(&[1])], true)),
        Err(VexecError::InvalidState(_))
    ));
    node.open(&state).unwrap();
    node.close(&state).unwrap();
    assert!(matches!(node.close(&state), Err(VexecError::InvalidState(_))));
}

#[test]
fn test_batch_with_wrong_descriptor_is_rejected() {
    // Contract: input batches must match the input descriptor
    let state = ExecState::new(test_registry());
    let plan = BlockingAggregateOperator::new(
        vec![agg("sum", vec![column(0)])],
        vec!["total".to_string()],
    );
    let (mut node, handle) = open_node(&state, &plan, vec![DataType::Int64], vec![DataType::Int64]);
    let err = node
        .consume_next(&state, &batch(vec![strings(&["a"])], true))
        .unwrap_err();
    assert!(matches!(err, VexecError::TypeError { .. }));
    assert!(handle.is_empty());
}

#[test]
fn test_aggregate_error_propagates() {
    // Contract: an update failure aborts the batch and reaches the caller
    let state = ExecState::new(test_registry());
    let plan = BlockingAggregateOperator::new(
        vec![agg("checked_sum", vec![column(0)])],
        vec!["total".to_string()],
    );
    let (mut node, handle) = open_node(&state, &plan, vec![DataType::Int64], vec![DataType::Int64]);
    let err = node
        .consume_next(&state, &batch(vec![ints(&[1, -1])], true))
        .unwrap_err();
    assert!(matches!(err, VexecError::ExecutionError(_)));
    assert!(handle.is_empty());
}

struct FailingSink;

impl ExecNode for FailingSink {
    fn name(&self) -> &'static str {
        "FailingSink"
    }

    fn add_child(&mut self, _child: Box<dyn ExecNode>) {}

    fn prepare(&mut self, _state: &ExecState) -> Result<()> {
        Ok(())
    }

    fn open(&mut self, _state: &ExecState) -> Result<()> {
        Ok(())
    }

    fn consume_next(&mut self, _state: &ExecState, _batch: &RowBatch) -> Result<()> {
        Err(VexecError::ExecutionError("sink is full".into()))
    }

    fn close(&mut self, _state: &ExecState) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_child_error_propagates_unchanged() {
    // Contract: a child's consume error is returned to the driver as is
    let state = ExecState::new(test_registry());
    let plan = BlockingAggregateOperator::new(
        vec![agg("sum", vec![column(0)])],
        vec!["total".to_string()],
    );
    let mut node = BlockingAggNode::new();
    node.add_child(Box::new(FailingSink));
    node.init(
        &state,
        &plan,
        &RowDescriptor::new(vec![DataType::Int64]),
        &[RowDescriptor::new(vec![DataType::Int64])],
    )
    .unwrap();
    node.prepare(&state).unwrap();
    node.open(&state).unwrap();
    let err = node
        .consume_next(&state, &batch(vec![ints(&[1, 2])], true))
        .unwrap_err();
    assert_eq!(err.to_string(), "Execution error: sink is full");
}
