//! Contract tests for the scalar function executor.
//!
//! These tests verify:
//! - Both execution paths produce the same results
//! - Exactly `count` results are produced
//! - String output grows past the seeded reservation

use arrow::array::Array;

use vexec::column::{ColumnBuffer, ColumnBuilder, Int64ColumnBuilder, StringColumnBuilder};
use vexec::udf::ScalarUdfWrapper;
use vexec::{
    DataType, ExecConfig, FunctionContext, Int64Value, ScalarUdfExecutor, StringValue, Value,
    VexecError,
};

use crate::common::{ints, strings, test_registry, AddUdf, IdentityUdf, RepeatUdf};

#[test]
fn test_arrow_and_buffer_paths_agree() {
    // Contract: exec_batch_arrow and exec_batch compute identical values
    let ctx = FunctionContext::default();
    let exec = ScalarUdfWrapper::new(AddUdf);
    let a = [3, -1, 7, 0];
    let b = [4, 1, -7, 9];

    let mut builder = Int64ColumnBuilder::new();
    exec.exec_batch_arrow(&ctx, &[ints(&a), ints(&b)], &mut builder, 4)
        .unwrap();

    let left = ColumnBuffer::from_array(ints(&a).as_ref()).unwrap();
    let right = ColumnBuffer::from_array(ints(&b).as_ref()).unwrap();
    let mut out = ColumnBuffer::new(DataType::Int64, 4);
    exec.exec_batch(&ctx, &[&left, &right], &mut out, 4).unwrap();

    let arrow_out = builder.finish().unwrap();
    assert_eq!(arrow_out.as_ref(), out.to_array().as_ref());
}

#[test]
fn test_resolved_executor_runs_through_registry() {
    // Contract: an executor instantiated from the registry runs like the wrapper
    let registry = test_registry();
    let def = registry
        .scalar("repeat", &[DataType::String, DataType::Int64])
        .unwrap();
    let exec = def.instantiate();
    let mut builder = DataType::String.new_builder(None);
    exec.exec_batch_arrow(
        &FunctionContext::default(),
        &[strings(&["ab", "c"]), ints(&[2, 3])],
        builder.as_mut(),
        2,
    )
    .unwrap();
    let array = builder.finish().unwrap();
    assert_eq!(array.len(), 2);
    let expected = ColumnBuffer::from_values(vec![StringValue::from("abab"), StringValue::from("ccc")]);
    assert_eq!(array.as_ref(), expected.to_array().as_ref());
}

#[test]
fn test_zero_count_produces_nothing() {
    // Contract: count = 0 appends nothing and succeeds on empty inputs
    let exec = ScalarUdfWrapper::new(AddUdf);
    let mut builder = Int64ColumnBuilder::new();
    exec.exec_batch_arrow(&FunctionContext::default(), &[ints(&[]), ints(&[])], &mut builder, 0)
        .unwrap();
    assert!(builder.is_empty());
}

#[test]
fn test_wrong_input_type_is_rejected_before_any_output() {
    // Contract: a tag mismatch on any input fails the batch without appending
    let exec = ScalarUdfWrapper::new(AddUdf);
    let mut builder = Int64ColumnBuilder::new();
    let err = exec
        .exec_batch_arrow(
            &FunctionContext::default(),
            &[ints(&[1]), strings(&["x"])],
            &mut builder,
            1,
        )
        .unwrap_err();
    assert!(matches!(err, VexecError::TypeError { .. }));
    assert!(builder.is_empty());
}

#[test]
fn test_wrong_arity_is_rejected() {
    // Contract: the number of inputs must equal the signature's arity
    let exec = ScalarUdfWrapper::new(AddUdf);
    let mut builder = Int64ColumnBuilder::new();
    let err = exec
        .exec_batch_arrow(&FunctionContext::default(), &[ints(&[1])], &mut builder, 1)
        .unwrap_err();
    assert!(matches!(
        err,
        VexecError::ArityMismatch {
            expected: 2,
            actual: 1
        }
    ));
}

#[test]
fn test_string_reservation_doubles() {
    // Contract: data reservations grow geometrically, not once per row
    let exec = ScalarUdfWrapper::new(IdentityUdf);
    let row = "x".repeat(25);
    let input: Vec<&str> = vec![row.as_str(); 64];
    let mut builder = StringColumnBuilder::new();
    exec.exec_batch_arrow(&FunctionContext::default(), &[strings(&input)], &mut builder, 64)
        .unwrap();
    assert_eq!(builder.len(), 64);
    assert_eq!(builder.data_len(), 25 * 64);
    // seed 640 bytes, then 1280, then 2560
    assert_eq!(builder.data_reservations(), 3);
    assert!(builder.data_capacity() <= 2 * builder.data_len());
}

#[test]
fn test_string_size_hint_comes_from_context() {
    // Contract: the seed reservation is count * string_size_hint
    let ctx = FunctionContext::new(&ExecConfig::new().with_string_size_hint(100));
    let exec = ScalarUdfWrapper::new(IdentityUdf);
    let mut builder = StringColumnBuilder::new();
    exec.exec_batch_arrow(&ctx, &[strings(&["a", "b", "c"])], &mut builder, 3)
        .unwrap();
    assert_eq!(builder.data_capacity(), 300);
    assert_eq!(builder.data_reservations(), 1);
}

#[test]
fn test_memory_limit_aborts_and_keeps_appended_rows() {
    // Contract: a failed reservation aborts the batch; earlier rows stay appended
    let exec = ScalarUdfWrapper::new(RepeatUdf);
    let ctx = FunctionContext::new(&ExecConfig::new().with_string_size_hint(1));
    let mut builder = StringColumnBuilder::new().with_memory_limit(Some(64));
    let err = exec
        .exec_batch_arrow(
            &ctx,
            &[strings(&["a", "b", "c"]), ints(&[4, 4, 100])],
            &mut builder,
            3,
        )
        .unwrap_err();
    assert!(matches!(err, VexecError::MemoryLimitExceeded { limit: 64, .. }));
    assert_eq!(builder.len(), 2);
    assert_eq!(builder.value(1), Some("bbbb"));
}

#[test]
fn test_memory_limit_applies_to_bytes_written_not_estimate() {
    // Contract: output that fits under the limit succeeds even when the
    // size-hint estimate alone would not fit
    let words: Vec<&str> = vec!["x"; 100];
    let exec = ScalarUdfWrapper::new(IdentityUdf);
    let mut batch_builder = StringColumnBuilder::new().with_memory_limit(Some(1000));
    exec.exec_batch_arrow(
        &FunctionContext::default(),
        &[strings(&words)],
        &mut batch_builder,
        words.len(),
    )
    .unwrap();
    assert_eq!(batch_builder.len(), 100);
    assert_eq!(batch_builder.data_len(), 100);
    assert!(batch_builder.data_capacity() <= 1000 - 4 * 101);

    // Same result as appending the values one at a time
    let mut row_builder = StringColumnBuilder::new().with_memory_limit(Some(1000));
    for word in &words {
        row_builder.append_value(&Value::String((*word).to_string())).unwrap();
    }
    assert_eq!(
        batch_builder.finish().unwrap().as_ref(),
        row_builder.finish().unwrap().as_ref()
    );
}

#[test]
fn test_huge_size_hint_does_not_overflow() {
    // Contract: the seed estimate saturates instead of wrapping
    let ctx = FunctionContext::new(&ExecConfig::new().with_string_size_hint(usize::MAX));
    let exec = ScalarUdfWrapper::new(IdentityUdf);
    let mut builder = StringColumnBuilder::new().with_memory_limit(Some(256));
    exec.exec_batch_arrow(&ctx, &[strings(&["ab", "cd"])], &mut builder, 2)
        .unwrap();
    assert_eq!(builder.value(1), Some("cd"));
    assert!(builder.data_capacity() <= 256);
}

#[test]
fn test_buffer_path_fills_only_count_slots() {
    // Contract: exec_batch writes slots [0, count) and leaves the rest untouched
    let exec = ScalarUdfWrapper::new(AddUdf);
    let a = ColumnBuffer::from_values(vec![Int64Value(1), Int64Value(2), Int64Value(3)]);
    let mut out = ColumnBuffer::from_values(vec![Int64Value(-1); 3]);
    exec.exec_batch(&FunctionContext::default(), &[&a, &a], &mut out, 2)
        .unwrap();
    assert_eq!(out.get(0), Some(Value::Int64(2)));
    assert_eq!(out.get(1), Some(Value::Int64(4)));
    assert_eq!(out.get(2), Some(Value::Int64(-1)));
}
