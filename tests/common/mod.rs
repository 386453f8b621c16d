//! Shared fixtures: test functions, registries, and batch helpers.

#![allow(dead_code)]

use std::cell::Cell;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int64Array, StringArray};
use tracing_subscriber::EnvFilter;

use vexec::types::ArrayView;
use vexec::{
    DataType, FunctionContext, FunctionRegistry, Int64Value, Result, RowBatch, RowDescriptor,
    ScalarUdf, StringValue, Uda, Value,
};

/// Installs a test-writer subscriber once per test binary; `RUST_LOG` controls output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Scalar functions
// =============================================================================

#[derive(Default)]
pub struct AddUdf;

impl ScalarUdf for AddUdf {
    type Args = (Int64Value, Int64Value);
    type Output = Int64Value;

    fn exec(&self, _ctx: &FunctionContext, (a, b): Self::Args) -> Int64Value {
        Int64Value(a.0 + b.0)
    }
}

/// Repeats a string `n` times.
#[derive(Default)]
pub struct RepeatUdf;

impl ScalarUdf for RepeatUdf {
    type Args = (StringValue, Int64Value);
    type Output = StringValue;

    fn exec(&self, _ctx: &FunctionContext, (s, n): Self::Args) -> StringValue {
        StringValue(s.as_str().repeat(n.0.max(0) as usize))
    }
}

/// Returns its string argument unchanged.
#[derive(Default)]
pub struct IdentityUdf;

impl ScalarUdf for IdentityUdf {
    type Args = (StringValue,);
    type Output = StringValue;

    fn exec(&self, _ctx: &FunctionContext, (s,): Self::Args) -> StringValue {
        s
    }
}

// =============================================================================
// Aggregates
// =============================================================================

#[derive(Default)]
pub struct SumUda {
    pub sum: i64,
}

impl Uda for SumUda {
    type Args = (Int64Value,);
    type Output = Int64Value;

    fn update(&mut self, _ctx: &FunctionContext, (v,): Self::Args) -> Result<()> {
        self.sum += v.0;
        Ok(())
    }

    fn merge(&mut self, _ctx: &FunctionContext, other: &Self) -> Result<()> {
        self.sum += other.sum;
        Ok(())
    }

    fn finalize(self, _ctx: &FunctionContext) -> Int64Value {
        Int64Value(self.sum)
    }
}

/// Sums the row-wise minimum of two inputs.
#[derive(Default)]
pub struct MinSumUda {
    pub sum: i64,
}

impl Uda for MinSumUda {
    type Args = (Int64Value, Int64Value);
    type Output = Int64Value;

    fn update(&mut self, _ctx: &FunctionContext, (a, b): Self::Args) -> Result<()> {
        self.sum += a.0.min(b.0);
        Ok(())
    }

    fn merge(&mut self, _ctx: &FunctionContext, other: &Self) -> Result<()> {
        self.sum += other.sum;
        Ok(())
    }

    fn finalize(self, _ctx: &FunctionContext) -> Int64Value {
        Int64Value(self.sum)
    }
}

/// Counts update calls.
#[derive(Default)]
pub struct CountUda {
    pub count: i64,
}

impl Uda for CountUda {
    type Args = (StringValue,);
    type Output = Int64Value;

    fn update(&mut self, _ctx: &FunctionContext, _args: Self::Args) -> Result<()> {
        self.count += 1;
        Ok(())
    }

    fn merge(&mut self, _ctx: &FunctionContext, other: &Self) -> Result<()> {
        self.count += other.count;
        Ok(())
    }

    fn finalize(self, _ctx: &FunctionContext) -> Int64Value {
        Int64Value(self.count)
    }
}

/// Collects the maximum string.
#[derive(Default)]
pub struct MaxStringUda {
    pub max: Option<String>,
}

impl Uda for MaxStringUda {
    type Args = (StringValue,);
    type Output = StringValue;

    fn update(&mut self, _ctx: &FunctionContext, (s,): Self::Args) -> Result<()> {
        if self.max.as_deref().map_or(true, |m| s.as_str() > m) {
            self.max = Some(s.into_inner());
        }
        Ok(())
    }

    fn merge(&mut self, ctx: &FunctionContext, other: &Self) -> Result<()> {
        if let Some(m) = &other.max {
            self.update(ctx, (StringValue::from(m.as_str()),))?;
        }
        Ok(())
    }

    fn finalize(self, _ctx: &FunctionContext) -> StringValue {
        StringValue(self.max.unwrap_or_default())
    }
}

thread_local! {
    static FINALIZE_CALLS: Cell<usize> = const { Cell::new(0) };
}

/// Returns how many times [`FinalizeCountingUda`] was finalized on this thread.
pub fn finalize_calls() -> usize {
    FINALIZE_CALLS.with(Cell::get)
}

/// Resets the per-thread finalize counter.
pub fn reset_finalize_calls() {
    FINALIZE_CALLS.with(|c| c.set(0));
}

/// Sum that records every finalize call.
#[derive(Default)]
pub struct FinalizeCountingUda {
    pub sum: i64,
}

impl Uda for FinalizeCountingUda {
    type Args = (Int64Value,);
    type Output = Int64Value;

    fn update(&mut self, _ctx: &FunctionContext, (v,): Self::Args) -> Result<()> {
        self.sum += v.0;
        Ok(())
    }

    fn merge(&mut self, _ctx: &FunctionContext, other: &Self) -> Result<()> {
        self.sum += other.sum;
        Ok(())
    }

    fn finalize(self, _ctx: &FunctionContext) -> Int64Value {
        FINALIZE_CALLS.with(|c| c.set(c.get() + 1));
        Int64Value(self.sum)
    }
}

/// Fails on negative input.
#[derive(Default)]
pub struct CheckedSumUda {
    pub sum: i64,
}

impl Uda for CheckedSumUda {
    type Args = (Int64Value,);
    type Output = Int64Value;

    fn update(&mut self, _ctx: &FunctionContext, (v,): Self::Args) -> Result<()> {
        if v.0 < 0 {
            return Err(vexec::VexecError::ExecutionError(format!(
                "negative input {}",
                v.0
            )));
        }
        self.sum += v.0;
        Ok(())
    }

    fn merge(&mut self, _ctx: &FunctionContext, other: &Self) -> Result<()> {
        self.sum += other.sum;
        Ok(())
    }

    fn finalize(self, _ctx: &FunctionContext) -> Int64Value {
        Int64Value(self.sum)
    }
}

/// Registry holding every fixture function.
pub fn test_registry() -> Arc<FunctionRegistry> {
    let mut registry = FunctionRegistry::new("test");
    registry.register_scalar::<AddUdf>("add").unwrap();
    registry.register_scalar::<RepeatUdf>("repeat").unwrap();
    registry.register_scalar::<IdentityUdf>("identity").unwrap();
    registry.register_uda::<SumUda>("sum").unwrap();
    registry.register_uda::<MinSumUda>("minsum").unwrap();
    registry.register_uda::<CountUda>("count").unwrap();
    registry.register_uda::<MaxStringUda>("max").unwrap();
    registry.register_uda::<FinalizeCountingUda>("counted_sum").unwrap();
    registry.register_uda::<CheckedSumUda>("checked_sum").unwrap();
    Arc::new(registry)
}

// =============================================================================
// Arrays and batches
// =============================================================================

pub fn ints(values: &[i64]) -> ArrayRef {
    Arc::new(Int64Array::from(values.to_vec()))
}

pub fn strings(values: &[&str]) -> ArrayRef {
    Arc::new(StringArray::from(values.to_vec()))
}

/// Builds a complete batch, inferring the descriptor from the columns.
pub fn batch(columns: Vec<ArrayRef>, eos: bool) -> RowBatch {
    let desc = RowDescriptor::new(
        columns
            .iter()
            .map(|c| DataType::from_arrow(c.data_type()).unwrap())
            .collect(),
    );
    let mut batch = RowBatch::with_columns(desc, columns).unwrap();
    batch.set_eos(eos);
    batch
}

/// Reads every row of a batch as erased values.
pub fn rows(batch: &RowBatch) -> Vec<Vec<Value>> {
    let views: Vec<ArrayView<'_>> = batch
        .columns()
        .iter()
        .map(|c| ArrayView::try_new(c.as_ref()).unwrap())
        .collect();
    (0..batch.num_rows())
        .map(|row| views.iter().map(|v| v.value(row)).collect())
        .collect()
}
