//! User-defined aggregates and their accumulator executor.

use std::any::Any;
use std::fmt;

use arrow::array::{Array, ArrayRef};

use crate::column::{ColumnBuffer, ColumnBuilder};
use crate::error::{Result, VexecError};
use crate::exec::SelectionVector;
use crate::types::{ArgList, DataType, UdfValue, Value};
use crate::udf::scalar::{check_input_rows, downcast_builder, write_arg_types};
use crate::udf::FunctionContext;

/// A user-defined aggregate.
///
/// A fresh instance is created per group. `update` folds one row into the
/// state, `merge` folds another partial state of the same aggregate, and
/// `finalize` consumes the state to produce the result.
pub trait Uda: Send + 'static {
    /// Ordered update argument types.
    type Args: ArgList;
    /// Finalize result type.
    type Output: UdfValue;

    /// Folds one row into the state.
    ///
    /// # Errors
    ///
    /// Any error aborts the batch being consumed.
    fn update(&mut self, ctx: &FunctionContext, args: Self::Args) -> Result<()>;

    /// Folds another partial state into this one.
    ///
    /// # Errors
    ///
    /// Any error aborts the merge.
    fn merge(&mut self, ctx: &FunctionContext, other: &Self) -> Result<()>;

    /// Produces the result, consuming the state.
    fn finalize(self, ctx: &FunctionContext) -> Self::Output;
}

/// Update argument types and finalize type of an aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateSignature {
    /// Ordered update argument types.
    pub update_arg_types: Vec<DataType>,
    /// Finalize result type.
    pub finalize_return_type: DataType,
}

impl AggregateSignature {
    /// Derives the signature from an aggregate's associated types.
    #[must_use]
    pub fn of<U: Uda>() -> Self {
        AggregateSignature {
            update_arg_types: U::Args::data_types(),
            finalize_return_type: <U::Output as UdfValue>::DATA_TYPE,
        }
    }
}

impl fmt::Display for AggregateSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_arg_types(f, &self.update_arg_types)?;
        write!(f, " -> {}", self.finalize_return_type)
    }
}

/// Type-erased state of one aggregate instance.
///
/// Finalizing consumes the accumulator, so a state cannot be finalized twice.
pub trait Accumulator: Send {
    /// Returns the finalize result type.
    fn return_type(&self) -> DataType;

    /// Folds the first `count` rows of `inputs` in row order.
    ///
    /// # Errors
    ///
    /// Returns `ArityMismatch` or `TypeError` if the inputs do not match the
    /// update signature, `InsufficientRows` if an input is shorter than
    /// `count`, or the aggregate's own error.
    fn update_arrow(
        &mut self,
        ctx: &FunctionContext,
        inputs: &[ArrayRef],
        count: usize,
    ) -> Result<()>;

    /// Folds the selected rows of `inputs` in selection order.
    ///
    /// # Errors
    ///
    /// As [`Accumulator::update_arrow`], with `ColumnOutOfBounds` if a
    /// selected row is past the end of an input.
    fn update_arrow_selected(
        &mut self,
        ctx: &FunctionContext,
        inputs: &[ArrayRef],
        rows: &SelectionVector,
    ) -> Result<()>;

    /// Folds the first `count` rows of column buffers in row order.
    ///
    /// # Errors
    ///
    /// As [`Accumulator::update_arrow`].
    fn update(
        &mut self,
        ctx: &FunctionContext,
        inputs: &[&ColumnBuffer],
        count: usize,
    ) -> Result<()>;

    /// Folds another partial state into this one.
    ///
    /// # Errors
    ///
    /// Returns `TypeError` if `other` is a different aggregate, or the
    /// aggregate's own error.
    fn merge(&mut self, ctx: &FunctionContext, other: &dyn Accumulator) -> Result<()>;

    /// Appends the result to `output`.
    ///
    /// # Errors
    ///
    /// Returns `TypeError` if `output` builds a different type, or
    /// `MemoryLimitExceeded` if it cannot be reserved.
    fn finalize_arrow(
        self: Box<Self>,
        ctx: &FunctionContext,
        output: &mut dyn ColumnBuilder,
    ) -> Result<()>;

    /// Stores the result in `output`.
    ///
    /// # Errors
    ///
    /// Returns `TypeError` if `output` carries a different tag.
    fn finalize_value(self: Box<Self>, ctx: &FunctionContext, output: &mut Value) -> Result<()>;

    /// Upcasts for downcasting in [`Accumulator::merge`].
    fn as_any(&self) -> &dyn Any;
}

/// Adapts a [`Uda`] to [`Accumulator`].
pub struct UdaWrapper<U: Uda> {
    uda: U,
}

impl<U: Uda> UdaWrapper<U> {
    /// Wraps an aggregate state.
    pub fn new(uda: U) -> Self {
        UdaWrapper { uda }
    }

    /// Borrows the wrapped state.
    pub fn uda(&self) -> &U {
        &self.uda
    }
}

impl<U: Uda> fmt::Debug for UdaWrapper<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdaWrapper")
            .field("uda", &std::any::type_name::<U>())
            .finish()
    }
}

impl<U: Uda> Accumulator for UdaWrapper<U> {
    fn return_type(&self) -> DataType {
        <U::Output as UdfValue>::DATA_TYPE
    }

    fn update_arrow(
        &mut self,
        ctx: &FunctionContext,
        inputs: &[ArrayRef],
        count: usize,
    ) -> Result<()> {
        let args = U::Args::bind_arrays(inputs)?;
        check_input_rows(inputs.iter().map(|a| a.len()), count)?;
        for idx in 0..count {
            self.uda.update(ctx, U::Args::read_arrays(&args, idx))?;
        }
        Ok(())
    }

    fn update_arrow_selected(
        &mut self,
        ctx: &FunctionContext,
        inputs: &[ArrayRef],
        rows: &SelectionVector,
    ) -> Result<()> {
        let args = U::Args::bind_arrays(inputs)?;
        if let Some(max) = rows.iter().max() {
            let len = inputs.iter().map(|a| a.len()).min().unwrap_or(0);
            if max >= len {
                return Err(VexecError::ColumnOutOfBounds { index: max, len });
            }
        }
        for idx in rows.iter() {
            self.uda.update(ctx, U::Args::read_arrays(&args, idx))?;
        }
        Ok(())
    }

    fn update(
        &mut self,
        ctx: &FunctionContext,
        inputs: &[&ColumnBuffer],
        count: usize,
    ) -> Result<()> {
        let args = U::Args::bind_buffers(inputs)?;
        check_input_rows(inputs.iter().map(|c| c.len()), count)?;
        for idx in 0..count {
            self.uda.update(ctx, U::Args::read_slices(&args, idx))?;
        }
        Ok(())
    }

    fn merge(&mut self, ctx: &FunctionContext, other: &dyn Accumulator) -> Result<()> {
        let other = other
            .as_any()
            .downcast_ref::<UdaWrapper<U>>()
            .ok_or_else(|| {
                VexecError::type_error(std::any::type_name::<U>(), "a different aggregate")
            })?;
        self.uda.merge(ctx, &other.uda)
    }

    fn finalize_arrow(
        self: Box<Self>,
        ctx: &FunctionContext,
        output: &mut dyn ColumnBuilder,
    ) -> Result<()> {
        let out = downcast_builder::<U::Output>(output)?;
        let res = self.uda.finalize(ctx);
        out.reserve(1)?;
        if !<U::Output as UdfValue>::DATA_TYPE.is_fixed_width() {
            let total = out.data_len() + res.byte_len();
            out.reserve_data(total)?;
        }
        res.append_to(out);
        Ok(())
    }

    fn finalize_value(self: Box<Self>, ctx: &FunctionContext, output: &mut Value) -> Result<()> {
        let expected = <U::Output as UdfValue>::DATA_TYPE;
        if output.data_type() != expected {
            return Err(VexecError::type_error(expected, output.data_type()));
        }
        *output = self.uda.finalize(ctx).into_value();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
