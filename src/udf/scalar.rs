//! Scalar functions and their batch executor.
//!
//! A [`ScalarUdf`] maps one row of typed arguments to one typed result. The
//! executor lifts it to whole columns: input tags are checked once and the
//! output is reserved up front, so the per-row loop never branches on types.
//! String arguments are still copied into an owned
//! [`StringValue`](crate::types::StringValue) per row.

use std::fmt;

use arrow::array::{Array, ArrayRef};
use tracing::trace;

use crate::column::{ColumnBuffer, ColumnBuilder};
use crate::error::{Result, VexecError};
use crate::types::{ArgList, DataType, UdfValue};
use crate::udf::FunctionContext;

/// A user-defined scalar function.
///
/// `exec` is a pure computation over one row; the argument and result types
/// are fixed by the associated types and become the registered signature.
pub trait ScalarUdf: Send + Sync + 'static {
    /// Ordered argument types.
    type Args: ArgList;
    /// Result type.
    type Output: UdfValue;

    /// Computes the result for one row.
    fn exec(&self, ctx: &FunctionContext, args: Self::Args) -> Self::Output;
}

/// Argument and return types of a scalar function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScalarSignature {
    /// Ordered argument types.
    pub arg_types: Vec<DataType>,
    /// Result type.
    pub return_type: DataType,
}

impl ScalarSignature {
    /// Derives the signature from a function's associated types.
    #[must_use]
    pub fn of<F: ScalarUdf>() -> Self {
        ScalarSignature {
            arg_types: F::Args::data_types(),
            return_type: <F::Output as UdfValue>::DATA_TYPE,
        }
    }
}

impl fmt::Display for ScalarSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_arg_types(f, &self.arg_types)?;
        write!(f, " -> {}", self.return_type)
    }
}

pub(crate) fn write_arg_types(f: &mut fmt::Formatter<'_>, arg_types: &[DataType]) -> fmt::Result {
    write!(f, "(")?;
    for (i, dt) in arg_types.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{dt}")?;
    }
    write!(f, ")")
}

/// Type-erased batch executor for a scalar function.
pub trait ScalarUdfExecutor: Send + Sync {
    /// Returns the function's signature.
    fn signature(&self) -> &ScalarSignature;

    /// Evaluates the first `count` rows of `inputs`, appending one result per
    /// row to `output`.
    ///
    /// # Errors
    ///
    /// Returns `ArityMismatch` or `TypeError` if the inputs do not match the
    /// signature, `TypeError` if `output` builds a different type,
    /// `InsufficientRows` if an input is shorter than `count`, and
    /// `MemoryLimitExceeded` if the output cannot be reserved. Results
    /// appended before a reservation failure stay in `output`.
    fn exec_batch_arrow(
        &self,
        ctx: &FunctionContext,
        inputs: &[ArrayRef],
        output: &mut dyn ColumnBuilder,
        count: usize,
    ) -> Result<()>;

    /// Evaluates the first `count` rows of `inputs`, writing the result of
    /// row `i` into slot `i` of `output`.
    ///
    /// # Errors
    ///
    /// Returns `ArityMismatch` or `TypeError` if the inputs do not match the
    /// signature, `TypeError` if `output` is tagged with a different type,
    /// `InsufficientRows` if an input is shorter than `count`, and
    /// `ColumnOutOfBounds` if `output` has fewer than `count` slots.
    fn exec_batch(
        &self,
        ctx: &FunctionContext,
        inputs: &[&ColumnBuffer],
        output: &mut ColumnBuffer,
        count: usize,
    ) -> Result<()>;
}

pub(crate) fn check_input_rows(
    lens: impl IntoIterator<Item = usize>,
    count: usize,
) -> Result<()> {
    for (column, len) in lens.into_iter().enumerate() {
        if len < count {
            return Err(VexecError::InsufficientRows { column, len, count });
        }
    }
    Ok(())
}

pub(crate) fn downcast_builder<T: UdfValue>(output: &mut dyn ColumnBuilder) -> Result<&mut T::Builder> {
    let actual = output.data_type();
    output
        .as_any_mut()
        .downcast_mut::<T::Builder>()
        .ok_or_else(|| VexecError::type_error(format!("{} output", T::DATA_TYPE), actual))
}

/// Adapts a [`ScalarUdf`] to [`ScalarUdfExecutor`].
pub struct ScalarUdfWrapper<F: ScalarUdf> {
    udf: F,
    signature: ScalarSignature,
}

impl<F: ScalarUdf> ScalarUdfWrapper<F> {
    /// Wraps a function instance.
    pub fn new(udf: F) -> Self {
        ScalarUdfWrapper {
            udf,
            signature: ScalarSignature::of::<F>(),
        }
    }

    /// Borrows the wrapped function.
    pub fn udf(&self) -> &F {
        &self.udf
    }
}

impl<F: ScalarUdf> fmt::Debug for ScalarUdfWrapper<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarUdfWrapper")
            .field("udf", &std::any::type_name::<F>())
            .field("signature", &self.signature)
            .finish()
    }
}

/// Data bytes to reserve for an estimate of `reserved` bytes past `base`,
/// capped at the builder's budget but never below the `needed` bytes.
fn data_target(out: &dyn ColumnBuilder, base: usize, reserved: usize, needed: usize) -> usize {
    let wanted = base.saturating_add(reserved);
    match out.data_budget() {
        Some(budget) => wanted.min(budget.max(base + needed)),
        None => wanted,
    }
}

impl<F: ScalarUdf> ScalarUdfExecutor for ScalarUdfWrapper<F> {
    fn signature(&self) -> &ScalarSignature {
        &self.signature
    }

    fn exec_batch_arrow(
        &self,
        ctx: &FunctionContext,
        inputs: &[ArrayRef],
        output: &mut dyn ColumnBuilder,
        count: usize,
    ) -> Result<()> {
        let args = F::Args::bind_arrays(inputs)?;
        check_input_rows(inputs.iter().map(|a| a.len()), count)?;
        let out = downcast_builder::<F::Output>(output)?;
        out.reserve(count)?;

        let variable_width = !<F::Output as UdfValue>::DATA_TYPE.is_fixed_width();
        let base = out.data_len();
        let mut reserved = 0usize;
        let mut total = 0usize;
        if variable_width {
            reserved = count.saturating_mul(ctx.string_size_hint());
            let target = data_target(out, base, reserved, 0);
            out.reserve_data(target)?;
        }

        for idx in 0..count {
            let res = self.udf.exec(ctx, F::Args::read_arrays(&args, idx));
            if variable_width {
                total += res.byte_len();
                if base + total > out.data_capacity() {
                    while total > reserved {
                        reserved = reserved.max(1).saturating_mul(2);
                    }
                    trace!(row = idx, reserved, "growing string output");
                    let target = data_target(out, base, reserved, total);
                    out.reserve_data(target)?;
                }
            }
            res.append_to(out);
        }
        Ok(())
    }

    fn exec_batch(
        &self,
        ctx: &FunctionContext,
        inputs: &[&ColumnBuffer],
        output: &mut ColumnBuffer,
        count: usize,
    ) -> Result<()> {
        let args = F::Args::bind_buffers(inputs)?;
        check_input_rows(inputs.iter().map(|c| c.len()), count)?;
        let len = output.len();
        if len < count {
            return Err(VexecError::ColumnOutOfBounds {
                index: count - 1,
                len,
            });
        }
        let out = output.as_mut_slice::<F::Output>()?;
        for (idx, slot) in out.iter_mut().take(count).enumerate() {
            *slot = self.udf.exec(ctx, F::Args::read_slices(&args, idx));
        }
        Ok(())
    }
}
