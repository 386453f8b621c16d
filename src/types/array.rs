//! Tag-checked views over arrow arrays.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, Time64NanosecondArray,
};

use crate::error::{Result, VexecError};
use crate::types::{DataType, Value};

/// A borrowed arrow array resolved to its concrete type.
///
/// Resolving costs one downcast; reading values afterwards is infallible,
/// which lets callers validate a column once per batch and then iterate rows.
/// Validity bitmaps are not interpreted.
#[derive(Debug, Clone, Copy)]
pub enum ArrayView<'a> {
    /// Boolean array.
    Boolean(&'a BooleanArray),
    /// 64-bit integer array.
    Int64(&'a Int64Array),
    /// 64-bit float array.
    Float64(&'a Float64Array),
    /// UTF-8 string array.
    String(&'a StringArray),
    /// Nanosecond time array.
    Time64Ns(&'a Time64NanosecondArray),
}

fn downcast<'a, A: Array + 'static>(array: &'a dyn Array, data_type: DataType) -> Result<&'a A> {
    array
        .as_any()
        .downcast_ref::<A>()
        .ok_or_else(|| VexecError::type_error(data_type, array.data_type()))
}

impl<'a> ArrayView<'a> {
    /// Resolves an array by its arrow data type.
    ///
    /// # Errors
    ///
    /// Returns `TypeError` if the arrow type has no logical counterpart.
    pub fn try_new(array: &'a dyn Array) -> Result<Self> {
        let data_type = DataType::from_arrow(array.data_type())
            .ok_or_else(|| VexecError::type_error("a supported type", array.data_type()))?;
        Self::with_type(array, data_type)
    }

    /// Resolves an array that is expected to be of `data_type`.
    ///
    /// # Errors
    ///
    /// Returns `TypeError` if the array is of a different type.
    pub fn with_type(array: &'a dyn Array, data_type: DataType) -> Result<Self> {
        Ok(match data_type {
            DataType::Boolean => ArrayView::Boolean(downcast(array, data_type)?),
            DataType::Int64 => ArrayView::Int64(downcast(array, data_type)?),
            DataType::Float64 => ArrayView::Float64(downcast(array, data_type)?),
            DataType::String => ArrayView::String(downcast(array, data_type)?),
            DataType::Time64Ns => ArrayView::Time64Ns(downcast(array, data_type)?),
        })
    }

    /// Returns the logical type of the array.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            ArrayView::Boolean(_) => DataType::Boolean,
            ArrayView::Int64(_) => DataType::Int64,
            ArrayView::Float64(_) => DataType::Float64,
            ArrayView::String(_) => DataType::String,
            ArrayView::Time64Ns(_) => DataType::Time64Ns,
        }
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ArrayView::Boolean(a) => a.len(),
            ArrayView::Int64(a) => a.len(),
            ArrayView::Float64(a) => a.len(),
            ArrayView::String(a) => a.len(),
            ArrayView::Time64Ns(a) => a.len(),
        }
    }

    /// Returns true if the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads the element at `idx` as an erased value.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= len`, like the underlying arrow accessors.
    #[must_use]
    pub fn value(&self, idx: usize) -> Value {
        match self {
            ArrayView::Boolean(a) => Value::Boolean(a.value(idx)),
            ArrayView::Int64(a) => Value::Int64(a.value(idx)),
            ArrayView::Float64(a) => Value::Float64(a.value(idx)),
            ArrayView::String(a) => Value::String(a.value(idx).to_string()),
            ArrayView::Time64Ns(a) => Value::Time64Ns(a.value(idx)),
        }
    }
}

/// Builds an array holding `value` repeated `len` times.
#[must_use]
pub fn repeat_value(value: &Value, len: usize) -> ArrayRef {
    match value {
        Value::Boolean(v) => Arc::new(BooleanArray::from(vec![*v; len])),
        Value::Int64(v) => Arc::new(Int64Array::from(vec![*v; len])),
        Value::Float64(v) => Arc::new(Float64Array::from(vec![*v; len])),
        Value::String(v) => Arc::new(StringArray::from(vec![v.as_str(); len])),
        Value::Time64Ns(v) => Arc::new(Time64NanosecondArray::from(vec![*v; len])),
    }
}
