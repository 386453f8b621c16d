//! Type-tagged, fixed-length column storage.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, Time64NanosecondArray,
};

use crate::error::{Result, VexecError};
use crate::types::{
    ArrayView, BoolValue, DataType, Float64Value, Int64Value, StringValue, Time64NsValue, UdfValue,
    Value,
};

/// Element storage of a [`ColumnBuffer`], one variant per logical type.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ColumnData {
    Boolean(Vec<BoolValue>),
    Int64(Vec<Int64Value>),
    Float64(Vec<Float64Value>),
    String(Vec<StringValue>),
    Time64Ns(Vec<Time64NsValue>),
}

/// Homogeneous column of values tagged with its logical type.
///
/// Used for intermediate and accumulator-local columns that never need to be
/// a full arrow array. The length is fixed at construction: slots can be
/// overwritten but not added or removed.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBuffer {
    data: ColumnData,
}

impl ColumnBuffer {
    /// Creates a column of `len` zero values of the given type.
    #[must_use]
    pub fn new(data_type: DataType, len: usize) -> Self {
        let data = match data_type {
            DataType::Boolean => ColumnData::Boolean(vec![BoolValue::default(); len]),
            DataType::Int64 => ColumnData::Int64(vec![Int64Value::default(); len]),
            DataType::Float64 => ColumnData::Float64(vec![Float64Value::default(); len]),
            DataType::String => ColumnData::String(vec![StringValue::default(); len]),
            DataType::Time64Ns => ColumnData::Time64Ns(vec![Time64NsValue::default(); len]),
        };
        ColumnBuffer { data }
    }

    /// Creates a column holding exactly the given values.
    #[must_use]
    pub fn from_values<T: UdfValue>(values: Vec<T>) -> Self {
        T::into_column(values)
    }

    pub(crate) fn from_data(data: ColumnData) -> Self {
        ColumnBuffer { data }
    }

    /// Returns the logical type tag.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match &self.data {
            ColumnData::Boolean(_) => DataType::Boolean,
            ColumnData::Int64(_) => DataType::Int64,
            ColumnData::Float64(_) => DataType::Float64,
            ColumnData::String(_) => DataType::String,
            ColumnData::Time64Ns(_) => DataType::Time64Ns,
        }
    }

    /// Returns the number of values in the column.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::String(v) => v.len(),
            ColumnData::Time64Ns(v) => v.len(),
        }
    }

    /// Returns true if the column is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gets a value by row index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        match &self.data {
            ColumnData::Boolean(v) => v.get(index).map(|x| Value::Boolean(x.0)),
            ColumnData::Int64(v) => v.get(index).map(|x| Value::Int64(x.0)),
            ColumnData::Float64(v) => v.get(index).map(|x| Value::Float64(x.0)),
            ColumnData::String(v) => v.get(index).map(|x| Value::String(x.0.clone())),
            ColumnData::Time64Ns(v) => v.get(index).map(|x| Value::Time64Ns(x.0)),
        }
    }

    /// Overwrites the value at `index`.
    ///
    /// # Errors
    ///
    /// Returns `TypeError` if the value's tag differs from the column's, or
    /// `ColumnOutOfBounds` if `index >= len`.
    pub fn set(&mut self, index: usize, value: Value) -> Result<()> {
        let len = self.len();
        if index >= len {
            return Err(VexecError::ColumnOutOfBounds { index, len });
        }
        let expected = self.data_type();
        match (&mut self.data, value) {
            (ColumnData::Boolean(v), Value::Boolean(x)) => v[index] = BoolValue(x),
            (ColumnData::Int64(v), Value::Int64(x)) => v[index] = Int64Value(x),
            (ColumnData::Float64(v), Value::Float64(x)) => v[index] = Float64Value(x),
            (ColumnData::String(v), Value::String(x)) => v[index] = StringValue(x),
            (ColumnData::Time64Ns(v), Value::Time64Ns(x)) => v[index] = Time64NsValue(x),
            (_, value) => {
                return Err(VexecError::type_error(expected, value.data_type()));
            }
        }
        Ok(())
    }

    /// Borrows the elements as `T`.
    ///
    /// # Errors
    ///
    /// Returns `TypeError` if the column is not tagged `T::DATA_TYPE`.
    pub fn as_slice<T: UdfValue>(&self) -> Result<&[T]> {
        T::column(self).ok_or_else(|| VexecError::type_error(T::DATA_TYPE, self.data_type()))
    }

    /// Mutably borrows the elements as `T`.
    ///
    /// # Errors
    ///
    /// Returns `TypeError` if the column is not tagged `T::DATA_TYPE`.
    pub fn as_mut_slice<T: UdfValue>(&mut self) -> Result<&mut [T]> {
        let actual = self.data_type();
        T::column_mut(self).ok_or_else(|| VexecError::type_error(T::DATA_TYPE, actual))
    }

    /// Copies an arrow array into a column buffer.
    ///
    /// # Errors
    ///
    /// Returns `TypeError` if the array's type has no logical counterpart.
    pub fn from_array(array: &dyn Array) -> Result<Self> {
        let view = ArrayView::try_new(array)?;
        let len = view.len();
        let data = match view {
            ArrayView::Boolean(a) => ColumnData::Boolean((0..len).map(|i| BoolValue(a.value(i))).collect()),
            ArrayView::Int64(a) => ColumnData::Int64(a.values().iter().map(|v| Int64Value(*v)).collect()),
            ArrayView::Float64(a) => {
                ColumnData::Float64(a.values().iter().map(|v| Float64Value(*v)).collect())
            }
            ArrayView::String(a) => {
                ColumnData::String((0..len).map(|i| StringValue(a.value(i).to_string())).collect())
            }
            ArrayView::Time64Ns(a) => {
                ColumnData::Time64Ns(a.values().iter().map(|v| Time64NsValue(*v)).collect())
            }
        };
        Ok(ColumnBuffer { data })
    }

    /// Converts the column into an arrow array.
    #[must_use]
    pub fn to_array(&self) -> ArrayRef {
        match &self.data {
            ColumnData::Boolean(v) => {
                Arc::new(BooleanArray::from(v.iter().map(|x| x.0).collect::<Vec<_>>()))
            }
            ColumnData::Int64(v) => Arc::new(Int64Array::from(v.iter().map(|x| x.0).collect::<Vec<_>>())),
            ColumnData::Float64(v) => {
                Arc::new(Float64Array::from(v.iter().map(|x| x.0).collect::<Vec<_>>()))
            }
            ColumnData::String(v) => Arc::new(StringArray::from_iter_values(v.iter().map(StringValue::as_str))),
            ColumnData::Time64Ns(v) => {
                Arc::new(Time64NanosecondArray::from(v.iter().map(|x| x.0).collect::<Vec<_>>()))
            }
        }
    }

    pub(crate) fn data(&self) -> &ColumnData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut ColumnData {
        &mut self.data
    }
}
