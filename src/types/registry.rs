//! Static bindings from logical types to their concrete representations.
//!
//! [`UdfValue`] ties each value newtype to its [`DataType`] tag, the arrow
//! array it is read from, and the builder it is written to. [`ArgList`]
//! lifts that to whole argument tuples, so a function's signature is known
//! at registration time and its input columns can be tag-checked once per
//! batch before the per-row loop runs.

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, Time64NanosecondArray,
};

use crate::column::{
    BooleanColumnBuilder, ColumnBuffer, ColumnBuilder, ColumnData, Float64ColumnBuilder,
    Int64ColumnBuilder, StringColumnBuilder, Time64NsColumnBuilder,
};
use crate::error::{Result, VexecError};
use crate::types::value::{
    BoolValue, Float64Value, Int64Value, StringValue, Time64NsValue, Value,
};
use crate::types::DataType;

mod private {
    pub trait Sealed {}
}

/// A concrete scalar value type with a fixed logical type tag.
///
/// Implemented for exactly one newtype per [`DataType`]; the set is closed.
pub trait UdfValue: private::Sealed + Clone + Send + Sync + Sized + 'static {
    /// Logical type tag of this value type.
    const DATA_TYPE: DataType;
    /// Arrow array holding elements of this type.
    type Array: Array + 'static;
    /// Builder producing arrays of this type.
    type Builder: ColumnBuilder + 'static;

    /// Reads the element at `idx`. The caller guarantees `idx < array.len()`.
    fn value_at(array: &Self::Array, idx: usize) -> Self;

    /// Appends into a builder whose capacity was already reserved.
    fn append_to(self, builder: &mut Self::Builder);

    /// Variable-length payload size in bytes (0 for fixed-width types).
    fn byte_len(&self) -> usize {
        0
    }

    /// Borrows the column's elements if its tag is `DATA_TYPE`.
    fn column(col: &ColumnBuffer) -> Option<&[Self]>;

    /// Mutably borrows the column's elements if its tag is `DATA_TYPE`.
    fn column_mut(col: &mut ColumnBuffer) -> Option<&mut [Self]>;

    /// Wraps owned values into a column tagged `DATA_TYPE`.
    fn into_column(values: Vec<Self>) -> ColumnBuffer;

    /// Erases the concrete type.
    fn into_value(self) -> Value;

    /// Recovers the concrete type if the tag matches.
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_udf_value {
    (
        $value:ident, $variant:ident, $array:ty, $builder:ty,
        |$arr:ident, $idx:ident| $read:expr,
        |$v:ident, $b:ident| $append:expr
    ) => {
        impl private::Sealed for $value {}

        impl UdfValue for $value {
            const DATA_TYPE: DataType = DataType::$variant;
            type Array = $array;
            type Builder = $builder;

            #[inline]
            fn value_at($arr: &Self::Array, $idx: usize) -> Self {
                $read
            }

            #[inline]
            fn append_to(self, $b: &mut Self::Builder) {
                let $v = self;
                $append
            }

            fn column(col: &ColumnBuffer) -> Option<&[Self]> {
                match col.data() {
                    ColumnData::$variant(values) => Some(values),
                    _ => None,
                }
            }

            fn column_mut(col: &mut ColumnBuffer) -> Option<&mut [Self]> {
                match col.data_mut() {
                    ColumnData::$variant(values) => Some(values),
                    _ => None,
                }
            }

            fn into_column(values: Vec<Self>) -> ColumnBuffer {
                ColumnBuffer::from_data(ColumnData::$variant(values))
            }

            fn into_value(self) -> Value {
                Value::$variant(self.0)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some($value(*v)),
                    _ => None,
                }
            }
        }
    };
}

impl_udf_value!(
    BoolValue, Boolean, BooleanArray, BooleanColumnBuilder,
    |arr, idx| BoolValue(arr.value(idx)),
    |v, b| b.append_reserved(v.0)
);
impl_udf_value!(
    Int64Value, Int64, Int64Array, Int64ColumnBuilder,
    |arr, idx| Int64Value(arr.value(idx)),
    |v, b| b.append_reserved(v.0)
);
impl_udf_value!(
    Float64Value, Float64, Float64Array, Float64ColumnBuilder,
    |arr, idx| Float64Value(arr.value(idx)),
    |v, b| b.append_reserved(v.0)
);
impl_udf_value!(
    Time64NsValue, Time64Ns, Time64NanosecondArray, Time64NsColumnBuilder,
    |arr, idx| Time64NsValue(arr.value(idx)),
    |v, b| b.append_reserved(v.0)
);

impl private::Sealed for StringValue {}

impl UdfValue for StringValue {
    const DATA_TYPE: DataType = DataType::String;
    type Array = StringArray;
    type Builder = StringColumnBuilder;

    #[inline]
    fn value_at(array: &Self::Array, idx: usize) -> Self {
        StringValue(array.value(idx).to_string())
    }

    #[inline]
    fn append_to(self, builder: &mut Self::Builder) {
        builder.append_reserved(&self.0);
    }

    fn byte_len(&self) -> usize {
        self.0.len()
    }

    fn column(col: &ColumnBuffer) -> Option<&[Self]> {
        match col.data() {
            ColumnData::String(values) => Some(values),
            _ => None,
        }
    }

    fn column_mut(col: &mut ColumnBuffer) -> Option<&mut [Self]> {
        match col.data_mut() {
            ColumnData::String(values) => Some(values),
            _ => None,
        }
    }

    fn into_column(values: Vec<Self>) -> ColumnBuffer {
        ColumnBuffer::from_data(ColumnData::String(values))
    }

    fn into_value(self) -> Value {
        Value::String(self.0)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(StringValue(s.clone())),
            _ => None,
        }
    }
}

/// Downcasts an arrow array to `T`'s array type.
///
/// # Errors
///
/// Returns `TypeError` if the array's type is not `T::DATA_TYPE`.
pub fn downcast_array<T: UdfValue>(array: &ArrayRef, position: usize) -> Result<&T::Array> {
    array
        .as_ref()
        .as_any()
        .downcast_ref::<T::Array>()
        .ok_or_else(|| {
            VexecError::type_error(
                format!("{} at input {position}", T::DATA_TYPE),
                array.data_type(),
            )
        })
}

/// Borrows a column buffer's elements as `T`.
///
/// # Errors
///
/// Returns `TypeError` if the column's tag is not `T::DATA_TYPE`.
pub fn downcast_column<T: UdfValue>(col: &ColumnBuffer, position: usize) -> Result<&[T]> {
    T::column(col).ok_or_else(|| {
        VexecError::type_error(
            format!("{} at input {position}", T::DATA_TYPE),
            col.data_type(),
        )
    })
}

/// An ordered tuple of argument value types.
///
/// Implemented for tuples of one to five [`UdfValue`]s. Binding checks every
/// input's tag once; reading a row afterwards cannot fail.
pub trait ArgList: Sized + 'static {
    /// Number of arguments.
    const ARITY: usize;
    /// Tag-checked arrow arrays, one per argument.
    type Arrays<'a>;
    /// Tag-checked column buffer slices, one per argument.
    type Slices<'a>;

    /// Returns the ordered argument types.
    fn data_types() -> Vec<DataType>;

    /// Checks arity and every array's tag, returning typed references.
    ///
    /// # Errors
    ///
    /// Returns `ArityMismatch` or `TypeError`.
    fn bind_arrays(inputs: &[ArrayRef]) -> Result<Self::Arrays<'_>>;

    /// Reads row `idx` from bound arrays.
    fn read_arrays(arrays: &Self::Arrays<'_>, idx: usize) -> Self;

    /// Checks arity and every column's tag, returning typed slices.
    ///
    /// # Errors
    ///
    /// Returns `ArityMismatch` or `TypeError`.
    fn bind_buffers<'a>(inputs: &[&'a ColumnBuffer]) -> Result<Self::Slices<'a>>;

    /// Reads row `idx` from bound slices.
    fn read_slices(slices: &Self::Slices<'_>, idx: usize) -> Self;
}

fn check_arity(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(VexecError::ArityMismatch { expected, actual })
    }
}

macro_rules! impl_arg_list {
    ($arity:expr; $($T:ident => $idx:tt),+) => {
        impl<$($T: UdfValue),+> ArgList for ($($T,)+) {
            const ARITY: usize = $arity;
            type Arrays<'a> = ($(&'a <$T as UdfValue>::Array,)+);
            type Slices<'a> = ($(&'a [$T],)+);

            fn data_types() -> Vec<DataType> {
                vec![$(<$T as UdfValue>::DATA_TYPE),+]
            }

            fn bind_arrays(inputs: &[ArrayRef]) -> Result<Self::Arrays<'_>> {
                check_arity(Self::ARITY, inputs.len())?;
                Ok(($(downcast_array::<$T>(&inputs[$idx], $idx)?,)+))
            }

            #[inline]
            fn read_arrays(arrays: &Self::Arrays<'_>, idx: usize) -> Self {
                ($(<$T as UdfValue>::value_at(arrays.$idx, idx),)+)
            }

            fn bind_buffers<'a>(inputs: &[&'a ColumnBuffer]) -> Result<Self::Slices<'a>> {
                check_arity(Self::ARITY, inputs.len())?;
                Ok(($(downcast_column::<$T>(inputs[$idx], $idx)?,)+))
            }

            #[inline]
            fn read_slices(slices: &Self::Slices<'_>, idx: usize) -> Self {
                ($(slices.$idx[idx].clone(),)+)
            }
        }
    };
}

impl_arg_list!(1; A => 0);
impl_arg_list!(2; A => 0, B => 1);
impl_arg_list!(3; A => 0, B => 1, C => 2);
impl_arg_list!(4; A => 0, B => 1, C => 2, D => 3);
impl_arg_list!(5; A => 0, B => 1, C => 2, D => 3, E => 4);
