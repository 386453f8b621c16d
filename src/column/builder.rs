//! Append-only column builders.
//!
//! Builders separate reservation from appending: callers reserve element
//! capacity (and, for strings, data bytes) up front, then append without
//! further checks. Reservations are the only fallible step; they fail when a
//! builder's memory limit would be exceeded, leaving already-appended
//! elements in place.

use std::any::Any;
use std::mem::size_of;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, BooleanBufferBuilder, BufferBuilder, PrimitiveArray, StringArray,
};
use arrow::buffer::{OffsetBuffer, ScalarBuffer};
use arrow::datatypes::{ArrowPrimitiveType, Float64Type, Int64Type, Time64NanosecondType};
use tracing::trace;

use crate::error::{Result, VexecError};
use crate::types::{DataType, Value};

/// Type-erased append-only builder producing one arrow array.
pub trait ColumnBuilder: Send {
    /// Returns the logical type of the produced array.
    fn data_type(&self) -> DataType;

    /// Returns the number of appended elements.
    fn len(&self) -> usize;

    /// Returns true if nothing has been appended.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of elements reserved.
    fn capacity(&self) -> usize;

    /// Reserves room for `additional` more elements.
    ///
    /// # Errors
    ///
    /// Returns `MemoryLimitExceeded` if the reservation exceeds the builder's limit.
    fn reserve(&mut self, additional: usize) -> Result<()>;

    /// Ensures the variable-length data buffer can hold `total_bytes` in total.
    ///
    /// A no-op for fixed-width builders.
    ///
    /// # Errors
    ///
    /// Returns `MemoryLimitExceeded` if the reservation exceeds the builder's limit.
    fn reserve_data(&mut self, _total_bytes: usize) -> Result<()> {
        Ok(())
    }

    /// Returns the reserved variable-length data bytes (0 for fixed-width builders).
    fn data_capacity(&self) -> usize {
        0
    }

    /// Returns the variable-length data bytes appended so far (0 for fixed-width builders).
    fn data_len(&self) -> usize {
        0
    }

    /// Returns the most variable-length data bytes the memory limit still
    /// allows in total, given the current element reservation.
    ///
    /// `None` when unlimited or for fixed-width builders.
    fn data_budget(&self) -> Option<usize> {
        None
    }

    /// Appends an erased value, growing the builder as needed.
    ///
    /// # Errors
    ///
    /// Returns `TypeError` if the value's tag differs from the builder's, or
    /// `MemoryLimitExceeded` if growing fails.
    fn append_value(&mut self, value: &Value) -> Result<()>;

    /// Produces the array and resets the builder to empty.
    ///
    /// # Errors
    ///
    /// Returns an error if arrow rejects the assembled buffers.
    fn finish(&mut self) -> Result<ArrayRef>;

    /// Upcasts for downcasting to the concrete builder.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

fn check_limit(limit: Option<usize>, requested: usize) -> Result<()> {
    match limit {
        Some(limit) if requested > limit => Err(VexecError::MemoryLimitExceeded {
            used: requested,
            limit,
        }),
        _ => Ok(()),
    }
}

// ============================================================================
// Fixed-width builders
// ============================================================================

/// Arrow primitive types with a logical counterpart.
pub trait LogicalPrimitive: ArrowPrimitiveType {
    /// Logical type of the arrays this primitive produces.
    const LOGICAL: DataType;

    /// Extracts the native payload if the value carries this type's tag.
    fn native(value: &Value) -> Option<Self::Native>;
}

impl LogicalPrimitive for Int64Type {
    const LOGICAL: DataType = DataType::Int64;

    fn native(value: &Value) -> Option<i64> {
        value.as_int64()
    }
}

impl LogicalPrimitive for Float64Type {
    const LOGICAL: DataType = DataType::Float64;

    fn native(value: &Value) -> Option<f64> {
        value.as_float64()
    }
}

impl LogicalPrimitive for Time64NanosecondType {
    const LOGICAL: DataType = DataType::Time64Ns;

    fn native(value: &Value) -> Option<i64> {
        value.as_time64ns()
    }
}

/// Builder for fixed-width numeric arrays.
#[derive(Debug)]
pub struct PrimitiveColumnBuilder<A: LogicalPrimitive> {
    values: BufferBuilder<A::Native>,
    capacity: usize,
    memory_limit: Option<usize>,
}

/// Builder for 64-bit integer arrays.
pub type Int64ColumnBuilder = PrimitiveColumnBuilder<Int64Type>;
/// Builder for 64-bit float arrays.
pub type Float64ColumnBuilder = PrimitiveColumnBuilder<Float64Type>;
/// Builder for nanosecond time arrays.
pub type Time64NsColumnBuilder = PrimitiveColumnBuilder<Time64NanosecondType>;

impl<A: LogicalPrimitive> Default for PrimitiveColumnBuilder<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: LogicalPrimitive> PrimitiveColumnBuilder<A> {
    /// Creates an empty builder without a memory limit.
    #[must_use]
    pub fn new() -> Self {
        PrimitiveColumnBuilder {
            values: BufferBuilder::new(0),
            capacity: 0,
            memory_limit: None,
        }
    }

    /// Caps the bytes this builder may reserve.
    #[must_use]
    pub fn with_memory_limit(mut self, memory_limit: Option<usize>) -> Self {
        self.memory_limit = memory_limit;
        self
    }

    /// Appends into reserved capacity.
    #[inline]
    pub fn append_reserved(&mut self, value: A::Native) {
        debug_assert!(self.values.len() < self.capacity, "append without reservation");
        self.values.append(value);
    }

    /// Returns the appended values.
    #[must_use]
    pub fn values_slice(&self) -> &[A::Native] {
        self.values.as_slice()
    }
}

impl<A: LogicalPrimitive> ColumnBuilder for PrimitiveColumnBuilder<A> {
    fn data_type(&self) -> DataType {
        A::LOGICAL
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn reserve(&mut self, additional: usize) -> Result<()> {
        let target = self.values.len() + additional;
        if target <= self.capacity {
            return Ok(());
        }
        check_limit(self.memory_limit, target * size_of::<A::Native>())?;
        self.values.reserve(target - self.values.len());
        self.capacity = target;
        Ok(())
    }

    fn append_value(&mut self, value: &Value) -> Result<()> {
        let native =
            A::native(value).ok_or_else(|| VexecError::type_error(A::LOGICAL, value.data_type()))?;
        if self.values.len() == self.capacity {
            self.reserve(self.capacity.max(1))?;
        }
        self.append_reserved(native);
        Ok(())
    }

    fn finish(&mut self) -> Result<ArrayRef> {
        let values = self.values.finish();
        self.capacity = 0;
        Ok(Arc::new(PrimitiveArray::<A>::new(ScalarBuffer::from(values), None)))
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Builder for boolean arrays.
#[derive(Debug)]
pub struct BooleanColumnBuilder {
    values: BooleanBufferBuilder,
    capacity: usize,
    memory_limit: Option<usize>,
}

impl Default for BooleanColumnBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BooleanColumnBuilder {
    /// Creates an empty builder without a memory limit.
    #[must_use]
    pub fn new() -> Self {
        BooleanColumnBuilder {
            values: BooleanBufferBuilder::new(0),
            capacity: 0,
            memory_limit: None,
        }
    }

    /// Caps the bytes this builder may reserve.
    #[must_use]
    pub fn with_memory_limit(mut self, memory_limit: Option<usize>) -> Self {
        self.memory_limit = memory_limit;
        self
    }

    /// Appends into reserved capacity.
    #[inline]
    pub fn append_reserved(&mut self, value: bool) {
        debug_assert!(self.values.len() < self.capacity, "append without reservation");
        self.values.append(value);
    }
}

impl ColumnBuilder for BooleanColumnBuilder {
    fn data_type(&self) -> DataType {
        DataType::Boolean
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn reserve(&mut self, additional: usize) -> Result<()> {
        let target = self.values.len() + additional;
        if target <= self.capacity {
            return Ok(());
        }
        // Bit-packed
        check_limit(self.memory_limit, target.div_ceil(8))?;
        self.values.reserve(target - self.values.len());
        self.capacity = target;
        Ok(())
    }

    fn append_value(&mut self, value: &Value) -> Result<()> {
        let b = value
            .as_bool()
            .ok_or_else(|| VexecError::type_error(DataType::Boolean, value.data_type()))?;
        if self.values.len() == self.capacity {
            self.reserve(self.capacity.max(1))?;
        }
        self.append_reserved(b);
        Ok(())
    }

    fn finish(&mut self) -> Result<ArrayRef> {
        let values = self.values.finish();
        self.capacity = 0;
        Ok(Arc::new(BooleanArray::new(values, None)))
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ============================================================================
// Variable-length builder
// ============================================================================

/// Builder for UTF-8 string arrays.
///
/// Element capacity (offsets) and data capacity (bytes) are reserved
/// independently.
#[derive(Debug)]
pub struct StringColumnBuilder {
    offsets: BufferBuilder<i32>,
    data: BufferBuilder<u8>,
    capacity: usize,
    data_capacity: usize,
    data_reservations: usize,
    memory_limit: Option<usize>,
}

impl Default for StringColumnBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn empty_offsets() -> BufferBuilder<i32> {
    let mut offsets = BufferBuilder::new(1);
    offsets.append(0);
    offsets
}

impl StringColumnBuilder {
    /// Creates an empty builder without a memory limit.
    #[must_use]
    pub fn new() -> Self {
        StringColumnBuilder {
            offsets: empty_offsets(),
            data: BufferBuilder::new(0),
            capacity: 0,
            data_capacity: 0,
            data_reservations: 0,
            memory_limit: None,
        }
    }

    /// Caps the bytes this builder may reserve (offsets plus data).
    #[must_use]
    pub fn with_memory_limit(mut self, memory_limit: Option<usize>) -> Self {
        self.memory_limit = memory_limit;
        self
    }

    /// Appends into reserved element and data capacity.
    #[inline]
    pub fn append_reserved(&mut self, value: &str) {
        debug_assert!(self.len() < self.capacity, "append without reservation");
        debug_assert!(
            self.data.len() + value.len() <= self.data_capacity,
            "append without data reservation"
        );
        self.data.append_slice(value.as_bytes());
        self.offsets.append(self.data.len() as i32);
    }

    /// Returns the appended string at `idx`.
    #[must_use]
    pub fn value(&self, idx: usize) -> Option<&str> {
        let offsets = self.offsets.as_slice();
        let start = *offsets.get(idx)? as usize;
        let end = *offsets.get(idx + 1)? as usize;
        std::str::from_utf8(&self.data.as_slice()[start..end]).ok()
    }

    /// Returns how many times the data buffer was grown by a reservation
    /// since the last [`ColumnBuilder::finish`].
    #[must_use]
    pub fn data_reservations(&self) -> usize {
        self.data_reservations
    }

    fn offsets_bytes(elements: usize) -> usize {
        (elements + 1) * size_of::<i32>()
    }
}

impl ColumnBuilder for StringColumnBuilder {
    fn data_type(&self) -> DataType {
        DataType::String
    }

    fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn reserve(&mut self, additional: usize) -> Result<()> {
        let target = self.len() + additional;
        if target <= self.capacity {
            return Ok(());
        }
        check_limit(
            self.memory_limit,
            Self::offsets_bytes(target) + self.data_capacity,
        )?;
        self.offsets.reserve(target - self.len());
        self.capacity = target;
        Ok(())
    }

    fn reserve_data(&mut self, total_bytes: usize) -> Result<()> {
        if total_bytes <= self.data_capacity {
            return Ok(());
        }
        check_limit(
            self.memory_limit,
            Self::offsets_bytes(self.capacity).saturating_add(total_bytes),
        )?;
        if i32::try_from(total_bytes).is_err() {
            return Err(VexecError::ExecutionError(format!(
                "string data of {total_bytes} bytes exceeds 32-bit offsets"
            )));
        }
        self.data.reserve(total_bytes - self.data.len());
        trace!(
            from = self.data_capacity,
            to = total_bytes,
            "grew string data reservation"
        );
        self.data_capacity = total_bytes;
        self.data_reservations += 1;
        Ok(())
    }

    fn data_capacity(&self) -> usize {
        self.data_capacity
    }

    fn data_len(&self) -> usize {
        self.data.len()
    }

    fn data_budget(&self) -> Option<usize> {
        self.memory_limit
            .map(|limit| limit.saturating_sub(Self::offsets_bytes(self.capacity)))
    }

    fn append_value(&mut self, value: &Value) -> Result<()> {
        let s = value
            .as_string()
            .ok_or_else(|| VexecError::type_error(DataType::String, value.data_type()))?;
        if self.len() == self.capacity {
            self.reserve(self.capacity.max(1))?;
        }
        let needed = self.data.len() + s.len();
        if needed > self.data_capacity {
            let doubled = needed.max(self.data_capacity.saturating_mul(2));
            let target = self.data_budget().map_or(doubled, |b| doubled.min(b.max(needed)));
            self.reserve_data(target)?;
        }
        self.append_reserved(s);
        Ok(())
    }

    fn finish(&mut self) -> Result<ArrayRef> {
        let offsets = std::mem::replace(&mut self.offsets, empty_offsets()).finish();
        let data = self.data.finish();
        self.capacity = 0;
        self.data_capacity = 0;
        self.data_reservations = 0;
        let array = StringArray::try_new(
            OffsetBuffer::new(ScalarBuffer::from(offsets)),
            data,
            None,
        )?;
        Ok(Arc::new(array))
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
