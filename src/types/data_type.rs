//! Logical data types.

use std::fmt;

use arrow::datatypes::{DataType as ArrowDataType, TimeUnit};
use serde::{Deserialize, Serialize};

use crate::column::{
    BooleanColumnBuilder, ColumnBuilder, Float64ColumnBuilder, Int64ColumnBuilder,
    StringColumnBuilder, Time64NsColumnBuilder,
};

/// Logical data types understood by the function executors.
///
/// This enum is the single source of truth for how a column or value is
/// represented: see [`crate::types::UdfValue`] for the per-type scalar,
/// array and builder bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean.
    Boolean,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 string.
    String,
    /// Time of day or duration in nanoseconds.
    Time64Ns,
}

impl DataType {
    /// All logical types, in declaration order.
    pub const ALL: [DataType; 5] = [
        DataType::Boolean,
        DataType::Int64,
        DataType::Float64,
        DataType::String,
        DataType::Time64Ns,
    ];

    /// Returns the canonical upper-case name of the type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Boolean => "BOOLEAN",
            DataType::Int64 => "INT64",
            DataType::Float64 => "FLOAT64",
            DataType::String => "STRING",
            DataType::Time64Ns => "TIME64NS",
        }
    }

    /// Returns whether this type is a fixed-width type.
    #[must_use]
    pub fn is_fixed_width(&self) -> bool {
        !matches!(self, DataType::String)
    }

    /// Returns the byte size for fixed-width types.
    #[must_use]
    pub fn byte_size(&self) -> Option<usize> {
        match self {
            DataType::Int64 | DataType::Float64 | DataType::Time64Ns => Some(8),
            DataType::Boolean => Some(1),
            DataType::String => None,
        }
    }

    /// Converts to an Arrow data type.
    #[must_use]
    pub fn to_arrow(&self) -> ArrowDataType {
        match self {
            DataType::Boolean => ArrowDataType::Boolean,
            DataType::Int64 => ArrowDataType::Int64,
            DataType::Float64 => ArrowDataType::Float64,
            DataType::String => ArrowDataType::Utf8,
            DataType::Time64Ns => ArrowDataType::Time64(TimeUnit::Nanosecond),
        }
    }

    /// Converts from an Arrow data type.
    ///
    /// Returns None for Arrow types without an exact logical counterpart.
    #[must_use]
    pub fn from_arrow(arrow_type: &ArrowDataType) -> Option<Self> {
        match arrow_type {
            ArrowDataType::Boolean => Some(DataType::Boolean),
            ArrowDataType::Int64 => Some(DataType::Int64),
            ArrowDataType::Float64 => Some(DataType::Float64),
            ArrowDataType::Utf8 => Some(DataType::String),
            ArrowDataType::Time64(TimeUnit::Nanosecond) => Some(DataType::Time64Ns),
            _ => None,
        }
    }

    /// Creates an empty builder producing arrays of this type.
    ///
    /// `memory_limit` caps the bytes the builder may reserve.
    #[must_use]
    pub fn new_builder(&self, memory_limit: Option<usize>) -> Box<dyn ColumnBuilder> {
        match self {
            DataType::Boolean => Box::new(BooleanColumnBuilder::new().with_memory_limit(memory_limit)),
            DataType::Int64 => Box::new(Int64ColumnBuilder::new().with_memory_limit(memory_limit)),
            DataType::Float64 => {
                Box::new(Float64ColumnBuilder::new().with_memory_limit(memory_limit))
            }
            DataType::String => Box::new(StringColumnBuilder::new().with_memory_limit(memory_limit)),
            DataType::Time64Ns => {
                Box::new(Time64NsColumnBuilder::new().with_memory_limit(memory_limit))
            }
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
