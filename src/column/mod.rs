//! Column storage used by the function executors.
//!
//! [`ColumnBuffer`] is the fixed-length, type-tagged column for intermediate
//! data; the builders are the append-only write path that produces arrow
//! arrays.

mod buffer;
mod builder;

pub(crate) use buffer::ColumnData;
pub use buffer::ColumnBuffer;
pub use builder::{
    BooleanColumnBuilder, ColumnBuilder, Float64ColumnBuilder, Int64ColumnBuilder,
    LogicalPrimitive, PrimitiveColumnBuilder, StringColumnBuilder, Time64NsColumnBuilder,
};
