//! Logical types, typed values, and the bindings between them.

mod array;
mod data_type;
pub mod registry;
mod value;

pub use array::{repeat_value, ArrayView};
pub use data_type::DataType;
pub use registry::{ArgList, UdfValue};
pub use value::{BoolValue, Float64Value, Int64Value, StringValue, Time64NsValue, Value};
