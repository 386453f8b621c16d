//! Typed scalar values.
//!
//! [`Value`] is the closed, type-erased form that generic code stores and
//! passes around. Each variant has a concrete newtype ([`Int64Value`],
//! [`StringValue`], ...) that functions are written against; converting
//! between the two is either a checked downcast or a plain unwrap.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VexecError};
use crate::types::registry::UdfValue;
use crate::types::DataType;

/// Boolean value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoolValue(pub bool);

/// 64-bit signed integer value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Int64Value(pub i64);

/// 64-bit floating point value.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Float64Value(pub f64);

/// UTF-8 string value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringValue(pub String);

/// Nanosecond time value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Time64NsValue(pub i64);

macro_rules! impl_newtype {
    ($name:ident, $inner:ty) => {
        impl $name {
            /// Unwraps the raw payload.
            #[must_use]
            pub fn into_inner(self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            fn from(v: $inner) -> Self {
                $name(v)
            }
        }
    };
}

impl_newtype!(BoolValue, bool);
impl_newtype!(Int64Value, i64);
impl_newtype!(Float64Value, f64);
impl_newtype!(StringValue, String);
impl_newtype!(Time64NsValue, i64);

impl From<&str> for StringValue {
    fn from(v: &str) -> Self {
        StringValue(v.to_string())
    }
}

impl StringValue {
    /// Returns the string payload.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the string is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Runtime value of some logical type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Boolean value.
    Boolean(bool),
    /// 64-bit signed integer value.
    Int64(i64),
    /// 64-bit floating point value.
    Float64(f64),
    /// String value.
    String(String),
    /// Nanosecond time value.
    Time64Ns(i64),
}

// Manual Hash implementation because f64 doesn't implement Hash
impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Boolean(v) => v.hash(state),
            Value::Int64(v) | Value::Time64Ns(v) => v.hash(state),
            Value::Float64(v) => v.to_bits().hash(state),
            Value::String(v) => v.hash(state),
        }
    }
}

// Floats compare by bit pattern so values can serve as group keys
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) | (Value::Time64Ns(a), Value::Time64Ns(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Value {
    /// Returns the logical type of this value.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Boolean(_) => DataType::Boolean,
            Value::Int64(_) => DataType::Int64,
            Value::Float64(_) => DataType::Float64,
            Value::String(_) => DataType::String,
            Value::Time64Ns(_) => DataType::Time64Ns,
        }
    }

    /// Returns the zero value of the given type.
    ///
    /// Used to pre-allocate output slots that a finalize step later overwrites.
    #[must_use]
    pub fn default_for(data_type: DataType) -> Self {
        match data_type {
            DataType::Boolean => Value::Boolean(false),
            DataType::Int64 => Value::Int64(0),
            DataType::Float64 => Value::Float64(0.0),
            DataType::String => Value::String(String::new()),
            DataType::Time64Ns => Value::Time64Ns(0),
        }
    }

    /// Downcasts to the concrete value type `T`.
    ///
    /// # Errors
    ///
    /// Returns `TypeError` if this value's tag is not `T::DATA_TYPE`.
    pub fn downcast<T: UdfValue>(&self) -> Result<T> {
        T::from_value(self).ok_or_else(|| VexecError::type_error(T::DATA_TYPE, self.data_type()))
    }

    /// Attempts to extract an i64 value.
    #[must_use]
    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Attempts to extract an f64 value.
    #[must_use]
    pub fn as_float64(&self) -> Option<f64> {
        match self {
            Value::Float64(f) => Some(*f),
            _ => None,
        }
    }

    /// Attempts to extract a bool value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to extract a string reference.
    #[must_use]
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Attempts to extract a nanosecond time value.
    #[must_use]
    pub fn as_time64ns(&self) -> Option<i64> {
        match self {
            Value::Time64Ns(t) => Some(*t),
            _ => None,
        }
    }

    /// Compares two values of the same type.
    ///
    /// Returns None if the types don't match.
    #[must_use]
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) | (Value::Time64Ns(a), Value::Time64Ns(b)) => {
                Some(a.cmp(b))
            }
            (Value::Float64(a), Value::Float64(b)) => a.partial_cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "'{v}'"),
            Value::Time64Ns(v) => write!(f, "{v}ns"),
        }
    }
}
