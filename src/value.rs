//! Dynamic member values and the conversions generated accessors rely on.
//!
//! [`Value`] is what flows through a [`MemberValue`](crate::MemberValue):
//! modifiers see and rewrite it, the orchestrator encodes it. Scalars are always
//! encoded by value; only [`Value::Model`] takes part in reference tracking.

use std::borrow::Cow;

use crate::error::{GraphError, Result};
use crate::model::{Model, ModelRef, ModelType, Shared};

/// A type-erased member value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value (`None`, or an unresolved reference).
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Raw bytes. Never produced by the built-in conversions; useful for modifiers.
    Bytes(Vec<u8>),
    /// Ordered items.
    List(Vec<Value>),
    /// A shared model instance.
    Model(ModelRef),
}

impl Value {
    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Model(_) => "model",
        }
    }

    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrows the string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrows the model handle.
    pub fn as_model(&self) -> Option<&ModelRef> {
        match self {
            Self::Model(m) => Some(m),
            _ => None,
        }
    }

    fn mismatch(&self, expected: &'static str) -> GraphError {
        GraphError::type_mismatch(expected, self.kind())
    }
}

/// Converts a member into a [`Value`].
pub trait IntoValue {
    /// Produces the dynamic value. Model handles are cloned, not copied.
    fn to_value(&self) -> Value;
}

/// Rebuilds a member from a [`Value`].
pub trait FromValue: Sized {
    /// Converts the value.
    ///
    /// # Errors
    /// [`GraphError::TypeMismatch`] when the value does not fit.
    fn from_value(value: Value) -> Result<Self>;

    /// The model type reachable through this member type, if any.
    fn nested_model_type() -> Option<ModelType> {
        None
    }
}

macro_rules! impl_signed {
    ($($t:ty),*) => {
        $(
            impl IntoValue for $t {
                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }
            }

            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self> {
                    let out = match value {
                        Value::Int(v) => <$t>::try_from(v).ok(),
                        Value::UInt(v) => <$t>::try_from(v).ok(),
                        ref other => return Err(other.mismatch(stringify!($t))),
                    };
                    out.ok_or_else(|| GraphError::type_mismatch(stringify!($t), "out of range integer"))
                }
            }
        )*
    }
}

macro_rules! impl_unsigned {
    ($($t:ty),*) => {
        $(
            impl IntoValue for $t {
                fn to_value(&self) -> Value {
                    Value::UInt(u64::from(*self))
                }
            }

            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self> {
                    let out = match value {
                        Value::UInt(v) => <$t>::try_from(v).ok(),
                        Value::Int(v) => <$t>::try_from(v).ok(),
                        ref other => return Err(other.mismatch(stringify!($t))),
                    };
                    out.ok_or_else(|| GraphError::type_mismatch(stringify!($t), "out of range integer"))
                }
            }
        )*
    }
}

impl_signed!(i8, i16, i32, i64);
impl_unsigned!(u8, u16, u32, u64);

impl IntoValue for usize {
    fn to_value(&self) -> Value {
        Value::UInt(*self as u64)
    }
}

impl FromValue for usize {
    fn from_value(value: Value) -> Result<Self> {
        let wide = u64::from_value(value)?;
        usize::try_from(wide).map_err(|_| GraphError::type_mismatch("usize", "out of range integer"))
    }
}

impl IntoValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            Value::UInt(v) => Ok(v as f64),
            other => Err(other.mismatch("f64")),
        }
    }
}

impl IntoValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl IntoValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(other.mismatch("bool")),
        }
    }
}

impl IntoValue for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(v) => Ok(v),
            other => Err(other.mismatch("String")),
        }
    }
}

impl IntoValue for char {
    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl FromValue for char {
    fn from_value(value: Value) -> Result<Self> {
        let s = String::from_value(value)?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(GraphError::type_mismatch("char", Cow::Owned(format!("string of length {}", s.chars().count())))),
        }
    }
}

impl IntoValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn nested_model_type() -> Option<ModelType> {
        T::nested_model_type()
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(IntoValue::to_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(other.mismatch("list")),
        }
    }

    fn nested_model_type() -> Option<ModelType> {
        T::nested_model_type()
    }
}

impl<T: Model> IntoValue for Shared<T> {
    fn to_value(&self) -> Value {
        Value::Model(self.handle())
    }
}

impl<T: Model> FromValue for Shared<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Model(handle) => handle
                .downcast::<T>()
                .ok_or_else(|| GraphError::type_mismatch(std::any::type_name::<T>(), "model of another type")),
            other => Err(other.mismatch("model")),
        }
    }

    fn nested_model_type() -> Option<ModelType> {
        Some(T::model_type())
    }
}

impl IntoValue for ModelRef {
    fn to_value(&self) -> Value {
        Value::Model(self.clone())
    }
}

impl FromValue for ModelRef {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Model(handle) => Ok(handle),
            other => Err(other.mismatch("model")),
        }
    }
}
