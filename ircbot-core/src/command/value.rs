use std::fmt::Display;
use std::sync::Arc;

use super::binding::Binding;

/// A dynamically typed value passed to (or returned from) a handler.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// The binding that matched, injected with the `/b` family of options.
    Binding(Arc<Binding>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Binding(_) => "binding",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Binding(a), Value::Binding(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            },
            Value::Binding(binding) => write!(f, "<binding {}>", binding.usage()),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::None
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("expected {expected} for argument {name}, got {got}")]
pub struct ValueTypeError {
    pub name: String,
    pub expected: &'static str,
    pub got: &'static str,
}

/// Conversion out of a bound [`Value`], used when handing arguments to a handler.
///
/// `value` is `None` when the argument was not bound at all.
pub trait FromValue: Sized {
    fn from_value(name: &str, value: Option<Value>) -> Result<Self, ValueTypeError>;
}

fn mismatch(name: &str, expected: &'static str, value: Option<&Value>) -> ValueTypeError {
    ValueTypeError {
        name: name.to_owned(),
        expected,
        got: value.map_or("nothing", Value::type_name),
    }
}

impl FromValue for Value {
    fn from_value(_: &str, value: Option<Value>) -> Result<Self, ValueTypeError> {
        Ok(value.unwrap_or_default())
    }
}

impl FromValue for String {
    fn from_value(name: &str, value: Option<Value>) -> Result<Self, ValueTypeError> {
        match value {
            Some(Value::Str(s)) => Ok(s),
            other => Err(mismatch(name, "str", other.as_ref())),
        }
    }
}

impl FromValue for i64 {
    fn from_value(name: &str, value: Option<Value>) -> Result<Self, ValueTypeError> {
        match value {
            Some(Value::Int(i)) => Ok(i),
            other => Err(mismatch(name, "int", other.as_ref())),
        }
    }
}

impl FromValue for f64 {
    fn from_value(name: &str, value: Option<Value>) -> Result<Self, ValueTypeError> {
        match value {
            Some(Value::Float(x)) => Ok(x),
            Some(Value::Int(i)) => Ok(i as f64),
            other => Err(mismatch(name, "float", other.as_ref())),
        }
    }
}

impl FromValue for bool {
    fn from_value(name: &str, value: Option<Value>) -> Result<Self, ValueTypeError> {
        match value {
            Some(Value::Bool(b)) => Ok(b),
            // a matched constant with no name
            Some(Value::Str(_)) => Ok(true),
            Some(Value::None) | None => Ok(false),
            other => Err(mismatch(name, "bool", other.as_ref())),
        }
    }
}

impl FromValue for Arc<Binding> {
    fn from_value(name: &str, value: Option<Value>) -> Result<Self, ValueTypeError> {
        match value {
            Some(Value::Binding(b)) => Ok(b),
            other => Err(mismatch(name, "binding", other.as_ref())),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(name: &str, value: Option<Value>) -> Result<Self, ValueTypeError> {
        match value {
            None | Some(Value::None) => Ok(None),
            some => T::from_value(name, some).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(name: &str, value: Option<Value>) -> Result<Self, ValueTypeError> {
        match value {
            Some(Value::List(items)) => items.into_iter().map(|v| T::from_value(name, Some(v))).collect(),
            None | Some(Value::None) => Ok(Vec::new()),
            other => Err(mismatch(name, "list", other.as_ref())),
        }
    }
}
