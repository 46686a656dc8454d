//! Parameter types: how a word (or the rest of a line) becomes a [`Value`].
//!
//! Types are looked up by tag (the `int` in `<n:int>`) in a [`TypeRegistry`]. Each parameter gets
//! its own instance, built from the parameter's options string (the `1..10` in `<n:int:1..10>`).

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::sync::{Arc, OnceLock};

use lazy_static::lazy_static;
use regex::Regex;

use super::errors::{TypeRegistryError, UsageError};
use super::value::Value;

lazy_static! {
    static ref CONST_SEPARATOR: Regex = Regex::new(r"[/|]").unwrap();
}

/// The parse and validate strategy for one parameter.
///
/// Domain failures are reported by returning a [`UsageError`] inside the `anyhow::Error`. Anything
/// else is turned into a generic "Invalid format" usage error, unless [`ParamType::wrap_errors`]
/// returns false.
pub trait ParamType: Send + Sync + Debug {
    /// Consumes the rest of the line rather than one word.
    fn eol(&self) -> bool {
        false
    }

    /// Whether [`ParamType::validate`] does anything.
    fn check(&self) -> bool {
        false
    }

    fn wrap_errors(&self) -> bool {
        true
    }

    /// Cheap checks run on every parameter before any parameter is parsed.
    fn validate(&self, _name: &str, _value: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn parse(&self, name: &str, value: &str) -> anyhow::Result<Value>;
}

/// Builds a [`ParamType`] from a parameter's options. The error is the compile error message.
pub type ParamTypeFactory = Arc<dyn Fn(&str) -> Result<Box<dyn ParamType>, String> + Send + Sync>;

#[derive(Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, ParamTypeFactory>,
}

static BUILTIN: OnceLock<TypeRegistry> = OnceLock::new();

impl TypeRegistry {
    pub fn empty() -> TypeRegistry {
        TypeRegistry::default()
    }

    /// A registry with `str`, `line`, `const`, `int` and `float`.
    pub fn with_builtins() -> TypeRegistry {
        let mut registry = TypeRegistry::empty();
        let builtins: [(&str, ParamTypeFactory); 5] = [
            ("str", Arc::new(|options: &str| StrParamType::new(options, false).map(boxed))),
            ("line", Arc::new(|options: &str| StrParamType::new(options, true).map(boxed))),
            ("const", Arc::new(|options: &str| ConstParamType::new(options).map(boxed))),
            ("int", Arc::new(|options: &str| NumberParamType::new(options, NumberKind::Int).map(boxed))),
            ("float", Arc::new(|options: &str| NumberParamType::new(options, NumberKind::Float).map(boxed))),
        ];
        for (tag, factory) in builtins {
            registry.types.insert(tag.to_owned(), factory);
        }
        registry
    }

    /// The shared registry of built-in types, created on first use and never mutated afterwards.
    /// Build your own with [`TypeRegistry::with_builtins`] to add types.
    pub fn builtin() -> &'static TypeRegistry {
        BUILTIN.get_or_init(TypeRegistry::with_builtins)
    }

    pub fn register(
        &mut self,
        tag: &str,
        factory: impl Fn(&str) -> Result<Box<dyn ParamType>, String> + Send + Sync + 'static,
    ) -> Result<(), TypeRegistryError> {
        if self.types.contains_key(tag) {
            return Err(TypeRegistryError::Duplicate(tag.to_owned()));
        }
        self.types.insert(tag.to_owned(), Arc::new(factory));
        Ok(())
    }

    pub fn get(&self, tag: &str) -> Option<&ParamTypeFactory> {
        self.types.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.types.contains_key(tag)
    }
}

impl Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<_> = self.types.keys().collect();
        tags.sort();
        f.debug_struct("TypeRegistry").field("types", &tags).finish()
    }
}

fn boxed<T: ParamType + 'static>(t: T) -> Box<dyn ParamType> {
    Box::new(t)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Case {
    Keep,
    Lower,
    Upper,
}

/// Plain text, optionally case folded.
#[derive(Debug)]
pub struct StrParamType {
    case: Case,
    eol: bool,
}

impl StrParamType {
    pub fn new(options: &str, eol: bool) -> Result<StrParamType, String> {
        let case = match options {
            "" => Case::Keep,
            "lower" => Case::Lower,
            "upper" => Case::Upper,
            other => return Err(format!("Unrecognized string option '{other}'")),
        };
        Ok(StrParamType { case, eol })
    }
}

impl ParamType for StrParamType {
    fn eol(&self) -> bool {
        self.eol
    }

    fn parse(&self, _name: &str, value: &str) -> anyhow::Result<Value> {
        Ok(Value::Str(match self.case {
            Case::Keep => value.to_owned(),
            Case::Lower => value.to_lowercase(),
            Case::Upper => value.to_uppercase(),
        }))
    }
}

/// One of a fixed set of words, matched case insensitively.
#[derive(Debug)]
pub struct ConstParamType {
    /// Lowercased, in declaration order.
    values: Vec<String>,
}

impl ConstParamType {
    pub fn new(options: &str) -> Result<ConstParamType, String> {
        let values: Vec<String> = CONST_SEPARATOR
            .split(&options.to_lowercase())
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .collect();

        if values.is_empty() {
            return Err("Must have at least one constant value.".to_owned());
        }
        Ok(ConstParamType { values })
    }
}

impl ParamType for ConstParamType {
    fn check(&self) -> bool {
        true
    }

    fn validate(&self, name: &str, value: &str) -> anyhow::Result<()> {
        let value = value.to_lowercase();
        if self.values.contains(&value) {
            return Ok(());
        }

        let message = match &self.values[..] {
            [only] => format!("{name} must equal {only}"),
            values => format!("{name} must be one of ({})", values.join(", ")),
        };
        Err(UsageError::new(message).into())
    }

    fn parse(&self, _name: &str, value: &str) -> anyhow::Result<Value> {
        Ok(Value::Str(value.to_lowercase()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    Int,
    Float,
}

/// A parsed number. Values and bounds of one parameter always share a variant, so integers are
/// compared as integers.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(x) => write!(f, "{x}"),
        }
    }
}

/// A number within optional inclusive bounds, given as `min..max`, `min..`, `..max` or `min`.
#[derive(Debug)]
pub struct NumberParamType {
    kind: NumberKind,
    min: Option<Number>,
    max: Option<Number>,
}

impl NumberParamType {
    pub fn new(options: &str, kind: NumberKind) -> Result<NumberParamType, String> {
        let (min, max) = options.split_once("..").unwrap_or((options, ""));

        let min = kind.coerce_bound(min).map_err(|_| "Unable to coerce minval".to_owned())?;
        let max = kind.coerce_bound(max).map_err(|_| "Unable to coerce maxval".to_owned())?;

        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err("minval > maxval".to_owned());
            }
        }
        Ok(NumberParamType { kind, min, max })
    }
}

impl NumberKind {
    fn coerce(self, value: &str) -> Option<Number> {
        match self {
            NumberKind::Int => value.parse::<i64>().ok().map(Number::Int),
            NumberKind::Float => value.parse::<f64>().ok().filter(|x| x.is_finite()).map(Number::Float),
        }
    }

    fn coerce_bound(self, bound: &str) -> Result<Option<Number>, ()> {
        let bound = bound.trim();
        if bound.is_empty() {
            return Ok(None);
        }
        self.coerce(bound).map(Some).ok_or(())
    }
}

impl ParamType for NumberParamType {
    fn parse(&self, name: &str, value: &str) -> anyhow::Result<Value> {
        let Some(number) = self.kind.coerce(value) else {
            let message = match self.kind {
                NumberKind::Int => format!("{name} must be an integer"),
                NumberKind::Float => format!("{name} must be a number"),
            };
            return Err(UsageError::new(message).into());
        };

        if let Some(min) = self.min {
            if number < min {
                let message = match self.max {
                    Some(max) => format!("{name} must be between {min} and {max}"),
                    None => format!("{name} must be >= {min}"),
                };
                return Err(UsageError::new(message).into());
            }
        }
        if let Some(max) = self.max {
            if number > max {
                return Err(UsageError::new(format!("{name} must be <= {max}")).into());
            }
        }

        Ok(match number {
            Number::Int(i) => Value::Int(i),
            Number::Float(x) => Value::Float(x),
        })
    }
}
