//! The shape of a handler function, as seen by the usage string compiler and the binder.
//!
//! The event is always passed first and is not part of the signature.

use std::collections::HashMap;

use thiserror::Error;

use super::value::{FromValue, Value, ValueTypeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// May be passed positionally or by name.
    Positional,
    /// Collects positional arguments past the last `Positional` one.
    VarArgs,
    /// Collects named arguments that match no other parameter.
    VarKwargs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureParam {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing required argument '{0}'")]
    Missing(String),
    #[error("got multiple values for argument '{0}'")]
    Multiple(String),
    #[error("got an unexpected keyword argument '{0}'")]
    Unexpected(String),
    #[error("takes {0} positional arguments but more were given")]
    TooManyPositional(usize),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    params: Vec<SignatureParam>,
}

impl Signature {
    pub fn new() -> Signature {
        Signature::default()
    }

    pub fn param(mut self, name: &str) -> Signature {
        self.params.push(SignatureParam { name: name.to_owned(), kind: ParamKind::Positional, default: None });
        self
    }

    pub fn optional(mut self, name: &str, default: impl Into<Value>) -> Signature {
        self.params.push(SignatureParam {
            name: name.to_owned(),
            kind: ParamKind::Positional,
            default: Some(default.into()),
        });
        self
    }

    pub fn varargs(mut self, name: &str) -> Signature {
        self.params.push(SignatureParam { name: name.to_owned(), kind: ParamKind::VarArgs, default: None });
        self
    }

    pub fn kwargs(mut self, name: &str) -> Signature {
        self.params.push(SignatureParam { name: name.to_owned(), kind: ParamKind::VarKwargs, default: None });
        self
    }

    pub fn params(&self) -> &[SignatureParam] {
        &self.params
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }

    pub fn varargs_name(&self) -> Option<&str> {
        self.find_kind(ParamKind::VarArgs)
    }

    pub fn kwargs_name(&self) -> Option<&str> {
        self.find_kind(ParamKind::VarKwargs)
    }

    fn find_kind(&self, kind: ParamKind) -> Option<&str> {
        self.params.iter().find(|p| p.kind == kind).map(|p| p.name.as_str())
    }

    /// Maps call arguments onto the parameters, filling in defaults.
    ///
    /// Positional values past the last positional parameter are prepended to `varargs`.
    pub fn bind(
        &self,
        positional: Vec<Value>,
        varargs: Vec<Value>,
        mut named: HashMap<String, Value>,
    ) -> Result<BoundArgs, SignatureError> {
        let mut bound = BoundArgs::default();
        let mut positional = positional.into_iter();

        for param in self.params.iter().filter(|p| p.kind == ParamKind::Positional) {
            if let Some(value) = positional.next() {
                if named.contains_key(&param.name) {
                    return Err(SignatureError::Multiple(param.name.clone()));
                }
                bound.values.insert(param.name.clone(), value);
            }
        }

        let mut extra: Vec<Value> = positional.collect();
        extra.extend(varargs);
        if !extra.is_empty() {
            if self.varargs_name().is_none() {
                let count = self.params.iter().filter(|p| p.kind == ParamKind::Positional).count();
                return Err(SignatureError::TooManyPositional(count));
            }
            bound.varargs = extra;
        }

        for param in self.params.iter().filter(|p| p.kind == ParamKind::Positional) {
            if let Some(value) = named.remove(&param.name) {
                bound.values.insert(param.name.clone(), value);
            } else if !bound.values.contains_key(&param.name) {
                match &param.default {
                    Some(default) => {
                        bound.values.insert(param.name.clone(), default.clone());
                    },
                    None => return Err(SignatureError::Missing(param.name.clone())),
                }
            }
        }

        if !named.is_empty() {
            if self.kwargs_name().is_none() {
                let mut names: Vec<_> = named.into_keys().collect();
                names.sort();
                return Err(SignatureError::Unexpected(names.swap_remove(0)));
            }
            bound.kwargs = named;
        }

        Ok(bound)
    }
}

/// Arguments ready to be handed to a handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArgs {
    values: HashMap<String, Value>,
    varargs: Vec<Value>,
    kwargs: HashMap<String, Value>,
}

impl BoundArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn take<T: FromValue>(&mut self, name: &str) -> Result<T, ValueTypeError> {
        T::from_value(name, self.values.remove(name))
    }

    pub fn varargs(&self) -> &[Value] {
        &self.varargs
    }

    pub fn take_varargs<T: FromValue>(&mut self, name: &str) -> Result<Vec<T>, ValueTypeError> {
        std::mem::take(&mut self.varargs).into_iter().map(|v| T::from_value(name, Some(v))).collect()
    }

    pub fn kwargs(&self) -> &HashMap<String, Value> {
        &self.kwargs
    }

    pub fn take_kwargs(&mut self) -> HashMap<String, Value> {
        std::mem::take(&mut self.kwargs)
    }
}
