//! Bindings: one usage string compiled against one handler.
//!
//! A usage string is a whitespace separated list of chunks:
//!
//! - `<name[:type[:options]][?help]>`: a variable. `name` may be prefixed (or suffixed) with `*`
//!   (zero or more, must be last), `+` (one or more, must be last) or `?` (optional).
//! - `[name=]word[|word...][?help]`, optionally in parentheses: a constant, matched case
//!   insensitively. With `name=`, the handler receives the lowercased word under `name`.
//! - `/flags`: `b`, `B` or `b=NAME` pass the binding itself to the handler (first positional, last
//!   positional or by name); `u` prefers this binding's error when every binding fails.
//!
//! Any chunk may be wrapped in `[` `]`. They only show up in the usage text, which is the chunks
//! with their brackets kept and each label in place of the chunk's body.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use super::arguments::ArgumentList;
use super::errors::{CommandError, ParseError, UsageError};
use super::signature::{BoundArgs, Signature};
use super::types::{ParamType, TypeRegistry};
use super::value::Value;
use super::{Event, Handler};

lazy_static! {
    static ref PARAMSTRING: Regex = Regex::new(
        r"(?x)
        (?:
            (?:/(?P<options>\S+))
            | (?:
                (?P<prefix_0>\[*)
                (?:
                    (?:(?P<prefix_1><)
                        (?P<var_count>[+*?])?
                        (?P<var_arg>[^<>()]+?)
                        (?::(?P<var_type>[^<>()]+?))?
                        (?::(?P<var_options>[^<>()]+?))?
                        (?:\?(?P<var_name>[^<>()]+?))?
                    (?P<suffix_1>>))
                    | (?:(?P<prefix_2>\()
                        (?P<const_count>[+*?])?
                        (?:(?P<const_arg>[^<>()]+?)=)?
                        (?P<const_options>[^<>()]+?)
                        (?:\?(?P<const_name>[^<>()]+?))?
                    (?P<suffix_2>\)))
                    | (?:
                        (?P<const_count_1>[+*?])?
                        (?:(?P<const_arg_1>[^<>()\[\]\s]+?)=)?
                        (?P<const_options_1>[^<>()\[\]\s]+?)
                        (?:\?(?P<const_name_1>[^<>()\[\]\s]+?))?
                    )
                    | (?P<error_unexpected>.+?)
                )
                (?P<suffix_3>\]*)
            )
        )
        (?:\s+|\z)
        "
    )
    .unwrap();
}

pub const DEFAULT_TYPE: &str = "str";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// A single value.
    None,
    /// Every remaining word, as a list.
    Normal,
    /// Every remaining word, passed as the handler's variadic arguments.
    VarArgs,
}

/// One slot of a binding.
pub struct Parameter {
    /// Position of the word this parameter starts at.
    pub index: usize,
    /// Handler argument receiving the value. Constants without `name=` have none.
    pub arg: Option<String>,
    pub type_tag: String,
    pub options: String,
    /// Label used in help and error messages.
    pub name: String,
    pub list_mode: ListMode,
    pub required: bool,
    parser: Box<dyn ParamType>,
}

impl Parameter {
    pub fn eol(&self) -> bool {
        self.parser.eol()
    }

    /// Whether this parameter swallows every word after it.
    pub fn consumes_rest(&self) -> bool {
        self.eol() || self.list_mode != ListMode::None
    }

    /// The words this parameter is responsible for, with their positions.
    fn values<'a>(&'a self, arglist: &'a ArgumentList) -> impl Iterator<Item = (usize, &'a str)> + 'a {
        let count = if self.list_mode == ListMode::None { 1 } else { usize::MAX };
        arglist
            .iter()
            .enumerate()
            .skip(self.index)
            .take(count)
            .map(move |(i, arg)| (i, if self.eol() { arg.eol() } else { arg.as_str() }))
    }

    fn validate(&self, arglist: &ArgumentList) -> Result<(), CommandError> {
        if !self.parser.check() {
            return Ok(());
        }

        for (index, value) in self.values(arglist) {
            self.parser.validate(&self.name, value).map_err(|e| self.wrap(e, index))?;
        }
        Ok(())
    }

    /// Returns `None` when an optional parameter has no words.
    fn parse(&self, arglist: &ArgumentList) -> Result<Option<Value>, CommandError> {
        if arglist.len() <= self.index {
            if !self.required {
                return Ok(None);
            }

            let message = if self.list_mode == ListMode::None {
                format!("{} must be specified", self.name)
            } else {
                format!("At least one {} must be specified", self.name)
            };
            return Err(UsageError::new(message).with_param(self.index).into());
        }

        let values = self
            .values(arglist)
            .map(|(index, value)| self.parser.parse(&self.name, value).map_err(|e| self.wrap(e, index)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(match self.list_mode {
            ListMode::None => values.into_iter().next(),
            _ => Some(Value::List(values)),
        })
    }

    fn wrap(&self, error: anyhow::Error, index: usize) -> CommandError {
        match error.downcast::<UsageError>() {
            Ok(usage) => usage.with_param(index).into(),
            Err(_) if self.parser.wrap_errors() => {
                UsageError::new(format!("Invalid format for {}", self.name)).with_param(index).into()
            },
            Err(error) => CommandError::Internal(error),
        }
    }
}

impl Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("index", &self.index)
            .field("arg", &self.arg)
            .field("type_tag", &self.type_tag)
            .field("options", &self.options)
            .field("name", &self.name)
            .field("list_mode", &self.list_mode)
            .field("required", &self.required)
            .finish()
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.arg == other.arg
            && self.type_tag == other.type_tag
            && self.options == other.options
            && self.name == other.name
            && self.list_mode == other.list_mode
            && self.required == other.required
    }
}

/// Where the binding itself goes when it is passed to its handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingArg {
    First,
    Last,
    Named(String),
}

pub type Precheck = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// The compiled form of a usage string.
#[derive(Debug, PartialEq)]
pub struct CompiledParams {
    pub params: Vec<Parameter>,
    pub usage: String,
    pub binding_arg: Option<BindingArg>,
    pub default_error: bool,
}

/// Compiles `paramstring` for a handler with the given signature.
pub fn compile(paramstring: &str, signature: &Signature, types: &TypeRegistry) -> Result<CompiledParams, ParseError> {
    let lead = paramstring.len() - paramstring.trim_start().len();
    let trimmed = paramstring.trim();
    let error_at = |message: String, byte: usize| {
        ParseError::new(message, paramstring, paramstring[..lead + byte].chars().count())
    };

    let mut params: Vec<Parameter> = Vec::new();
    let mut usage = Vec::new();
    let mut arg_names = HashSet::new();
    let mut binding_arg = None;
    let mut default_error = false;
    let mut eol = false;
    let mut was_required = true;

    for caps in PARAMSTRING.captures_iter(trimmed) {
        let start = caps.get(0).map_or(0, |m| m.start());

        if let Some(options) = caps.name("options") {
            let chars: Vec<char> = options.as_str().chars().collect();
            let mut i = 0;
            while i < chars.len() {
                match chars[i] {
                    'u' => default_error = true,
                    ch @ ('b' | 'B') if chars.get(i + 1) == Some(&'=') => {
                        let name: String = chars[i + 2..].iter().collect();
                        if name.is_empty() {
                            return Err(error_at(format!("{ch}= must specify a kwarg"), start));
                        }
                        binding_arg = Some(BindingArg::Named(name));
                        break;
                    },
                    'b' => binding_arg = Some(BindingArg::First),
                    'B' => binding_arg = Some(BindingArg::Last),
                    ch => return Err(error_at(format!("Unrecognized option '{ch}'"), start)),
                }
                i += 1;
            }
            continue;
        }

        if eol {
            return Err(error_at(
                "Previous parameter consumes remainder of line, cannot have additional parameters.".to_owned(),
                start,
            ));
        }

        if caps.name("error_unexpected").is_some() {
            return Err(error_at("Unexpected characters".to_owned(), start));
        }

        let prefix = joined(&caps, &["prefix_0", "prefix_1", "prefix_2"]);
        let suffix = joined(&caps, &["suffix_1", "suffix_2", "suffix_3"]);

        let (arg, type_tag, options, name, count) = match caps.name("var_arg") {
            Some(var_arg) => {
                let mut arg = var_arg.as_str();
                let mut count = caps.name("var_count").map(|m| m.as_str());
                if count.is_none()
                    && let Some(stripped) = arg.strip_suffix(['+', '*', '?'])
                    && !stripped.is_empty()
                {
                    count = Some(&arg[stripped.len()..]);
                    arg = stripped;
                }

                let name = caps.name("var_name").map_or(arg, |m| m.as_str());
                let type_tag = caps.name("var_type").map_or(DEFAULT_TYPE, |m| m.as_str());
                let options = caps.name("var_options").map_or("", |m| m.as_str());
                (Some(arg), type_tag, options, name, count)
            },
            None => {
                let options = group(&caps, &["const_options", "const_options_1"]).unwrap_or("");
                let name = group(&caps, &["const_name", "const_name_1"]).unwrap_or(options);
                let arg = group(&caps, &["const_arg", "const_arg_1"]);
                let count = group(&caps, &["const_count", "const_count_1"]);
                (arg, "const", options, name, count)
            },
        };

        let mut list_mode = match count {
            Some("+" | "*") => ListMode::Normal,
            _ => ListMode::None,
        };
        let required = !matches!(count, Some("?" | "*"));

        if required && !was_required {
            return Err(error_at("Cannot have mandatory arguments after optional ones.".to_owned(), start));
        }
        was_required = required;

        if let Some(arg) = arg {
            if arg_names.contains(arg) {
                return Err(error_at(format!("Duplicate parameter name '{arg}'"), start));
            }
            if signature.varargs_name() == Some(arg) {
                list_mode = ListMode::VarArgs;
            }
            if signature.kwargs_name() == Some(arg) {
                return Err(error_at("Cannot directly reference a function's kwargs argument.".to_owned(), start));
            }
            if !signature.contains(arg) && signature.kwargs_name().is_none() {
                return Err(error_at(format!("Bound function has no argument named '{arg}'"), start));
            }
            arg_names.insert(arg);
        }

        let factory = types
            .get(type_tag)
            .ok_or_else(|| error_at(format!("Unknown parameter type '{type_tag}'"), start))?;
        let parser = factory(options).map_err(|message| error_at(message, start))?;

        let param = Parameter {
            index: params.len(),
            arg: arg.map(str::to_owned),
            type_tag: type_tag.to_owned(),
            options: options.to_owned(),
            name: name.to_owned(),
            list_mode,
            required,
            parser,
        };
        eol = param.consumes_rest();

        let ellipsis = if list_mode == ListMode::None { "" } else { "..." };
        usage.push(format!("{prefix}{name}{ellipsis}{suffix}"));
        params.push(param);
    }

    Ok(CompiledParams { params, usage: usage.join(" "), binding_arg, default_error })
}

fn group<'t>(caps: &Captures<'t>, names: &[&str]) -> Option<&'t str> {
    names.iter().find_map(|name| caps.name(name)).map(|m| m.as_str())
}

fn joined(caps: &Captures<'_>, names: &[&str]) -> String {
    names.iter().filter_map(|name| caps.name(name)).map(|m| m.as_str()).collect()
}

/// Presentation and gating details of a binding.
#[derive(Clone, Default)]
pub struct BindOptions {
    pub summary: Option<String>,
    pub label: Option<String>,
    pub precheck: Option<Precheck>,
}

impl BindOptions {
    pub fn new() -> BindOptions {
        BindOptions::default()
    }

    pub fn summary(mut self, summary: &str) -> BindOptions {
        self.summary = Some(summary.to_owned());
        self
    }

    pub fn label(mut self, label: &str) -> BindOptions {
        self.label = Some(label.to_owned());
        self
    }

    pub fn precheck(mut self, precheck: impl Fn(&Event) -> bool + Send + Sync + 'static) -> BindOptions {
        self.precheck = Some(Arc::new(precheck));
        self
    }
}

/// A usage string compiled against a handler. See the module documentation for the syntax.
pub struct Binding {
    handler: Arc<dyn Handler>,
    params: Vec<Parameter>,
    usage: String,
    binding_arg: Option<BindingArg>,
    default_error: bool,
    summary: Option<String>,
    label: Option<String>,
    precheck: Option<Precheck>,
    min_args: usize,
    max_args: Option<usize>,
}

impl Binding {
    pub fn new(
        handler: Arc<dyn Handler>,
        paramstring: &str,
        options: BindOptions,
        types: &TypeRegistry,
    ) -> Result<Binding, ParseError> {
        let CompiledParams { params, usage, binding_arg, default_error } =
            compile(paramstring, handler.signature(), types)?;

        let min_args = params.iter().filter(|p| p.required).count();
        let max_args = match params.last() {
            Some(last) if last.consumes_rest() => None,
            _ => Some(params.len()),
        };

        Ok(Binding {
            handler,
            params,
            usage,
            binding_arg,
            default_error,
            summary: options.summary,
            label: options.label,
            precheck: options.precheck,
            min_args,
            max_args,
        })
    }

    pub fn usage(&self) -> &str {
        &self.usage
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn default_error(&self) -> bool {
        self.default_error
    }

    pub fn binding_arg(&self) -> Option<&BindingArg> {
        self.binding_arg.as_ref()
    }

    pub fn min_args(&self) -> usize {
        self.min_args
    }

    pub fn max_args(&self) -> Option<usize> {
        self.max_args
    }

    /// Checks the event's words against this binding and produces the handler's arguments.
    ///
    /// `positional` and `named` are passed through to the handler alongside the bound values.
    pub fn bind(
        self: &Arc<Self>,
        event: &Event,
        mut positional: Vec<Value>,
        mut named: HashMap<String, Value>,
    ) -> Result<BoundArgs, CommandError> {
        if let Some(precheck) = &self.precheck
            && !precheck(event)
        {
            return Err(UsageError::precheck(None).into());
        }

        let arglist = event.arglist();
        if arglist.len() > self.params.len() && !self.params.last().is_some_and(Parameter::consumes_rest) {
            return Err(UsageError::argument_count(self.min_args, self.max_args, arglist.len()).into());
        }

        for param in &self.params {
            param.validate(arglist)?;
        }

        let mut varargs = Vec::new();
        for param in &self.params {
            let Some(value) = param.parse(arglist)? else {
                continue;
            };
            let Some(arg) = &param.arg else {
                continue;
            };

            match (param.list_mode, value) {
                (ListMode::VarArgs, Value::List(values)) => varargs.extend(values),
                (ListMode::VarArgs, value) => varargs.push(value),
                (_, value) => {
                    named.insert(arg.clone(), value);
                },
            }
        }

        match &self.binding_arg {
            Some(BindingArg::First) => positional.insert(0, Value::Binding(self.clone())),
            Some(BindingArg::Last) if !varargs.is_empty() => varargs.push(Value::Binding(self.clone())),
            Some(BindingArg::Last) => positional.push(Value::Binding(self.clone())),
            Some(BindingArg::Named(name)) => {
                named.insert(name.clone(), Value::Binding(self.clone()));
            },
            None => {},
        }

        Ok(self.handler.signature().bind(positional, varargs, named)?)
    }

    /// Binds and, on success, runs the handler.
    pub async fn call(
        self: &Arc<Self>,
        event: &Event,
        positional: Vec<Value>,
        named: HashMap<String, Value>,
    ) -> Result<Value, CommandError> {
        let args = self.bind(event, positional, named)?;
        event.set_binding(self.clone());
        self.handler.call(event, args).await.map_err(CommandError::from_handler)
    }
}

impl Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("usage", &self.usage)
            .field("params", &self.params)
            .field("binding_arg", &self.binding_arg)
            .field("default_error", &self.default_error)
            .field("summary", &self.summary)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use ircbot_proc_macro::handler;

    use super::*;
    use crate::command::errors::UsageErrorKind;

    #[handler]
    async fn set(_event: &Event, key: String, value: String) -> anyhow::Result<String> {
        Ok(format!("{key}={value}"))
    }

    #[handler]
    async fn action(_event: &Event, action: String, message: Option<String>) -> anyhow::Result<String> {
        Ok(format!("{action}:{}", message.unwrap_or_default()))
    }

    #[handler]
    async fn number(_event: &Event, n: i64) -> anyhow::Result<i64> {
        Ok(n)
    }

    #[handler]
    async fn words(_event: &Event, first: Option<String>, #[varargs] rest: Vec<String>) -> anyhow::Result<String> {
        Ok(format!("{}|{}", first.unwrap_or_default(), rest.join(",")))
    }

    #[handler]
    async fn anything(_event: &Event, #[kwargs] extra: HashMap<String, Value>) -> anyhow::Result<i64> {
        Ok(extra.len() as i64)
    }

    #[handler]
    async fn help_like(_event: &Event, full: bool) -> anyhow::Result<bool> {
        Ok(full)
    }

    fn compile_for(paramstring: &str, handler: &dyn Handler) -> Result<CompiledParams, ParseError> {
        compile(paramstring, handler.signature(), TypeRegistry::builtin())
    }

    fn binding(paramstring: &str, handler: impl Handler + 'static) -> Arc<Binding> {
        Arc::new(Binding::new(Arc::new(handler), paramstring, BindOptions::new(), TypeRegistry::builtin()).unwrap())
    }

    fn usage_error(result: Result<impl Debug, CommandError>) -> UsageError {
        match result {
            Err(CommandError::Usage(e)) => e,
            other => panic!("expected a usage error, got {other:?}"),
        }
    }

    #[test]
    fn compiles_variables_and_constants() {
        let compiled = compile_for("action=add|delete [<message:line?text>]", &action_handler).unwrap();
        assert_eq!(compiled.usage, "add|delete [<text>]");
        assert_eq!(compiled.params.len(), 2);

        let action = &compiled.params[0];
        assert_eq!(action.arg.as_deref(), Some("action"));
        assert_eq!(action.type_tag, "const");
        assert_eq!(action.options, "add|delete");
        assert!(action.required);

        let message = &compiled.params[1];
        assert_eq!(message.index, 1);
        assert_eq!(message.type_tag, "line");
        assert_eq!(message.name, "text");
        assert!(message.eol());
    }

    #[test]
    fn compile_is_deterministic() {
        let a = compile_for("<key> <value:line>", &set_handler).unwrap();
        let b = compile_for("<key> <value:line>", &set_handler).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.usage, "<key> <value>");
    }

    #[test]
    fn bare_and_named_constants_are_separate_chunks() {
        let compiled = compile_for("config action=add|delete", &action_handler).unwrap();
        assert_eq!(compiled.usage, "config add|delete");
        assert_eq!(compiled.params.len(), 2);
        assert_eq!(compiled.params[0].arg, None);
        assert_eq!(compiled.params[0].options, "config");
        assert_eq!(compiled.params[1].arg.as_deref(), Some("action"));
        assert_eq!(compiled.params[1].options, "add|delete");

        let compiled = compile_for("[?full=FULL]", &help_like_handler).unwrap();
        assert_eq!(compiled.usage, "[FULL]");
        assert!(!compiled.params[0].required);
    }

    #[test]
    fn options_are_not_parameters() {
        let compiled = compile_for("/u <key> /b=value", &set_handler).unwrap();
        assert!(compiled.default_error);
        assert_eq!(compiled.binding_arg, Some(BindingArg::Named("value".into())));
        assert_eq!(compiled.params.len(), 1);
        assert_eq!(compiled.params[0].index, 0);

        let err = compile_for("/x", &set_handler).unwrap_err();
        assert_eq!(err.message, "Unrecognized option 'x'");
        let err = compile_for("/b=", &set_handler).unwrap_err();
        assert_eq!(err.message, "b= must specify a kwarg");
    }

    #[test]
    fn mandatory_after_optional_is_rejected() {
        let err = compile_for("<?key> <value>", &set_handler).unwrap_err();
        assert_eq!(err.message, "Cannot have mandatory arguments after optional ones.");
        assert_eq!(err.pos, 7);

        let err = compile_for("<key?> <value>", &set_handler).unwrap_err();
        assert_eq!(err.message, "Cannot have mandatory arguments after optional ones.");
    }

    #[test]
    fn list_must_be_last() {
        for paramstring in ["<*key> <value>", "<key*> <value>", "<key:line> <value>"] {
            let err = compile_for(paramstring, &set_handler).unwrap_err();
            assert_eq!(
                err.message,
                "Previous parameter consumes remainder of line, cannot have additional parameters."
            );
        }
    }

    #[test]
    fn names_are_checked_against_signature() {
        let err = compile_for("<key> <key>", &set_handler).unwrap_err();
        assert_eq!(err.message, "Duplicate parameter name 'key'");

        let err = compile_for("<nope>", &set_handler).unwrap_err();
        assert_eq!(err.message, "Bound function has no argument named 'nope'");
        assert_eq!(err.to_string(), "Bound function has no argument named 'nope'");

        assert!(compile_for("<nope> <other:int>", &anything_handler).is_ok());
        let err = compile_for("<extra>", &anything_handler).unwrap_err();
        assert_eq!(err.message, "Cannot directly reference a function's kwargs argument.");

        let compiled = compile_for("<first> <rest>", &words_handler).unwrap();
        assert_eq!(compiled.params[1].list_mode, ListMode::VarArgs);
        assert_eq!(compiled.usage, "<first> <rest...>");
    }

    #[test]
    fn bad_chunks_are_rejected() {
        let err = compile_for("<key> <value", &set_handler).unwrap_err();
        assert_eq!(err.message, "Unexpected characters");
        assert_eq!(err.pos, 6);

        let err = compile_for("<key:nosuchtype>", &set_handler).unwrap_err();
        assert_eq!(err.message, "Unknown parameter type 'nosuchtype'");

        let err = compile_for("<n:int:9..1>", &number_handler).unwrap_err();
        assert_eq!(err.message, "minval > maxval");
    }

    #[tokio::test]
    async fn binds_rest_of_line() {
        let binding = binding("<key> <value:line>", set_handler);
        let event = Event::new("foo bar  baz");
        assert_eq!(binding.call(&event, vec![], HashMap::new()).await.unwrap(), Value::from("foo=bar  baz"));
        assert!(event.binding().is_some());
    }

    #[tokio::test]
    async fn constants_are_lowercased_and_checked() {
        let binding = binding("action=add|delete [<?message:line>]", action_handler);

        let event = Event::new("ADD some text");
        assert_eq!(
            binding.call(&event, vec![], HashMap::new()).await.unwrap(),
            Value::from("add:some text")
        );

        let err = usage_error(binding.bind(&Event::new("remove"), vec![], HashMap::new()));
        assert!(err.to_string().contains("add, delete"), "{err}");
        assert_eq!(err.param, Some(0));
    }

    #[test]
    fn numbers_are_range_checked() {
        let binding = binding("<n:int:1..10>", number_handler);

        let err = usage_error(binding.bind(&Event::new("15"), vec![], HashMap::new()));
        assert_eq!(err.to_string(), "n must be <= 10");

        let err = usage_error(binding.bind(&Event::new("x"), vec![], HashMap::new()));
        assert_eq!(err.to_string(), "n must be an integer");
    }

    #[test]
    fn argument_count_is_checked() {
        let binding = binding("<key> <value>", set_handler);

        let err = usage_error(binding.bind(&Event::new("a b c"), vec![], HashMap::new()));
        assert_eq!(err.kind, UsageErrorKind::ArgumentCount { min: 2, max: Some(2), got: 3 });
        assert_eq!(err.to_string(), "Too many arguments.  (Expected 2, got 3)");

        let err = usage_error(binding.bind(&Event::new("a"), vec![], HashMap::new()));
        assert_eq!(err.to_string(), "value must be specified");
    }

    #[test]
    fn list_parameters_collect_words() {
        let binding = binding("[<?first>] [<*rest>]", words_handler);
        assert_eq!(binding.min_args(), 0);
        assert_eq!(binding.max_args(), None);

        let mut args = binding.bind(&Event::new("a b c"), vec![], HashMap::new()).unwrap();
        assert_eq!(args.take::<Option<String>>("first").unwrap().as_deref(), Some("a"));
        assert_eq!(args.take_varargs::<String>("rest").unwrap(), vec!["b", "c"]);

        let args = binding.bind(&Event::new(""), vec![], HashMap::new()).unwrap();
        assert!(args.varargs().is_empty());
    }

    #[test]
    fn required_list_needs_one_word() {
        let binding = binding("<first> <+rest>", words_handler);
        let err = usage_error(binding.bind(&Event::new("a"), vec![], HashMap::new()));
        assert_eq!(err.to_string(), "At least one rest must be specified");
    }

    #[test]
    fn precheck_gates_binding() {
        let binding = Arc::new(
            Binding::new(
                Arc::new(number_handler),
                "<n:int>",
                BindOptions::new().precheck(|event| event.nick.as_deref() == Some("admin")),
                TypeRegistry::builtin(),
            )
            .unwrap(),
        );

        let err = usage_error(binding.bind(&Event::new("1"), vec![], HashMap::new()));
        assert!(err.is_precheck());

        let event = Event::new("1").with_source(Some("admin"), None);
        assert!(binding.bind(&event, vec![], HashMap::new()).is_ok());
    }

    #[test]
    fn binding_can_be_injected() {
        #[handler]
        async fn introspect(_event: &Event, binding: Arc<Binding>, n: i64) -> anyhow::Result<String> {
            Ok(format!("{} {n}", binding.usage()))
        }

        let first = binding("/b <n:int>", introspect_handler);
        let mut args = first.bind(&Event::new("3"), vec![], HashMap::new()).unwrap();
        assert!(Arc::ptr_eq(&args.take::<Arc<Binding>>("binding").unwrap(), &first));

        let named = binding("<n:int> /b=binding", introspect_handler);
        let mut args = named.bind(&Event::new("4"), vec![], HashMap::new()).unwrap();
        assert!(Arc::ptr_eq(&args.take::<Arc<Binding>>("binding").unwrap(), &named));
        assert_eq!(args.take::<i64>("n").unwrap(), 4);
    }
}
