use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::binding::{BindOptions, Binding};
use super::errors::{CommandError, ParseError, UsageError};
use super::pattern::Pattern;
use super::types::TypeRegistry;
use super::value::Value;
use super::{Category, Event, Handler};

#[derive(Debug, Error)]
pub enum CommandBuildError {
    #[error("command has no name and no literal alias")]
    NoName,
    #[error("command {0} has no bindings")]
    NoBindings(String),
    #[error("binding #{index} of command {command}: {source}")]
    Binding {
        command: String,
        index: usize,
        source: ParseError,
    },
}

/// A named group of bindings, tried in order until one accepts the event.
#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    /// Literal aliases, lowercased. Does not include `name`.
    pub aliases: Vec<String>,
    pub patterns: Vec<Pattern>,
    pub bindings: Vec<Arc<Binding>>,
    pub category: Option<Category>,
    pub doc: Option<String>,
    /// Replaces the usage error shown when every binding fails.
    pub usage: Option<String>,
}

impl Command {
    /// Tries each binding in turn.
    ///
    /// A final usage error stops the search. Precheck failures are skipped. Of the other usage
    /// errors, the first one is kept, unless a later binding was compiled with `/u`.
    pub async fn call(&self, event: &Event) -> Result<Value, CommandError> {
        let mut retained: Option<(UsageError, &Arc<Binding>)> = None;
        let mut precheck = None;

        for binding in &self.bindings {
            match binding.call(event, Vec::new(), HashMap::new()).await {
                Ok(value) => return Ok(value),
                Err(CommandError::Usage(e)) if e.is_final() => return Err(e.into()),
                Err(CommandError::Usage(e)) if e.is_precheck() => {
                    precheck.get_or_insert(e);
                },
                Err(CommandError::Usage(e)) => {
                    debug!(command = %self.name, usage = %binding.usage(), "binding rejected: {e}");
                    if retained.is_none() || binding.default_error() {
                        retained = Some((e, binding));
                    }
                },
                Err(e) => return Err(e),
            }
        }

        if let Some(usage) = &self.usage {
            return Err(UsageError::new(usage.clone()).into());
        }

        match retained {
            Some((e, binding)) if e.message().is_none() => {
                let name = if event.name.is_empty() { self.name.clone() } else { event.full_name() };
                Err(UsageError::new(format!("Usage: {name} {}", binding.usage())).into())
            },
            Some((e, _)) => Err(e.into()),
            None => Err(precheck.unwrap_or_else(|| UsageError::precheck(None)).into()),
        }
    }

    /// A copy of this command under another name. Bindings are shared with the original.
    pub fn export(&self, name: &str) -> Command {
        Command { name: name.to_owned(), ..self.clone() }
    }

    /// One help line per binding: `{name} {usage}`, followed by ` -- {summary}` when there is one.
    pub fn usage_lines(&self, name: &str) -> Vec<String> {
        self.bindings
            .iter()
            .map(|binding| {
                let mut line = format!("{name} {}", binding.usage());
                if let Some(summary) = binding.summary() {
                    line.push_str(" -- ");
                    line.push_str(summary);
                }
                line
            })
            .collect()
    }
}

/// Starts building a command.
pub fn command(name: &str) -> CommandBuilder {
    CommandBuilder { name: Some(name.to_owned()), ..CommandBuilder::default() }
}

struct PendingBinding {
    paramstring: String,
    handler: Arc<dyn Handler>,
    options: BindOptions,
}

/// Accumulates the pieces of a [`Command`] in declaration order.
///
/// ```ignore
/// let memo = command("memo")
///     .alias("note")
///     .bind("action=add <message:line>", memo_handler)
///     .bind("action=del|delete <id:int>", memo_handler)
///     .doc("Leaves a memo.")
///     .build()?;
/// ```
#[derive(Default)]
pub struct CommandBuilder {
    name: Option<String>,
    aliases: Vec<String>,
    patterns: Vec<Pattern>,
    bindings: Vec<PendingBinding>,
    category: Option<Category>,
    doc: Vec<String>,
    usage: Option<String>,
    types: Option<Arc<TypeRegistry>>,
}

impl CommandBuilder {
    pub fn new() -> CommandBuilder {
        CommandBuilder::default()
    }

    pub fn alias(mut self, alias: &str) -> CommandBuilder {
        self.aliases.push(alias.to_lowercase());
        self
    }

    pub fn pattern(mut self, pattern: Pattern) -> CommandBuilder {
        self.patterns.push(pattern);
        self
    }

    pub fn category(mut self, category: Category) -> CommandBuilder {
        self.category = Some(category);
        self
    }

    pub fn usage(mut self, usage: &str) -> CommandBuilder {
        self.usage = Some(usage.to_owned());
        self
    }

    /// Appends a paragraph to the help text.
    pub fn doc(mut self, doc: &str) -> CommandBuilder {
        self.doc.push(doc.to_owned());
        self
    }

    /// Types used to compile this command's bindings, instead of the built-in ones.
    pub fn types(mut self, types: Arc<TypeRegistry>) -> CommandBuilder {
        self.types = Some(types);
        self
    }

    pub fn bind(self, paramstring: &str, handler: impl Handler + 'static) -> CommandBuilder {
        self.bind_with(paramstring, handler, BindOptions::new())
    }

    pub fn bind_with(mut self, paramstring: &str, handler: impl Handler + 'static, options: BindOptions) -> CommandBuilder {
        self.bindings.push(PendingBinding { paramstring: paramstring.to_owned(), handler: Arc::new(handler), options });
        self
    }

    /// Compiles every binding. Without an explicit name, the first literal alias is used.
    pub fn build(self) -> Result<Command, CommandBuildError> {
        let mut aliases = self.aliases;
        let name = match self.name {
            Some(name) => name,
            None if !aliases.is_empty() => aliases.remove(0),
            None => return Err(CommandBuildError::NoName),
        };

        if self.bindings.is_empty() {
            return Err(CommandBuildError::NoBindings(name));
        }

        let types = match &self.types {
            Some(types) => types,
            None => TypeRegistry::builtin(),
        };
        let bindings = self
            .bindings
            .into_iter()
            .enumerate()
            .map(|(index, pending)| {
                Binding::new(pending.handler, &pending.paramstring, pending.options, types)
                    .map(Arc::new)
                    .map_err(|source| CommandBuildError::Binding { command: name.clone(), index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Command {
            name,
            aliases,
            patterns: self.patterns,
            bindings,
            category: self.category,
            doc: (!self.doc.is_empty()).then(|| self.doc.join("\n")),
            usage: self.usage,
        })
    }
}
