use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ircbot_common::err;
use ircbot_common::util::dependency::{DependencyDict, DependencyError};
use moka::sync::Cache;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info};

use super::Event;
use super::command::Command;
use super::pattern::Pattern;

/// Splits a line into prefix, command name and the rest. `%%` is replaced by the escaped prefix.
pub const DEFAULT_PATTERN: &str = r"(?P<prefix>%%)(?P<name>\S+)(?:\s+(?P<text>.*\S)?\s*)?";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("pattern must have a group named '{0}'")]
    MissingGroup(&'static str),
    #[error("invalid command pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("Duplicate command alias '{0}'")]
    DuplicateAlias(String),
    #[error("Duplicate pattern key '{0}'")]
    DuplicatePattern(String),
    #[error(transparent)]
    Dependency(#[from] DependencyError),
}

/// Maps command names onto commands.
///
/// Literal aliases are checked first, then patterns in dependency order. Pattern lookups are cached
/// by name until the next registration that brings in new patterns.
pub struct Registry {
    regex: Regex,
    has_prefix: bool,
    aliases: HashMap<String, Arc<Command>>,
    patterns: DependencyDict<String, (Pattern, Arc<Command>)>,
    commands: Vec<Arc<Command>>,
    cache: Option<Cache<String, Option<Arc<Command>>>>,
}

impl Registry {
    /// A registry recognising `{prefix}{name} {text}`.
    pub fn new(prefix: &str, cache_size: u64) -> Result<Registry, RegistryError> {
        Registry::with_pattern(&DEFAULT_PATTERN.replace("%%", &regex::escape(prefix)), cache_size)
    }

    /// A registry using a custom line pattern, which must have `name` and `text` groups and may have
    /// a `prefix` group. The pattern must match the whole line.
    pub fn with_pattern(pattern: &str, cache_size: u64) -> Result<Registry, RegistryError> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))?;
        let groups: HashSet<&str> = regex.capture_names().flatten().collect();

        for group in ["name", "text"] {
            if !groups.contains(group) {
                return Err(RegistryError::MissingGroup(group));
            }
        }
        let has_prefix = groups.contains("prefix");

        let cache = (cache_size > 0).then(|| Cache::builder().max_capacity(cache_size).build());

        Ok(Registry {
            regex,
            has_prefix,
            aliases: HashMap::new(),
            patterns: DependencyDict::new(),
            commands: Vec::new(),
            cache,
        })
    }

    /// Adds a command. Nothing is added if any of its aliases is taken or its patterns cannot be
    /// ordered.
    pub fn register(&mut self, command: Command) -> Result<Arc<Command>, RegistryError> {
        let command = Arc::new(command);

        let mut aliases = vec![command.name.to_lowercase()];
        aliases.extend(command.aliases.iter().map(|a| a.to_lowercase()));
        aliases.dedup();
        if let Some(taken) = aliases.iter().find(|a| self.aliases.contains_key(*a)) {
            return Err(RegistryError::DuplicateAlias(taken.clone()));
        }

        let mut keys = HashSet::new();
        for pattern in &command.patterns {
            let key = pattern.get_key();
            if self.patterns.contains_key(&key.to_owned()) || !keys.insert(key) {
                return Err(RegistryError::DuplicatePattern(key.to_owned()));
            }
        }

        let added = self.add_patterns(&command);
        if let Err(e) = added.and_then(|()| self.patterns.ordered_keys().map(|_| ())) {
            for key in keys {
                self.patterns.remove(&key.to_owned());
            }
            return Err(e.into());
        }

        for alias in aliases {
            self.aliases.insert(alias, command.clone());
        }
        self.commands.push(command.clone());

        if !command.patterns.is_empty()
            && let Some(cache) = &self.cache
        {
            cache.invalidate_all();
        }

        info!(command = %command.name, "Registered command");
        Ok(command)
    }

    fn add_patterns(&mut self, command: &Arc<Command>) -> Result<(), DependencyError> {
        for pattern in &command.patterns {
            self.patterns.add(
                pattern.get_key().to_owned(),
                (pattern.clone(), command.clone()),
                pattern.relations().clone(),
            )?;
        }
        Ok(())
    }

    /// The command a name refers to.
    pub fn lookup(&self, name: &str) -> Option<Arc<Command>> {
        let search = name.trim().to_lowercase();
        if let Some(command) = self.aliases.get(&search) {
            return Some(command.clone());
        }

        let Some(cache) = &self.cache else {
            return self.pattern_lookup(&search);
        };

        if let Some(hit) = cache.get(&search) {
            return hit;
        }
        let found = self.pattern_lookup(&search);
        cache.insert(search, found.clone());
        found
    }

    /// Every command a name refers to: the literal alias first, then matching patterns in order.
    pub fn lookup_all(&self, name: &str) -> Vec<Arc<Command>> {
        let search = name.trim().to_lowercase();
        let mut found: Vec<Arc<Command>> = self.aliases.get(&search).cloned().into_iter().collect();

        match self.patterns.values() {
            Ok(values) => found.extend(
                values.filter(|(pattern, _)| pattern.is_match(&search)).map(|(_, command)| command.clone()),
            ),
            Err(e) => err!("Failed to order command patterns: {e}"),
        }
        found
    }

    fn pattern_lookup(&self, search: &str) -> Option<Arc<Command>> {
        let mut values = match self.patterns.values() {
            Ok(values) => values,
            Err(e) => {
                err!("Failed to order command patterns: {e}");
                return None;
            },
        };

        let found = values.find(|(pattern, _)| pattern.is_match(search)).map(|(_, command)| command.clone());
        debug!(search, found = ?found.as_ref().map(|c| &c.name), "Pattern lookup");
        found
    }

    /// Splits a line into an event, or returns `None` if it is not a command invocation.
    ///
    /// The event's command is set when the name resolves.
    pub fn parse(&self, line: &str) -> Option<Event> {
        let captures = self.regex.captures(line)?;
        let name = captures.name("name")?.as_str();
        let prefix = if self.has_prefix { captures.name("prefix").map_or("", |m| m.as_str()) } else { "" };
        let text = captures.name("text").map_or("", |m| m.as_str());

        let event = Event::new(text).with_command(name, prefix);
        Some(match self.lookup(name) {
            Some(command) => event.with_resolved(command),
            None => event,
        })
    }

    /// Registered commands, in registration order.
    pub fn commands(&self) -> &[Arc<Command>] {
        &self.commands
    }
}
