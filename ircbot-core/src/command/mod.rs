//! The command system.
//!
//! The key things that make up the command system are:
//!
//! - The [`Handler`] trait: Defines the `call` method which runs the actual command, given the
//!   event and the arguments bound to its parameters.
//!
//!   Normally, you don't want or need to implement this trait manually. Just write the function and
//!   annotate it with `#[handler]`, which generates a type that implements this trait (and
//!   delegates to the annotated function). The generated type also knows the function's
//!   [`signature::Signature`], which is what usage strings are compiled against.
//!
//! - Bindings (binding.rs): a usage string such as `action=add|delete <message:line?text>`
//!   compiled against one handler. A binding checks and converts an event's words into the
//!   handler's arguments, or fails with a [`errors::UsageError`].
//!
//! - Commands (command.rs): a name, aliases and an ordered list of bindings. Invoking a command
//!   tries each binding in turn and reports the most useful usage error if none fits.
//!
//! - The registry: registry.rs splits incoming lines into prefix, name and text, and maps names
//!   onto commands through literal aliases and ordered patterns.

use std::fmt::Display;
use std::sync::{Arc, OnceLock};

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;

use self::arguments::ArgumentList;
use self::binding::Binding;
use self::command::Command;
use self::signature::{BoundArgs, Signature};
use self::value::Value;
use crate::bot::ThreadSafeBot;

pub mod arguments;
pub mod binding;
#[allow(clippy::module_inception)]
pub mod command;
pub mod errors;
pub mod misc;
pub mod pattern;
pub mod registry;
pub mod signature;
pub mod types;
pub mod value;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Admin,
    Fun,
    Info,
    Misc,
    None(String),
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Admin => "admin",
                Self::Fun => "fun",
                Self::Info => "info",
                Self::Misc => "misc",
                Self::None(t) => &**t,
            }
        )
    }
}

impl From<String> for Category {
    fn from(v: String) -> Category {
        match &*v {
            "admin" => Category::Admin,
            "fun" => Category::Fun,
            "info" => Category::Info,
            "misc" => Category::Misc,
            t => Category::None(t.to_string()),
        }
    }
}

/// Something that can be bound to a usage string and invoked.
///
/// You usually don't want to or need to implement this manually -- write the function that handles
/// the command and apply the `#[handler]` proc macro.
#[async_trait]
pub trait Handler: Send + Sync {
    /// The parameters of the handler, not counting the event.
    fn signature(&self) -> &Signature;

    async fn call(&self, event: &Event, args: BoundArgs) -> anyhow::Result<Value>;
}

/// One command invocation.
pub struct Event {
    /// The prefix the command was invoked with, e.g. `!`. Empty if there was none.
    pub prefix: String,
    /// The command name as typed.
    pub name: String,
    /// Everything after the command name.
    pub text: String,
    /// Who sent the line.
    pub nick: Option<String>,
    /// Where the line was sent: a channel, or our own nick for private messages.
    pub target: Option<String>,
    /// Whether `target` is a channel.
    pub in_channel: bool,
    command: Option<Arc<Command>>,
    arglist: OnceLock<ArgumentList>,
    binding: Mutex<Option<Arc<Binding>>>,
    bot: Option<ThreadSafeBot>,
}

impl Event {
    pub fn new(text: &str) -> Event {
        Event {
            prefix: String::new(),
            name: String::new(),
            text: text.to_owned(),
            nick: None,
            target: None,
            in_channel: false,
            command: None,
            arglist: OnceLock::new(),
            binding: Mutex::new(None),
            bot: None,
        }
    }

    pub fn with_command(mut self, name: &str, prefix: &str) -> Event {
        name.clone_into(&mut self.name);
        prefix.clone_into(&mut self.prefix);
        self
    }

    pub fn with_source(mut self, nick: Option<&str>, target: Option<&str>) -> Event {
        self.nick = nick.map(str::to_owned);
        self.in_channel = target.is_some_and(is_channel);
        self.target = target.map(str::to_owned);
        self
    }

    pub fn with_resolved(mut self, command: Arc<Command>) -> Event {
        self.command = Some(command);
        self
    }

    pub fn with_bot(mut self, bot: ThreadSafeBot) -> Event {
        self.bot = Some(bot);
        self
    }

    /// Prefix and name, as typed.
    pub fn full_name(&self) -> String {
        format!("{}{}", self.prefix, self.name)
    }

    pub fn command(&self) -> Option<&Arc<Command>> {
        self.command.as_ref()
    }

    /// The words of `text`. Computed on first use.
    pub fn arglist(&self) -> &ArgumentList {
        self.arglist.get_or_init(|| ArgumentList::new(&self.text))
    }

    /// The binding that accepted this event, once one has.
    pub fn binding(&self) -> Option<Arc<Binding>> {
        self.binding.lock().clone()
    }

    pub(crate) fn set_binding(&self, binding: Arc<Binding>) {
        *self.binding.lock() = Some(binding);
    }

    pub fn bot(&self) -> Option<&ThreadSafeBot> {
        self.bot.as_ref()
    }

    /// Replies through the bot that received this event, addressing the sender in channels.
    pub fn reply(&self, text: &str) -> anyhow::Result<()> {
        let bot = self.bot.as_ref().context("event did not come from a bot")?;
        bot.reply(self, text);
        Ok(())
    }

    /// Sends a notice to whoever sent this event.
    pub fn notice(&self, text: &str) -> anyhow::Result<()> {
        let bot = self.bot.as_ref().context("event did not come from a bot")?;
        let nick = self.nick.as_deref().context("event has no sender")?;
        bot.notice(nick, text);
        Ok(())
    }

    /// Where a reply should go: the channel, or the sender for private messages.
    pub fn reply_target(&self) -> Option<&str> {
        if self.in_channel { self.target.as_deref() } else { self.nick.as_deref().or(self.target.as_deref()) }
    }
}

/// Whether an IRC target names a channel.
pub fn is_channel(target: &str) -> bool {
    target.starts_with(['#', '&', '+', '!'])
}
