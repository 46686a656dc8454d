use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};

use ircbot_common::config::config::{BotConfig, ThrottleLimits};
use ircbot_common::err;
use ircbot_common::util::wrap_text;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::command::command::Command;
use crate::command::errors::{ErrorSeverity, GetErrorSeverity};
use crate::command::registry::{Registry, RegistryError};
use crate::command::{Event, is_channel};
use crate::emitter::EventEmitter;
use crate::irc_handler::incoming_event::IncomingEvent;
use crate::task::Task;
use crate::throttle::Throttle;
use crate::transport::{MessageKind, Transport};
use crate::usertrack::{UserTracker, irc_lower};

pub type ThreadSafeBot = Arc<Bot>;

/// Main bot structure. Shared between every task that handles IRC events, and reachable from
/// every command [`Event`].
pub struct Bot {
    /// The configuration the bot was built with.
    pub config: BotConfig,
    /// Every registered command.
    pub registry: RwLock<Registry>,
    /// Where outgoing lines go.
    pub transport: Arc<dyn Transport>,
    /// Listeners for IRC lifecycle events, keyed by event name.
    pub emitter: Arc<EventEmitter<IncomingEvent>>,
    /// WHOIS results.
    pub users: UserTracker,
    /// Tasks registered against the bot, aborted when the bot shuts down.
    pub tasks: Mutex<Vec<Task>>,
    global_throttle: Throttle,
    target_throttles: Mutex<HashMap<String, Throttle>>,
}
impl Bot {
    pub fn new(config: BotConfig, transport: Arc<dyn Transport>) -> anyhow::Result<Bot> {
        config.validate()?;

        let registry = Registry::new(&config.main.prefix, config.main.cache_size)?;
        let global_throttle = Throttle::from_limits(config.main.global_limits())?.unwrap_or_else(Throttle::unlimited);

        Ok(Bot {
            registry: RwLock::new(registry),
            users: UserTracker::new(transport.clone()),
            transport,
            emitter: Arc::new(EventEmitter::new()),
            tasks: Mutex::new(Vec::new()),
            global_throttle,
            target_throttles: Mutex::new(HashMap::new()),
            config,
        })
    }

    pub fn register(&self, command: Command) -> Result<Arc<Command>, RegistryError> {
        self.registry.write().register(command)
    }

    pub fn register_task(&self, task: Task) {
        self.tasks.lock().push(task);
    }

    /// Sends a PRIVMSG. The text may contain newlines, which split it into several messages; each
    /// message is word wrapped and throttled.
    pub fn message(self: &Arc<Self>, target: &str, text: &str) {
        self.send(MessageKind::Privmsg, target, text);
    }

    /// Sends a NOTICE, split, wrapped and throttled like [`Bot::message`].
    pub fn notice(self: &Arc<Self>, target: &str, text: &str) {
        self.send(MessageKind::Notice, target, text);
    }

    /// Answers an event where it came from, addressing the sender by name in channels.
    pub fn reply(self: &Arc<Self>, event: &Event, text: &str) {
        let Some(target) = event.reply_target() else {
            warn!(command = %event.name, "Cannot reply to an event without a source");
            return;
        };

        match (&event.nick, event.in_channel) {
            (Some(nick), true) => self.message(target, &format!("{nick}: {text}")),
            _ => self.message(target, text),
        }
    }

    fn send(self: &Arc<Self>, kind: MessageKind, target: &str, text: &str) {
        let main = &self.config.main;
        for line in text.replace('\r', "").split('\n') {
            for line in wrap_text(line, main.wrap_length, &main.wrap_indent) {
                let transport = self.transport.clone();
                let destination = target.to_owned();
                self.throttled(Some(target), async move { transport.send(kind, &destination, &line).await });
            }
        }
    }

    /// Runs `job` once the throttles allow it: first the throttle for `target` (if any), then the
    /// global one.
    pub fn throttled<F>(self: &Arc<Self>, target: Option<&str>, job: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.throttled_with_cost(target, 1, job);
    }

    /// Like [`Bot::throttled`], with `cost` charged against the global throttle.
    pub fn throttled_with_cost<F>(self: &Arc<Self>, target: Option<&str>, cost: u32, job: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let Some(target) = target else {
            self.global_throttle.add_with_cost(cost, job);
            self.global_throttle.start();
            return;
        };

        let key = irc_lower(target);
        let mut throttles = self.target_throttles.lock();
        let throttle = match throttles.get(&key) {
            Some(throttle) => throttle.clone(),
            None => {
                let Some(throttle) = self.target_throttle(&key) else {
                    drop(throttles);
                    self.global_throttle.add_with_cost(cost, job);
                    self.global_throttle.start();
                    return;
                };
                throttles.insert(key, throttle.clone());
                throttle
            },
        };

        let global = self.global_throttle.clone();
        throttle.add(async move {
            global.add_with_cost(cost, job);
            global.start();
            Ok(())
        });
        throttle.start();
    }

    /// A new throttle for one target, or `None` if that kind of target is not throttled. The
    /// throttle removes itself from the map once it has been idle long enough to be full again.
    fn target_throttle(self: &Arc<Self>, key: &str) -> Option<Throttle> {
        let limits: ThrottleLimits =
            if is_channel(key) { self.config.main.channel_limits() } else { self.config.main.user_limits() };

        let throttle = match Throttle::from_limits(limits) {
            Ok(throttle) => throttle?,
            Err(e) => {
                err!("Invalid throttle limits for {key}: {e}");
                return None;
            },
        };

        let bot: Weak<Bot> = Arc::downgrade(self);
        let key = key.to_owned();
        throttle.on_clear(move |throttle| {
            let Some(bot) = bot.upgrade() else {
                throttle.stop();
                return;
            };

            let mut throttles = bot.target_throttles.lock();
            if throttle.is_empty() && throttles.get(&key).is_some_and(|t| t.ptr_eq(throttle)) {
                throttles.remove(&key);
                throttle.stop();
                debug!(throttle = %key, "Dropped idle throttle");
            }
        });

        Some(throttle)
    }

    /// Number of targets that currently have a throttle of their own.
    pub fn throttled_targets(&self) -> usize {
        self.target_throttles.lock().len()
    }

    /// Stops every throttle and drops everything still queued, e.g. after a disconnect.
    pub fn reset_throttles(&self) {
        self.global_throttle.reset();
        for (_, throttle) in self.target_throttles.lock().drain() {
            throttle.reset();
        }
    }

    /// Handles one PRIVMSG. Returns whether it invoked a command.
    ///
    /// Usage errors are sent to the user as a notice. Anything else is logged, and sent as a notice
    /// to the configured `notify` nick, or to the target the command came from.
    pub async fn handle_line(self: &Arc<Self>, target: &str, nick: &str, text: &str) -> bool {
        let event = self.registry.read().parse(text);
        let Some(event) = event else {
            return false;
        };
        let event = event.with_source(Some(nick), Some(target)).with_bot(self.clone());

        let Some(command) = event.command().cloned() else {
            debug!(name = %event.name, %nick, "Unknown command");
            return false;
        };

        debug!(command = %command.name, %nick, to = %target, "Dispatching command");
        if let Err(e) = command.call(&event).await {
            match e.get_severity() {
                ErrorSeverity::Low => {
                    debug!(command = %command.name, %nick, "Usage error: {e}");
                    self.notice(nick, &e.to_string());
                },
                ErrorSeverity::High => {
                    err!("Command {} failed for {nick} in {target}: {e}", command.name);
                    let notify = self.config.main.notify.as_deref().unwrap_or(target);
                    self.notice(notify, &e.to_string());
                },
            }
        }

        true
    }

    /// Joins every configured channel.
    pub async fn join_channels(&self) {
        for channel in &self.config.main.channels {
            match self.transport.join(channel).await {
                Ok(()) => info!(%channel, "Joined channel"),
                Err(e) => err!("Failed to join {channel}: {e:#}"),
            }
        }
    }

    /// Aborts every registered task.
    pub fn shutdown(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.reset_throttles();
    }
}
