//! An IRC bot framework: commands bound from usage strings, throttled output, lifecycle events and
//! shared WHOIS lookups.

pub mod bot;
pub mod command;
pub mod emitter;
pub mod irc_handler;
pub mod task;
pub mod throttle;
pub mod transport;
pub mod usertrack;

pub use bot::{Bot, ThreadSafeBot};
