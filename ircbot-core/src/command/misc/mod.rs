//! Commands every bot gets, registered by whoever builds the bot.

pub mod help;
