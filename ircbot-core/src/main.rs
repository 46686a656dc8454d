use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use ircbot_common::config::config::BotConfig;
use ircbot_common::config::DEFAULT_CONFIG_LOCATION;
use ircbot_common::ok_or_break;
use ircbot_common::util::tracing_init;
use ircbot_core::command::misc::help::help_command;
use ircbot_core::irc_handler::handle_raw_event;
use ircbot_core::irc_handler::incoming_event::IncomingEvent;
use ircbot_core::transport::ConsoleTransport;
use ircbot_core::{Bot, ThreadSafeBot};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, trace, warn};

/// Reads the configuration named on the command line, or `./config.toml`. A missing default file
/// means default settings.
fn load_config() -> anyhow::Result<BotConfig> {
    match std::env::args().nth(1) {
        Some(path) => BotConfig::from_file(path),
        None if Path::new(DEFAULT_CONFIG_LOCATION).exists() => BotConfig::from_file(DEFAULT_CONFIG_LOCATION),
        None => Ok(BotConfig::default()),
    }
}

/// Turns one line of input into an event. Raw protocol lines start with `:`; anything else is read
/// as `target nick text`, a message sent by `nick` to `target`.
fn parse_input(line: &str) -> Option<IncomingEvent> {
    if line.starts_with(':') {
        return IncomingEvent::try_from(line).ok();
    }

    let mut parts = line.splitn(3, ' ');
    let target = parts.next().filter(|t| !t.is_empty())?;
    let nick = parts.next()?;
    Some(IncomingEvent::Message {
        target: target.to_owned(),
        nick: nick.to_owned(),
        text: parts.next().unwrap_or_default().to_owned(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    tracing_init(&config.logging.filter);

    info!("Initialising");
    let bot: ThreadSafeBot = Arc::new(Bot::new(config, Arc::new(ConsoleTransport::default()))?);
    bot.register(help_command(true)?)?;

    handle_raw_event(bot.clone(), IncomingEvent::Connect).await;

    info!("Reading events from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        // break on read errors as well as end of input
        let Some(line) = ok_or_break!(lines.next_line().await) else {
            break;
        };
        trace!("got line: {}", line);

        match parse_input(&line) {
            Some(event) => handle_raw_event(bot.clone(), event).await,
            None => warn!("Ignoring unrecognised input: {line}"),
        }
    }

    handle_raw_event(bot.clone(), IncomingEvent::Disconnect).await;
    bot.shutdown();
    info!("Input closed, shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_messages() {
        assert_eq!(
            parse_input("#rust alice !help full"),
            Some(IncomingEvent::Message {
                target: "#rust".to_owned(),
                nick: "alice".to_owned(),
                text: "!help full".to_owned(),
            })
        );
        assert_eq!(parse_input("#rust"), None);
        assert_eq!(parse_input(""), None);
    }

    #[test]
    fn raw_lines_are_parsed() {
        assert_eq!(
            parse_input(":alice!a@h JOIN #rust"),
            Some(IncomingEvent::Join { channel: "#rust".to_owned(), nick: "alice".to_owned() })
        );
        assert_eq!(parse_input(":server PING x"), None);
    }
}
