//! The connection to the network.
//!
//! The bot never speaks IRC on the wire itself. Everything it sends goes through a [`Transport`],
//! one already wrapped and already throttled line at a time.

use std::io::Write;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

/// What a WHOIS reply told us about a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhoisInfo {
    pub nick: String,
    pub username: Option<String>,
    pub hostname: Option<String>,
    pub realname: Option<String>,
    /// Services account, if identified.
    pub account: Option<String>,
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Privmsg,
    Notice,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, kind: MessageKind, target: &str, line: &str) -> anyhow::Result<()>;

    async fn join(&self, channel: &str) -> anyhow::Result<()>;

    /// Looks a user up. `Ok(None)` if there is no such nick.
    async fn whois(&self, nick: &str) -> anyhow::Result<Option<WhoisInfo>>;
}

/// Writes outgoing lines to stdout. WHOIS lookups find nobody.
#[derive(Debug, Default)]
pub struct ConsoleTransport {
    lock: Mutex<()>,
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send(&self, kind: MessageKind, target: &str, line: &str) -> anyhow::Result<()> {
        let command = match kind {
            MessageKind::Privmsg => "PRIVMSG",
            MessageKind::Notice => "NOTICE",
        };

        let _guard = self.lock.lock();
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{command} {target} :{line}")?;
        stdout.flush()?;
        Ok(())
    }

    async fn join(&self, channel: &str) -> anyhow::Result<()> {
        debug!(%channel, "Joining");
        println!("JOIN {channel}");
        Ok(())
    }

    async fn whois(&self, nick: &str) -> anyhow::Result<Option<WhoisInfo>> {
        debug!(%nick, "Console transport has no users");
        Ok(None)
    }
}
