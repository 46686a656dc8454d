use tracing::debug;

use crate::bot::ThreadSafeBot;
use crate::transport::WhoisInfo;

/// Handle a WHOIS reply nobody asked for through the tracker. Keep it anyway.
pub fn handle(bot: &ThreadSafeBot, info: WhoisInfo) {
    debug!(nick = %info.nick, "WHOIS reply");
    bot.users.record(info);
}
