use tracing::debug;

use crate::bot::ThreadSafeBot;

pub fn handle(bot: &ThreadSafeBot, old: &str, new: &str) {
    debug!(%old, %new, "Nick change");
    bot.users.rename(old, new);
}
