use tracing::warn;

use crate::bot::ThreadSafeBot;

/// Handle losing the connection. Anything still queued was meant for the old connection and is
/// dropped, along with everything known about other users.
pub fn handle(bot: &ThreadSafeBot) {
    warn!("Disconnected");
    bot.reset_throttles();
    bot.users.clear();
}
