use tracing::info;

use crate::bot::ThreadSafeBot;

/// Handle the server accepting our registration.
///
/// Nothing can be sent to channels before this point, so this is where configured channels are
/// joined.
pub async fn handle(bot: ThreadSafeBot) {
    info!(channels = bot.config.main.channels.len(), "Connected");
    bot.join_channels().await;
}
