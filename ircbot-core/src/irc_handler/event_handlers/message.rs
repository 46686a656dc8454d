use tokio::task::JoinHandle;

use crate::bot::ThreadSafeBot;

/// Handle a PRIVMSG, which may be a command invocation. The command runs on its own task so that a
/// handler waiting on the network does not hold up later lines.
pub fn handle(bot: ThreadSafeBot, target: &str, nick: &str, text: &str) -> JoinHandle<bool> {
    let (target, nick, text) = (target.to_owned(), nick.to_owned(), text.to_owned());
    tokio::spawn(async move { bot.handle_line(&target, &nick, &text).await })
}
