use crate::bot::ThreadSafeBot;

pub fn handle(bot: &ThreadSafeBot, nick: &str) {
    bot.users.forget(nick);
}
