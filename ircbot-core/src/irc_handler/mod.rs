#![allow(clippy::match_single_binding, clippy::single_match)]
use crate::bot::ThreadSafeBot;

use self::incoming_event::IncomingEvent;

pub mod event_handlers;
pub mod incoming_event;

/// Checks the enum variant of this IncomingEvent and calls the appropriate handler function
/// for further processing, then emits the event under its name on the bot's emitter.
pub async fn handle_raw_event(context: ThreadSafeBot, event: IncomingEvent) {
    match &event {
        IncomingEvent::Connect => {
            event_handlers::connect::handle(context.clone()).await;
        },
        IncomingEvent::Disconnect => {
            event_handlers::disconnect::handle(&context);
        },
        IncomingEvent::Message { target, nick, text } => {
            event_handlers::message::handle(context.clone(), target, nick, text);
        },
        IncomingEvent::Nick { old, new } => {
            event_handlers::nick::handle(&context, old, new);
        },
        IncomingEvent::Quit { nick, .. } => {
            event_handlers::quit::handle(&context, nick);
        },
        IncomingEvent::Whois(info) => {
            event_handlers::whois::handle(&context, info.clone());
        },
        _ => {},
    }

    context.emitter.emit(event.name(), event).await;
}
