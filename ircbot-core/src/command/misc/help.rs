use std::sync::Arc;

use anyhow::Context;
use ircbot_common::util::wrap_text;
use ircbot_proc_macro::handler;

use crate::command::{Category, Event};
use crate::command::binding::BindOptions;
use crate::command::command::{Command, CommandBuildError, command};
use crate::command::pattern::Pattern;
use crate::command::registry::Registry;

const USAGE: &str = "Usage: ";
const LISTING_WIDTH: usize = 80;
const LISTING_INDENT: &str = "... ";

/// The `help` command.
///
/// With `allow_full`, `help full` lists the usage of every command, which gets spammy once many
/// commands are loaded. Without it, `full` is not accepted at all.
pub fn help_command(allow_full: bool) -> Result<Command, CommandBuildError> {
    let excluded = if allow_full { "nofull" } else { "full" };

    let mut help = command("help")
        .bind_with("", help_handler, BindOptions::new().summary("Shows a list of commands.").label("nofull"))
        .bind_with(
            "[?full=FULL]",
            help_handler,
            BindOptions::new()
                .summary("Shows a list of commands.  FULL shows usage for all commands.")
                .label("full"),
        )
        .bind_with("<name?command>", help_handler, BindOptions::new().summary("Shows detailed help on one command."))
        .category(Category::Info)
        .doc("Lists commands, or shows how to use one of them.")
        .build()?;

    help.bindings.retain(|binding| binding.label() != Some(excluded));
    Ok(help)
}

#[handler]
async fn help(event: &Event, name: Option<String>, full: bool) -> anyhow::Result<()> {
    let bot = event.bot().context("help can only list the commands of a bot")?;
    let lines = help_lines(&bot.registry.read(), event, name.as_deref(), full);

    for line in lines {
        event.notice(&line)?;
    }
    Ok(())
}

/// What `help` answers, one line per notice.
pub fn help_lines(registry: &Registry, event: &Event, name: Option<&str>, full: bool) -> Vec<String> {
    match name {
        Some(name) => command_help(registry, event, name),
        None => listing(registry, event, full),
    }
}

fn command_help(registry: &Registry, event: &Event, name: &str) -> Vec<String> {
    // the name may be given with or without the prefix
    let (command, name) = match registry.parse(name) {
        Some(parsed) if parsed.command().is_some() => (parsed.command().cloned(), parsed.full_name()),
        _ => (registry.lookup(name), format!("{}{name}", event.prefix)),
    };

    let Some(command) = command else {
        return vec![format!(
            "Unknown command {name}.  See {} for a complete list of commands.",
            event.full_name()
        )];
    };

    let mut lines: Vec<String> = command
        .usage_lines(&name)
        .into_iter()
        .enumerate()
        .map(|(index, line)| {
            let lead = if index == 0 { USAGE.to_owned() } else { " ".repeat(USAGE.len()) };
            format!("{lead}{line}")
        })
        .collect();

    let aliases: Vec<String> = command
        .aliases
        .iter()
        .map(String::as_str)
        .chain(command.patterns.iter().filter_map(Pattern::get_doc))
        .filter(|alias| !alias.is_empty() && *alias != command.name)
        .map(|alias| format!("{}{alias}", event.prefix))
        .collect();
    if !aliases.is_empty() {
        lines.push(format!("Aliases: {}", aliases.join(", ")));
    }

    if let Some(doc) = &command.doc {
        lines.push(doc.clone());
    }
    lines
}

fn category_key(command: &Command) -> String {
    command.category.as_ref().map_or_else(String::new, |c| c.to_string().to_lowercase())
}

fn listing(registry: &Registry, event: &Event, full: bool) -> Vec<String> {
    let mut lines = vec![format!("For detailed help on a specific command, use {} <command>", event.full_name())];

    let mut commands: Vec<&Arc<Command>> = registry.commands().iter().collect();
    commands.sort_by_cached_key(|c| (category_key(c), c.name.clone()));

    for group in commands.chunk_by(|a, b| category_key(a) == category_key(b)) {
        if full {
            for command in group {
                lines.extend(command.usage_lines(&format!("{}{}", event.prefix, command.name)));
            }
            continue;
        }

        let category = category_key(group[0]).to_uppercase();
        let names = group.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ");
        let text = if category.is_empty() { names } else { format!("[{category}]: {names}") };
        lines.extend(wrap_text(&text, LISTING_WIDTH, LISTING_INDENT));
    }

    lines
}
