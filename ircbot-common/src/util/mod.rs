pub mod dependency;

use time::macros::format_description;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter` when set. Calling this more than once is
/// harmless; only the first call installs anything.
pub fn tracing_init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let timer = UtcTime::new(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(timer)
        .try_init();
}

/// Word wraps one line of text to lines of at most `width` characters. Every line after the first
/// starts with `indent`, which counts towards the width. Words longer than a line are split.
/// Whitespace between words on the same line is kept; whitespace at a break is dropped.
pub fn wrap_text(text: &str, width: usize, indent: &str) -> Vec<String> {
    let indent_len = indent.chars().count();
    let width = width.max(indent_len + 1);

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    let mut has_words = false;

    let mut gap = "";
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let mut word = &rest[..end];
        let after = &rest[end..];
        let next = after.trim_start();

        while !word.is_empty() {
            let word_len = word.chars().count();
            let sep = if has_words { gap.chars().count() } else { 0 };

            if current_len + sep + word_len <= width {
                if has_words {
                    current.push_str(gap);
                }
                current.push_str(word);
                current_len += sep + word_len;
                has_words = true;
                break;
            }

            if has_words {
                lines.push(std::mem::replace(&mut current, indent.to_owned()));
                current_len = indent_len;
                has_words = false;
                continue;
            }

            // alone on a line and still too long
            let room = width - current_len;
            let split = word.char_indices().nth(room).map_or(word.len(), |(i, _)| i);
            current.push_str(&word[..split]);
            current_len += room;
            has_words = true;
            gap = "";
            word = &word[split..];
        }

        gap = &after[..after.len() - next.len()];
        rest = next;
    }

    if has_words {
        lines.push(current);
    }
    lines
}
