use std::fmt::Display;

use thiserror::Error;

use super::signature::SignatureError;

pub trait GetErrorSeverity {
    fn get_severity(&self) -> ErrorSeverity;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// The user did something wrong. Tell them.
    Low,
    /// Something broke. Log it.
    High,
}

/// A malformed usage string, found while compiling a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub text: String,
    /// Character offset into `text`.
    pub pos: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, text: impl Into<String>, pos: usize) -> ParseError {
        ParseError { message: message.into(), text: text.into(), pos }
    }

    /// Renders the offending text with a caret under the failing position, followed by the message.
    ///
    /// With a `maxwidth`, the text is cut down to at most that many characters, keeping `after`
    /// characters past the caret visible where the text allows; a cut start is marked with `...`.
    pub fn show(&self, maxwidth: Option<usize>, after: usize) -> String {
        let text: Vec<char> = self.text.chars().map(|c| if c == '\n' { ' ' } else { c }).collect();

        let (shown, pos) = match maxwidth {
            Some(maxwidth) if maxwidth > 0 => {
                // always leave room for "..." and the failing character
                let after = after.min(maxwidth.saturating_sub(4));
                let end = text.len().min(self.pos + after + 1);
                let start = end.saturating_sub(maxwidth);

                let shown = if start > 0 {
                    let rest: String = text[(start + 3).min(end)..end].iter().collect();
                    format!("...{rest}")
                } else {
                    text[..end].iter().collect()
                };
                (shown, self.pos - start)
            },
            _ => (text.iter().collect(), self.pos),
        };

        format!("{shown}\n{}^\n{self}", "-".repeat(pos))
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)?;
        if self.pos > 0 {
            write!(f, " at position {}", self.pos)?;
        }
        Ok(())
    }
}
impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageErrorKind {
    Usage,
    /// Too few or too many words for the binding.
    ArgumentCount { min: usize, max: Option<usize>, got: usize },
    /// The binding does not apply to this event at all.
    Precheck,
    /// No further bindings should be tried.
    Final,
}

/// A user invoked a command with arguments that do not fit.
///
/// Bindings are tried in order until one does not fail with one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageError {
    pub kind: UsageErrorKind,
    message: Option<String>,
    is_final: bool,
    /// Index of the offending parameter, when there is one.
    pub param: Option<usize>,
}

impl UsageError {
    pub fn new(message: impl Into<String>) -> UsageError {
        UsageError { kind: UsageErrorKind::Usage, message: Some(message.into()), is_final: false, param: None }
    }

    /// A usage error with no message. The command replaces it with its usage line.
    pub fn bare() -> UsageError {
        UsageError { kind: UsageErrorKind::Usage, message: None, is_final: false, param: None }
    }

    pub fn final_usage(message: Option<String>) -> UsageError {
        UsageError { kind: UsageErrorKind::Final, message, is_final: true, param: None }
    }

    pub fn precheck(message: Option<String>) -> UsageError {
        UsageError { kind: UsageErrorKind::Precheck, message, is_final: false, param: None }
    }

    pub fn argument_count(min: usize, max: Option<usize>, got: usize) -> UsageError {
        UsageError {
            kind: UsageErrorKind::ArgumentCount { min, max, got },
            message: None,
            is_final: false,
            param: None,
        }
    }

    pub fn with_param(mut self, index: usize) -> UsageError {
        self.param = Some(index);
        self
    }

    pub fn set_final(mut self, is_final: bool) -> UsageError {
        self.is_final = is_final;
        self
    }

    pub fn is_final(&self) -> bool {
        self.is_final || self.kind == UsageErrorKind::Final
    }

    pub fn is_precheck(&self) -> bool {
        self.kind == UsageErrorKind::Precheck
    }

    /// The explicit message, or the default one for this kind of error.
    pub fn message(&self) -> Option<String> {
        if let Some(message) = &self.message {
            return Some(message.clone());
        }

        match &self.kind {
            UsageErrorKind::Precheck => Some("This command is not available here.".to_owned()),
            UsageErrorKind::ArgumentCount { min, max, got } => Some(argument_count_message(*min, *max, *got)),
            _ => None,
        }
    }
}

fn argument_count_message(min: usize, max: Option<usize>, got: usize) -> String {
    let expected = match max {
        None if min > 0 => format!("at least {min}"),
        None => "any number".to_owned(),
        Some(max) if max == min => format!("{min}"),
        Some(max) if min > 0 => format!("between {min} and {max}"),
        Some(max) => format!("up to {max}"),
    };

    let summary = if got < min {
        "Not enough arguments."
    } else if max.is_some_and(|max| got > max) {
        "Too many arguments."
    } else {
        "Incorrect number of arguments."
    };

    format!("{summary}  (Expected {expected}, got {got})")
}

impl Display for UsageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.message() {
            Some(message) => f.write_str(&message),
            None => f.write_str("Invalid usage."),
        }
    }
}
impl std::error::Error for UsageError {}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeRegistryError {
    #[error("Type handler '{0}' is already registered")]
    Duplicate(String),
}

/// The outcome of a failed command invocation.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Usage(#[from] UsageError),
    /// The handler could not be called with the bound arguments.
    #[error("bad handler signature: {0}")]
    Signature(#[from] SignatureError),
    #[error("{0:#}")]
    Internal(anyhow::Error),
}

impl CommandError {
    /// Recovers a [`UsageError`] raised from inside a handler so that it is treated like one raised
    /// while binding.
    pub fn from_handler(error: anyhow::Error) -> CommandError {
        match error.downcast::<UsageError>() {
            Ok(usage) => CommandError::Usage(usage),
            Err(error) => CommandError::Internal(error),
        }
    }
}

impl GetErrorSeverity for CommandError {
    fn get_severity(&self) -> ErrorSeverity {
        match self {
            CommandError::Usage(_) => ErrorSeverity::Low,
            CommandError::Signature(_) | CommandError::Internal(_) => ErrorSeverity::High,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display_includes_position() {
        assert_eq!(ParseError::new("Unexpected characters", "<a", 3).to_string(), "Unexpected characters at position 3");
        assert_eq!(ParseError::new("Unexpected characters", "<a", 0).to_string(), "Unexpected characters");
    }

    #[test]
    fn show_points_at_position() {
        let err = ParseError::new("Bad", "<a> <b?> c", 4);
        assert_eq!(err.show(None, 10), "<a> <b?> c\n----^\nBad at position 4");
    }

    #[test]
    fn show_truncates_keeping_caret_visible() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let err = ParseError::new("Bad", text, 20);
        let shown = err.show(Some(10), 2);
        let mut lines = shown.lines();
        let first = lines.next().unwrap();
        let caret = lines.next().unwrap();

        // end = 23, start = 13
        assert_eq!(first, "...qrstuvw");
        assert_eq!(caret, "-------^");
        assert_eq!(first.chars().nth(caret.len() - 1), Some('u'));
    }

    #[test]
    fn argument_count_messages() {
        assert_eq!(
            UsageError::argument_count(2, Some(2), 3).to_string(),
            "Too many arguments.  (Expected 2, got 3)"
        );
        assert_eq!(
            UsageError::argument_count(1, None, 0).to_string(),
            "Not enough arguments.  (Expected at least 1, got 0)"
        );
        assert_eq!(
            UsageError::argument_count(0, Some(3), 4).to_string(),
            "Too many arguments.  (Expected up to 3, got 4)"
        );
        assert_eq!(
            UsageError::argument_count(1, Some(3), 2).to_string(),
            "Incorrect number of arguments.  (Expected between 1 and 3, got 2)"
        );
        assert_eq!(
            UsageError::argument_count(0, None, 0).to_string(),
            "Incorrect number of arguments.  (Expected any number, got 0)"
        );
    }

    #[test]
    fn precheck_has_default_message() {
        let err = UsageError::precheck(None);
        assert!(err.is_precheck());
        assert!(!err.is_final());
        assert_eq!(err.to_string(), "This command is not available here.");
    }

    #[test]
    fn final_usage_is_final() {
        assert!(UsageError::final_usage(None).is_final());
        assert!(UsageError::new("x").set_final(true).is_final());
        assert_eq!(UsageError::bare().message(), None);
    }

    #[test]
    fn handler_usage_errors_are_recovered() {
        let err = CommandError::from_handler(anyhow::Error::new(UsageError::new("nope")));
        assert!(matches!(err, CommandError::Usage(ref u) if u.to_string() == "nope"));
        assert_eq!(err.get_severity(), ErrorSeverity::Low);

        let err = CommandError::from_handler(anyhow::anyhow!("database on fire"));
        assert_eq!(err.get_severity(), ErrorSeverity::High);
    }
}
