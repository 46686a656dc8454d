use std::ops::Deref;
use std::sync::{Arc, OnceLock};

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"\S+").unwrap();
}

/// One whitespace-delimited word of a line.
///
/// Keeps a handle on the full line so that the rest of the line starting at this word can be
/// recovered with [`Argument::eol`].
#[derive(Debug, Clone)]
pub struct Argument {
    word: String,
    text: Arc<str>,
    start: usize,
    eol: OnceLock<String>,
}

impl Argument {
    pub fn as_str(&self) -> &str {
        &self.word
    }

    /// Byte offset of this word in the line.
    pub fn start(&self) -> usize {
        self.start
    }

    /// The full line this word was taken from.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The line from the start of this word to the end.
    pub fn eol(&self) -> &str {
        self.eol.get_or_init(|| self.text[self.start..].to_owned())
    }
}

impl Deref for Argument {
    type Target = str;

    fn deref(&self) -> &str {
        &self.word
    }
}

impl PartialEq<&str> for Argument {
    fn eq(&self, other: &&str) -> bool {
        self.word == *other
    }
}

/// The words of a line, in order.
#[derive(Debug, Clone)]
pub struct ArgumentList {
    text: Arc<str>,
    args: Vec<Argument>,
}

impl ArgumentList {
    pub fn new(text: &str) -> ArgumentList {
        let text: Arc<str> = Arc::from(text);
        let args = WORD
            .find_iter(&text)
            .map(|m| Argument {
                word: m.as_str().to_owned(),
                text: text.clone(),
                start: m.start(),
                eol: OnceLock::new(),
            })
            .collect();

        ArgumentList { text, args }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Deref for ArgumentList {
    type Target = [Argument];

    fn deref(&self) -> &[Argument] {
        &self.args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace_runs() {
        let list = ArgumentList::new("  set \tfoo   bar baz ");
        let words: Vec<&str> = list.iter().map(|a| a.as_str()).collect();
        assert_eq!(words, vec!["set", "foo", "bar", "baz"]);
        assert_eq!(list.iter().map(|a| a.start()).collect::<Vec<_>>(), vec![2, 7, 13, 17]);
    }

    #[test]
    fn token_and_whitespace_lengths_cover_line() {
        let line = " a  bb\tccc \n d";
        let list = ArgumentList::new(line);
        let token_len: usize = list.iter().map(|a| a.len()).sum();
        let whitespace = line.chars().filter(|c| c.is_whitespace()).count();
        assert_eq!(token_len + whitespace, line.len());
    }

    #[test]
    fn eol_is_rest_of_line() {
        let list = ArgumentList::new("  foo bar  baz ");
        assert_eq!(list[0].eol(), "foo bar  baz ");
        assert_eq!(list[1].eol(), "bar  baz ");
        assert_eq!(list[2].eol(), "baz ");
        // cached value is handed back unchanged
        assert!(std::ptr::eq(list[1].eol(), list[1].eol()));
    }

    #[test]
    fn empty_line_has_no_arguments() {
        assert!(ArgumentList::new("").is_empty());
        assert!(ArgumentList::new(" \t ").is_empty());
    }
}
