use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ircbot_common::util::dependency::Relations;
use regex::{Regex, RegexBuilder};

static PATTERN_COUNT: AtomicUsize = AtomicUsize::new(0);

pub type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Clone)]
enum Matcher {
    Regex(Regex),
    Predicate(Predicate),
}

/// A non-literal command alias.
///
/// Regexes are matched case insensitively against the whole name. Patterns are tried in the order
/// given by their relations, after literal aliases.
#[derive(Clone)]
pub struct Pattern {
    matcher: Matcher,
    key: String,
    doc: Option<String>,
    relations: Relations<String>,
}

impl Pattern {
    pub fn regex(source: &str) -> Result<Pattern, regex::Error> {
        let regex = RegexBuilder::new(&format!("^(?:{source})$")).case_insensitive(true).build()?;
        Ok(Pattern::new(Matcher::Regex(regex), source))
    }

    pub fn predicate(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Pattern {
        Pattern::new(Matcher::Predicate(Arc::new(predicate)), "<predicate>")
    }

    fn new(matcher: Matcher, label: &str) -> Pattern {
        let n = PATTERN_COUNT.fetch_add(1, Ordering::Relaxed);
        Pattern { matcher, key: format!("{label} #{n}"), doc: None, relations: Relations::new() }
    }

    /// Identifies this pattern in other patterns' relations. Without one, every pattern gets a key of
    /// its own, so identical regexes may be registered any number of times.
    pub fn key(mut self, key: &str) -> Pattern {
        key.clone_into(&mut self.key);
        self
    }

    /// A pseudo alias to show in help. Patterns without one are left out.
    pub fn doc(mut self, doc: &str) -> Pattern {
        self.doc = Some(doc.to_owned());
        self
    }

    pub fn before(mut self, key: &str) -> Pattern {
        self.relations = self.relations.before(key.to_owned());
        self
    }

    pub fn after(mut self, key: &str) -> Pattern {
        self.relations = self.relations.after(key.to_owned());
        self
    }

    pub fn requires(mut self, key: &str) -> Pattern {
        self.relations = self.relations.requires(key.to_owned());
        self
    }

    pub fn priority(mut self, priority: i64) -> Pattern {
        self.relations = self.relations.priority(priority);
        self
    }

    pub fn is_match(&self, text: &str) -> bool {
        match &self.matcher {
            Matcher::Regex(regex) => regex.is_match(text),
            Matcher::Predicate(predicate) => predicate(text),
        }
    }

    pub fn get_key(&self) -> &str {
        &self.key
    }

    pub fn get_doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn relations(&self) -> &Relations<String> {
        &self.relations
    }
}

impl Debug for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Pattern({:?})", self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_is_anchored_and_case_insensitive() {
        let pattern = Pattern::regex(r"d\d+").unwrap();
        assert!(pattern.is_match("d20"));
        assert!(pattern.is_match("D6"));
        assert!(!pattern.is_match("2d6"));
        assert!(!pattern.is_match("d6x"));
        assert!(pattern.get_key().starts_with(r"d\d+ #"));
        assert_ne!(Pattern::regex(r"d\d+").unwrap().get_key(), pattern.get_key());
    }

    #[test]
    fn predicates_get_distinct_keys() {
        let a = Pattern::predicate(|s| s.starts_with('a'));
        let b = Pattern::predicate(|s| s.starts_with('b'));
        assert_ne!(a.get_key(), b.get_key());
        assert!(a.is_match("apple"));
        assert!(!a.is_match("banana"));
    }

    #[test]
    fn relations_accumulate() {
        let pattern = Pattern::regex("x+").unwrap().key("xs").before("ys").after("ws").priority(2);
        assert_eq!(pattern.get_key(), "xs");
        assert!(pattern.relations().before.contains("ys"));
        assert!(pattern.relations().after.contains("ws"));
        assert_eq!(pattern.relations().priority, 2);
        assert!(Pattern::regex("(").is_err());
    }
}
