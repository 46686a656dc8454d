//! WHOIS lookups, shared and remembered.
//!
//! Any number of callers may ask about the same nick at once; only one request reaches the
//! transport and every caller gets its answer. Answers are kept until the user quits, changes nick
//! or is explicitly forgotten.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::transport::{Transport, WhoisInfo};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WhoisError {
    #[error("'{0}' is not a valid nickname")]
    InvalidNick(String),
    #[error("WHOIS lookup failed: {0}")]
    Lookup(String),
}

type Lookup = Shared<BoxFuture<'static, Result<Option<WhoisInfo>, WhoisError>>>;

/// Folds a nick with RFC 1459 case mapping, where `[]\~` are the upper case forms of `{}|^`.
pub fn irc_lower(nick: &str) -> String {
    nick.chars()
        .map(|c| match c {
            '[' => '{',
            ']' => '}',
            '\\' => '|',
            '~' => '^',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

pub struct UserTracker {
    transport: Arc<dyn Transport>,
    pending: Mutex<HashMap<String, Lookup>>,
    known: Mutex<HashMap<String, WhoisInfo>>,
}

impl UserTracker {
    pub fn new(transport: Arc<dyn Transport>) -> UserTracker {
        UserTracker {
            transport,
            pending: Mutex::new(HashMap::new()),
            known: Mutex::new(HashMap::new()),
        }
    }

    /// Looks up a user, answering from memory when possible. `Ok(None)` if nobody has that nick.
    pub async fn whois(&self, nick: &str) -> Result<Option<WhoisInfo>, WhoisError> {
        let nick = nick.trim();
        if nick.is_empty() || nick.contains(|c: char| c.is_whitespace() || c == ',') {
            return Err(WhoisError::InvalidNick(nick.to_owned()));
        }

        let key = irc_lower(nick);
        if let Some(info) = self.known.lock().get(&key) {
            return Ok(Some(info.clone()));
        }

        let lookup = self
            .pending
            .lock()
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(%nick, "Sending WHOIS");
                let transport = self.transport.clone();
                let nick = nick.to_owned();
                async move { transport.whois(&nick).await.map_err(|e| WhoisError::Lookup(format!("{e:#}"))) }
                    .boxed()
                    .shared()
            })
            .clone();

        let result = lookup.clone().await;

        {
            let mut pending = self.pending.lock();
            // a later lookup may have replaced ours after a forget
            if pending.get(&key).is_some_and(|p| p.ptr_eq(&lookup)) {
                pending.remove(&key);
                if let Ok(Some(info)) = &result {
                    self.known.lock().insert(key, info.clone());
                }
            }
        }

        result
    }

    /// Remembers an unsolicited WHOIS reply.
    pub fn record(&self, info: WhoisInfo) {
        self.known.lock().insert(irc_lower(&info.nick), info);
    }

    /// Whether anything is remembered about a nick.
    pub fn knows(&self, nick: &str) -> bool {
        self.known.lock().contains_key(&irc_lower(nick))
    }

    /// Drops what is remembered about a nick. A lookup in flight still answers its callers but
    /// its answer is not kept.
    pub fn forget(&self, nick: &str) {
        let key = irc_lower(nick);
        self.known.lock().remove(&key);
        self.pending.lock().remove(&key);
    }

    pub fn rename(&self, old: &str, new: &str) {
        let mut known = self.known.lock();
        if let Some(mut info) = known.remove(&irc_lower(old)) {
            new.clone_into(&mut info.nick);
            known.insert(irc_lower(new), info);
        }
    }

    /// Drops everything, e.g. after losing the connection.
    pub fn clear(&self) {
        self.known.lock().clear();
        self.pending.lock().clear();
    }
}
