//! Named events with ordered listeners.
//!
//! Listeners are registered under a key per event, and may ask to run before or after other
//! listeners of the same event. Emitting an event runs its listeners one after another in that
//! order. A failing listener is logged and the rest still run.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use ircbot_common::err;
use ircbot_common::util::dependency::{DependencyDict, DependencyError, Relations};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::task::{Task, schedule_after};

pub type Listener<P> = Arc<dyn Fn(P) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmitterError {
    #[error("'{event}' already has a listener called '{key}'")]
    DuplicateKey { event: String, key: String },
    #[error(transparent)]
    Dependency(#[from] DependencyError),
}

pub struct EventEmitter<P> {
    events: Mutex<HashMap<String, DependencyDict<String, Listener<P>>>>,
}

impl<P> Default for EventEmitter<P> {
    fn default() -> Self {
        Self { events: Mutex::new(HashMap::new()) }
    }
}

impl<P> EventEmitter<P>
where
    P: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener. Nothing is added if the key is taken or the listeners of the event could no
    /// longer be ordered.
    pub fn on<F, Fut>(
        &self,
        event: &str,
        key: &str,
        relations: Relations<String>,
        listener: F,
    ) -> Result<(), EmitterError>
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let listener: Listener<P> = Arc::new(move |payload| listener(payload).boxed());
        let key = key.to_owned();

        let mut events = self.events.lock();
        let listeners = events.entry(event.to_owned()).or_default();
        if listeners.contains_key(&key) {
            return Err(EmitterError::DuplicateKey { event: event.to_owned(), key });
        }

        listeners.add(key.clone(), listener, relations)?;
        if let Err(e) = listeners.ordered_keys() {
            listeners.remove(&key);
            return Err(e.into());
        }
        Ok(())
    }

    /// Removes a listener, returning whether it existed.
    pub fn off(&self, event: &str, key: &str) -> bool {
        let mut events = self.events.lock();
        let Some(listeners) = events.get_mut(event) else {
            return false;
        };
        let removed = listeners.remove(&key.to_owned()).is_some();
        if listeners.is_empty() {
            events.remove(event);
        }
        removed
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.events.lock().get(event).map_or(0, DependencyDict::len)
    }

    /// Runs every listener of `event` in order. Returns how many ran.
    pub async fn emit(&self, event: &str, payload: P) -> usize {
        let listeners: Vec<(String, Listener<P>)> = {
            let events = self.events.lock();
            let Some(listeners) = events.get(event) else {
                trace!(%event, "No listeners");
                return 0;
            };
            match listeners.iter() {
                Ok(iter) => iter.map(|(k, l)| (k.clone(), l.clone())).collect(),
                Err(e) => {
                    // possible once a required listener has been removed
                    err!("Failed to order listeners for {event}: {e}");
                    return 0;
                },
            }
        };

        for (key, listener) in &listeners {
            trace!(%event, %key, "Running listener");
            if let Err(e) = listener(payload.clone()).await {
                err!("Listener {key} for {event} failed: {e:#}");
            }
        }
        listeners.len()
    }

    /// Emits `event` once `delay` has passed.
    pub fn emit_in(self: &Arc<Self>, delay: Duration, event: &str, payload: P) -> JoinHandle<usize> {
        let emitter = self.clone();
        let event = event.to_owned();
        schedule_after(delay, async move { emitter.emit(&event, payload).await })
    }

    /// Emits `event` straight away and then every `interval`, until the returned task is aborted.
    pub fn emit_periodically(self: &Arc<Self>, interval: Duration, event: &str, payload: P) -> Task {
        Task::new(
            (self.clone(), event.to_owned(), payload),
            interval,
            Box::new(|(emitter, event, payload)| {
                Box::pin(async move {
                    emitter.emit(&event, payload).await;
                })
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    type Seen = Arc<Mutex<Vec<String>>>;

    fn push(
        seen: &Seen,
        name: &'static str,
    ) -> impl Fn(u32) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync + use<> {
        let seen = seen.clone();
        move |n| {
            let seen = seen.clone();
            async move {
                seen.lock().push(format!("{name}{n}"));
                Ok(())
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn listeners_run_in_dependency_order() {
        let emitter = EventEmitter::<u32>::new();
        let seen = Seen::default();

        emitter.on("join", "greet", Relations::new().after("log".to_owned()), push(&seen, "greet")).unwrap();
        emitter.on("join", "log", Relations::new(), push(&seen, "log")).unwrap();
        emitter.on("join", "first", Relations::new().before("log".to_owned()), push(&seen, "first")).unwrap();

        assert_eq!(emitter.emit("join", 1).await, 3);
        assert_eq!(*seen.lock(), vec!["first1", "log1", "greet1"]);
        assert_eq!(emitter.emit("part", 1).await, 0);
    }

    #[tokio::test]
    async fn failing_listener_does_not_stop_the_rest() {
        let emitter = EventEmitter::<u32>::new();
        let seen = Seen::default();

        emitter.on("x", "bad", Relations::new(), |_| async { Err(anyhow::anyhow!("nope")) }).unwrap();
        emitter.on("x", "good", Relations::new().after("bad".to_owned()), push(&seen, "good")).unwrap();

        assert_eq!(emitter.emit("x", 2).await, 2);
        assert_eq!(*seen.lock(), vec!["good2"]);
    }

    #[test]
    fn rejects_duplicates_and_cycles() {
        let emitter = EventEmitter::<u32>::new();
        let ok = |_| async { Ok(()) };

        emitter.on("x", "a", Relations::new().after("b".to_owned()), ok).unwrap();
        assert_eq!(
            emitter.on("x", "a", Relations::new(), ok),
            Err(EmitterError::DuplicateKey { event: "x".to_owned(), key: "a".to_owned() })
        );
        assert!(matches!(
            emitter.on("x", "b", Relations::new().after("a".to_owned()), ok),
            Err(EmitterError::Dependency(DependencyError::Cycle { .. }))
        ));
        assert_eq!(emitter.listener_count("x"), 1);

        assert!(emitter.off("x", "a"));
        assert!(!emitter.off("x", "a"));
        assert_eq!(emitter.listener_count("x"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_and_periodic_emits() {
        let emitter = Arc::new(EventEmitter::<u32>::new());
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        emitter
            .on("tick", "count", Relations::new(), move |n| {
                counter.fetch_add(n as usize, Ordering::SeqCst);
                async { Ok(()) }
            })
            .unwrap();

        assert_eq!(emitter.emit_in(Duration::from_secs(5), "tick", 10).await.unwrap(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 10);

        let task = emitter.emit_periodically(Duration::from_secs(1), "tick", 1);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        task.abort();
        assert_eq!(count.load(Ordering::SeqCst), 13);
    }
}
