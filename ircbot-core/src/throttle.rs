//! A token bucket that paces queued jobs.
//!
//! The bucket holds up to `burst` units and recovers `amount` units every `rate`. Each queued job
//! has a cost, taken out of the bucket when the job starts. Jobs run one at a time, in the order
//! they were queued, from a single run loop ([`Throttle::run`], or [`Throttle::spawn`] to put it on
//! its own task).
//!
//! A job that costs more than the whole bucket still runs once the bucket is full, leaving it
//! below zero. Nothing is ever stuck in the queue forever.
//!
//! The loop sleeps when the next job cannot be afforded, and when there is nothing left to do. It
//! is woken by new jobs and by [`Throttle::stop`]. A job that fails is logged and ends the loop;
//! whoever owns the throttle decides whether to start it again.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use ircbot_common::config::config::ThrottleLimits;
use ircbot_common::err;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace};

pub type Job = BoxFuture<'static, anyhow::Result<()>>;

type OnClear = Arc<dyn Fn(&Throttle) + Send + Sync>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThrottleConfigError {
    #[error("burst must be > 0")]
    ZeroBurst,
    #[error("amount must be > 0")]
    ZeroAmount,
    #[error("rate must be > 0")]
    ZeroRate,
}

struct State {
    queue: VecDeque<(u32, Job)>,
    /// Units available. Negative after an oversized job.
    free: i64,
    /// When capacity was last recovered.
    last: Instant,
    running: bool,
    stopping: bool,
    /// `on_clear` already ran for the current idle period.
    cleared: bool,
}

struct ThrottleInner {
    burst: u32,
    rate: Duration,
    amount: u32,
    state: Mutex<State>,
    wake: Notify,
    running: watch::Sender<bool>,
    on_clear: Mutex<Option<OnClear>>,
}

#[derive(Clone)]
pub struct Throttle(Arc<ThrottleInner>);

enum Step {
    Run(Job),
    SleepUntil(Instant),
    WaitForWork(Option<Instant>),
    Clear(OnClear),
    Stop,
}

impl Throttle {
    pub fn new(burst: u32, rate: Duration, amount: u32) -> Result<Throttle, ThrottleConfigError> {
        if burst == 0 {
            return Err(ThrottleConfigError::ZeroBurst);
        }
        if amount == 0 {
            return Err(ThrottleConfigError::ZeroAmount);
        }
        if rate.is_zero() {
            return Err(ThrottleConfigError::ZeroRate);
        }

        let (running, _) = watch::channel(false);
        Ok(Throttle(Arc::new(ThrottleInner {
            burst,
            rate,
            amount,
            state: Mutex::new(State {
                queue: VecDeque::new(),
                free: i64::from(burst),
                last: Instant::now(),
                running: false,
                stopping: false,
                cleared: false,
            }),
            wake: Notify::new(),
            running,
            on_clear: Mutex::new(None),
        })))
    }

    /// A throttle for configured limits, or `None` when the scope is not throttled (zero rate).
    pub fn from_limits(limits: ThrottleLimits) -> Result<Option<Throttle>, ThrottleConfigError> {
        if limits.rate <= 0.0 {
            return Ok(None);
        }
        Throttle::new(limits.burst, Duration::from_secs_f64(limits.rate), 1).map(Some)
    }

    /// A throttle that never makes anything wait. Jobs still run one at a time, in order.
    pub fn unlimited() -> Throttle {
        let (running, _) = watch::channel(false);
        Throttle(Arc::new(ThrottleInner {
            burst: u32::MAX,
            rate: Duration::from_nanos(1),
            amount: u32::MAX,
            state: Mutex::new(State {
                queue: VecDeque::new(),
                free: i64::from(u32::MAX),
                last: Instant::now(),
                running: false,
                stopping: false,
                cleared: false,
            }),
            wake: Notify::new(),
            running,
            on_clear: Mutex::new(None),
        }))
    }

    /// Whether both handles refer to the same throttle.
    pub fn ptr_eq(&self, other: &Throttle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Called from the run loop once each time the queue runs dry with the bucket full.
    pub fn on_clear(&self, f: impl Fn(&Throttle) + Send + Sync + 'static) {
        *self.0.on_clear.lock() = Some(Arc::new(f));
    }

    /// Queues a job costing one unit.
    pub fn add<F>(&self, job: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.add_with_cost(1, job);
    }

    pub fn add_with_cost<F>(&self, cost: u32, job: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.extend([(cost, job.boxed())]);
    }

    pub fn extend(&self, jobs: impl IntoIterator<Item = (u32, Job)>) {
        {
            let mut state = self.0.state.lock();
            state.queue.extend(jobs);
            state.cleared = false;
        }
        self.0.wake.notify_one();
    }

    pub fn len(&self) -> usize {
        self.0.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_running(&self) -> bool {
        self.0.state.lock().running
    }

    /// Units currently available, after recovery.
    pub fn free(&self) -> i64 {
        let mut state = self.0.state.lock();
        self.recover(&mut state, Instant::now());
        state.free
    }

    pub fn burst(&self) -> u32 {
        self.0.burst
    }

    /// Makes sure queued jobs will run: spawns the run loop if it is not running, and takes back a
    /// pending [`Throttle::stop`] if it is. Returns whether a new loop was spawned.
    pub fn start(&self) -> bool {
        {
            let mut state = self.0.state.lock();
            if state.running {
                if state.stopping {
                    state.stopping = false;
                    drop(state);
                    self.0.wake.notify_one();
                }
                return false;
            }
        }
        self.spawn();
        true
    }

    /// Starts the run loop on a new task. The task finishes immediately with `false` if the loop
    /// was already running.
    pub fn spawn(&self) -> JoinHandle<bool> {
        let throttle = self.clone();
        tokio::spawn(async move { throttle.run().await })
    }

    /// Runs queued jobs until stopped or until a job fails. Returns `false` straight away if the
    /// loop is already running elsewhere.
    pub async fn run(&self) -> bool {
        {
            let mut state = self.0.state.lock();
            if state.running {
                return false;
            }
            state.running = true;
            state.stopping = false;
            self.0.running.send_replace(true);
        }
        debug!(burst = self.0.burst, rate = ?self.0.rate, "Throttle started");

        loop {
            match self.next_step() {
                Step::Run(job) => {
                    if let Err(e) = job.await {
                        err!("Throttled job failed, stopping throttle: {e:#}");
                        self.mark_stopped(&mut self.0.state.lock());
                        break;
                    }
                },
                Step::SleepUntil(at) => {
                    trace!("Throttle waiting for capacity");
                    tokio::select! {
                        _ = sleep_until(at) => {},
                        _ = self.0.wake.notified() => {},
                    }
                },
                Step::WaitForWork(Some(full_at)) => {
                    tokio::select! {
                        _ = sleep_until(full_at) => {},
                        _ = self.0.wake.notified() => {},
                    }
                },
                Step::WaitForWork(None) => self.0.wake.notified().await,
                Step::Clear(on_clear) => on_clear(self),
                Step::Stop => break,
            }
        }

        debug!("Throttle stopped");
        true
    }

    /// Leaves the running state. Done under the same lock as the decision to stop, so that a
    /// [`Throttle::start`] racing with the exit either cancels the stop or spawns a new loop.
    fn mark_stopped(&self, state: &mut State) {
        state.running = false;
        state.stopping = false;
        self.0.running.send_replace(false);
    }

    /// Decides what the loop does next. Never suspends, so every decision sees a consistent state.
    fn next_step(&self) -> Step {
        let mut state = self.0.state.lock();
        if state.stopping {
            self.mark_stopped(&mut state);
            return Step::Stop;
        }

        let now = Instant::now();
        self.recover(&mut state, now);
        let burst = i64::from(self.0.burst);

        if let Some(&(cost, _)) = state.queue.front() {
            let cost = i64::from(cost);
            if state.free >= cost || state.free >= burst {
                if let Some((_, job)) = state.queue.pop_front() {
                    state.free -= cost;
                    return Step::Run(job);
                }
            }

            let deficit = cost.min(burst) - state.free;
            return Step::SleepUntil(self.recovered_at(&state, deficit));
        }

        if state.free >= burst {
            if !state.cleared {
                state.cleared = true;
                if let Some(on_clear) = self.0.on_clear.lock().clone() {
                    return Step::Clear(on_clear);
                }
            }
            return Step::WaitForWork(None);
        }

        // Only worth waking up on refill if someone wants to hear about it.
        if self.0.on_clear.lock().is_some() {
            let deficit = burst - state.free;
            return Step::WaitForWork(Some(self.recovered_at(&state, deficit)));
        }
        Step::WaitForWork(None)
    }

    fn recover(&self, state: &mut State, now: Instant) {
        let burst = i64::from(self.0.burst);
        if state.free >= burst {
            state.last = now;
            return;
        }

        let elapsed = now.saturating_duration_since(state.last);
        let ticks = elapsed.as_nanos() / self.0.rate.as_nanos();
        if ticks == 0 {
            return;
        }

        let gained = ticks.saturating_mul(u128::from(self.0.amount));
        let free = i128::from(state.free).saturating_add(i128::try_from(gained).unwrap_or(i128::MAX));
        if free >= i128::from(burst) {
            state.free = burst;
            state.last = now;
        } else {
            // below burst, so ticks fits comfortably
            state.free = free as i64;
            state.last += self.0.rate * ticks as u32;
        }
    }

    /// When `deficit` more units will have been recovered.
    fn recovered_at(&self, state: &State, deficit: i64) -> Instant {
        let amount = i64::from(self.0.amount);
        let ticks = (deficit.max(0) + amount - 1) / amount;
        state.last + self.0.rate * u32::try_from(ticks).unwrap_or(u32::MAX)
    }

    /// Asks the loop to exit. A job that is already running is finished first.
    pub fn stop(&self) {
        {
            let mut state = self.0.state.lock();
            if !state.running {
                return;
            }
            state.stopping = true;
        }
        self.0.wake.notify_one();
    }

    /// Stops the loop and waits until it has exited.
    pub async fn wait_for_stop(&self) {
        let mut running = self.0.running.subscribe();
        self.stop();
        while *running.borrow_and_update() {
            if running.changed().await.is_err() {
                break;
            }
        }
    }

    /// Drops every queued job.
    pub fn clear(&self) {
        self.0.state.lock().queue.clear();
    }

    /// Stops the loop and drops every queued job, e.g. after losing the connection.
    pub fn reset(&self) {
        self.stop();
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    type Log = Arc<Mutex<Vec<(usize, Instant)>>>;

    fn record(log: &Log, n: usize) -> impl Future<Output = anyhow::Result<()>> + Send + 'static {
        let log = log.clone();
        async move {
            log.lock().push((n, Instant::now()));
            Ok(())
        }
    }

    fn offsets(log: &Log, start: Instant) -> Vec<(usize, Duration)> {
        log.lock().iter().map(|&(n, at)| (n, at - start)).collect()
    }

    #[test]
    fn rejects_bad_limits() {
        assert_eq!(Throttle::new(0, Duration::from_secs(1), 1).err(), Some(ThrottleConfigError::ZeroBurst));
        assert_eq!(Throttle::new(1, Duration::from_secs(1), 0).err(), Some(ThrottleConfigError::ZeroAmount));
        assert_eq!(Throttle::new(1, Duration::ZERO, 1).err(), Some(ThrottleConfigError::ZeroRate));
        assert!(Throttle::from_limits(ThrottleLimits { burst: 0, rate: 0.0 }).unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_runs_immediately_then_paces() {
        let throttle = Throttle::new(5, Duration::from_secs(1), 1).unwrap();
        let log = Log::default();
        let start = Instant::now();

        for n in 0..7 {
            throttle.add(record(&log, n));
        }
        let handle = throttle.spawn();
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let seen = offsets(&log, start);
        assert_eq!(seen.len(), 7);
        for (n, offset) in &seen[..5] {
            assert_eq!(*offset, Duration::ZERO, "job {n}");
        }
        assert_eq!(seen[5], (5, Duration::from_secs(1)));
        assert_eq!(seen[6], (6, Duration::from_secs(2)));

        throttle.wait_for_stop().await;
        assert!(handle.await.unwrap());
        assert!(!throttle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_job_runs_once_full() {
        let throttle = Throttle::new(5, Duration::from_secs(1), 1).unwrap();
        let log = Log::default();
        let start = Instant::now();

        throttle.add(record(&log, 0));
        throttle.add_with_cost(10, record(&log, 1));
        throttle.add(record(&log, 2));
        throttle.spawn();
        tokio::time::sleep(Duration::from_secs(10)).await;

        // free: 5 -> 4, full again after 1s -> -5, back to 1 after 6 more seconds
        assert_eq!(
            offsets(&log, start),
            vec![(0, Duration::ZERO), (1, Duration::from_secs(1)), (2, Duration::from_secs(7))]
        );
        throttle.wait_for_stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unlimited_never_waits() {
        let throttle = Throttle::unlimited();
        let log = Log::default();
        let start = Instant::now();

        for n in 0..50 {
            throttle.add_with_cost(1000, record(&log, n));
        }
        throttle.spawn();
        tokio::time::sleep(Duration::from_millis(1)).await;

        let seen = offsets(&log, start);
        assert_eq!(seen.len(), 50);
        assert!(seen.iter().enumerate().all(|(i, &(n, at))| i == n && at == Duration::ZERO));
        assert!(throttle.ptr_eq(&throttle.clone()));
        throttle.wait_for_stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn run_is_exclusive() {
        let throttle = Throttle::new(1, Duration::from_secs(1), 1).unwrap();
        let first = throttle.spawn();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(throttle.is_running());

        assert!(!throttle.run().await);

        throttle.wait_for_stop().await;
        assert!(first.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn failing_job_ends_loop() {
        let throttle = Throttle::new(5, Duration::from_secs(1), 1).unwrap();
        let log = Log::default();

        throttle.add(async { Err::<(), _>(anyhow::anyhow!("boom")) });
        throttle.add(record(&log, 1));
        assert!(throttle.spawn().await.unwrap());

        assert!(!throttle.is_running());
        assert!(log.lock().is_empty());
        assert_eq!(throttle.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_drops_pending_jobs() {
        let throttle = Throttle::new(1, Duration::from_secs(60), 1).unwrap();
        let log = Log::default();

        for n in 0..3 {
            throttle.add(record(&log, n));
        }
        let handle = throttle.spawn();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(log.lock().len(), 1);

        throttle.reset();
        assert!(handle.await.unwrap());
        assert!(throttle.is_empty());
        assert_eq!(log.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn start_after_reset_runs_new_jobs() {
        let throttle = Throttle::new(5, Duration::from_secs(1), 1).unwrap();
        let log = Log::default();

        throttle.add(record(&log, 0));
        assert!(throttle.start());
        tokio::time::sleep(Duration::from_millis(10)).await;

        // the loop has not seen the stop yet when the next job arrives
        throttle.reset();
        throttle.add(record(&log, 1));
        assert!(!throttle.start());
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(log.lock().iter().map(|&(n, _)| n).collect::<Vec<_>>(), vec![0, 1]);
        assert!(throttle.is_running());

        throttle.wait_for_stop().await;
        assert!(!throttle.is_running());
        assert!(throttle.start());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(throttle.is_running());
        throttle.wait_for_stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn on_clear_fires_once_bucket_refills() {
        let throttle = Throttle::new(2, Duration::from_secs(1), 1).unwrap();
        let cleared = Arc::new(AtomicUsize::new(0));
        let counter = cleared.clone();
        throttle.on_clear(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let log = Log::default();
        throttle.add(record(&log, 0));
        throttle.spawn();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(cleared.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(cleared.load(Ordering::SeqCst), 1);

        throttle.add(record(&log, 1));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(cleared.load(Ordering::SeqCst), 2);
        assert_eq!(log.lock().len(), 2);

        throttle.wait_for_stop().await;
    }
}
