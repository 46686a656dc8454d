use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::spawn;
use tokio::task::JoinHandle;
use tokio::time::sleep;

pub type TaskResult = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type TaskRun<C> = Box<dyn Fn(C) -> TaskResult + Send + Sync>;

/// A Task is a function which is called repeatedly on a set interval.
///
/// A Task runs on its own tokio task, and once per interval the provided function will be executed
/// with a clone of the context it was created with. Dropping the Task does not stop it; call
/// [`Task::abort`].
pub struct Task {
    thread: JoinHandle<()>,
}
impl Task {
    pub fn new<C>(ctx: C, interval: Duration, callback: TaskRun<C>) -> Task
    where
        C: Clone + Send + 'static,
    {
        let thread = spawn(async move {
            loop {
                callback(ctx.clone()).await;
                sleep(interval).await;
            }
        });

        Task { thread }
    }

    pub fn new_delayed<C>(ctx: C, interval: Duration, delay: Duration, callback: TaskRun<C>) -> Task
    where
        C: Clone + Send + 'static,
    {
        let thread = spawn(async move {
            sleep(delay).await;
            loop {
                callback(ctx.clone()).await;
                sleep(interval).await;
            }
        });

        Task { thread }
    }

    pub fn abort(&self) {
        self.thread.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

/// Runs a future on the runtime straight away.
pub fn schedule_now<F>(fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    spawn(fut)
}

/// Runs a future on the runtime once `delay` has passed.
pub fn schedule_after<F>(delay: Duration, fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    spawn(async move {
        sleep(delay).await;
        fut.await
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting() -> (Arc<AtomicUsize>, TaskRun<Arc<AtomicUsize>>) {
        let counter = Arc::new(AtomicUsize::new(0));
        let run: TaskRun<Arc<AtomicUsize>> = Box::new(|counter| {
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });
        (counter, run)
    }

    #[tokio::test(start_paused = true)]
    async fn runs_every_interval_until_aborted() {
        let (counter, run) = counting();
        let task = Task::new(counter.clone(), Duration::from_secs(10), run);

        sleep(Duration::from_secs(25)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        task.abort();
        sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_task_waits_first() {
        let (counter, run) = counting();
        let task = Task::new_delayed(counter.clone(), Duration::from_secs(10), Duration::from_secs(5), run);

        sleep(Duration::from_secs(4)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_after_waits() {
        let start = tokio::time::Instant::now();
        let elapsed = schedule_after(Duration::from_secs(3), async move { start.elapsed() }).await.unwrap();
        assert_eq!(elapsed, Duration::from_secs(3));
        assert_eq!(schedule_now(async { 7 }).await.unwrap(), 7);
    }
}
