//! Condition polling and event signaling primitives.
//!
//! `wait_for_condition` converts a callback-driven completion signal into a
//! linear wait: it evaluates a predicate on a fixed interval and fires a
//! completion callback exactly once when the predicate is first observed
//! true. It carries no timeout of its own; callers bound the overall wait
//! with `tokio::time::timeout` at the call site.
//!
//! `Latch` is the notify-driven alternative for code paths that own the
//! event callback: the callback calls [`Latch::set`] and waiters wake
//! immediately, with no polling latency.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use once_cell::sync::Lazy;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Default interval between predicate evaluations.
///
/// Overridable per process via `PARLANCE_POLL_INTERVAL_MS`; resolved once at
/// first use.
pub static DEFAULT_POLL_INTERVAL: Lazy<Duration> = Lazy::new(|| {
    std::env::var("PARLANCE_POLL_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(100))
});

/// Polls `predicate` on the default interval and invokes `on_true` exactly
/// once when it is first observed true.
///
/// The returned handle can be aborted to abandon the wait; the callback is
/// never invoked after an abort. If the predicate never becomes true the
/// task polls until the enclosing timeout cancels it.
///
/// # Arguments
/// * `predicate` - Zero-argument closure producing the condition
/// * `on_true` - Completion callback, invoked at most once
pub fn wait_for_condition<P, C>(predicate: P, on_true: C) -> JoinHandle<()>
where
    P: Fn() -> bool + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    wait_for_condition_every(*DEFAULT_POLL_INTERVAL, predicate, on_true)
}

/// Same as [`wait_for_condition`] with an explicit polling interval.
pub fn wait_for_condition_every<P, C>(interval: Duration, predicate: P, on_true: C) -> JoinHandle<()>
where
    P: Fn() -> bool + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            if predicate() {
                // FnOnce: the callback cannot fire twice, the task ends here.
                on_true();
                return;
            }
            tokio::time::sleep(interval).await;
        }
    })
}

/// Awaitable form of the same poll loop, for linear test code.
///
/// Resolves when `predicate` is first observed true. Bound it with
/// `tokio::time::timeout` when the condition may never hold.
pub async fn wait_until<P>(predicate: P)
where
    P: Fn() -> bool,
{
    loop {
        if predicate() {
            return;
        }
        tokio::time::sleep(*DEFAULT_POLL_INTERVAL).await;
    }
}

/// One-shot event signal: set once, observed by any number of waiters.
///
/// Event callbacks call [`set`](Latch::set); waiters in test code await
/// [`wait`](Latch::wait) and wake without polling latency. Setting an
/// already-set latch is a no-op.
#[derive(Debug, Default)]
pub struct Latch {
    set: AtomicBool,
    notify: Notify,
}

impl Latch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark the latch as set and wake all current waiters.
    pub fn set(&self) {
        self.set.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }

    /// Wait until the latch is set. Returns immediately if already set.
    pub async fn wait(&self) {
        loop {
            if self.is_set() {
                return;
            }
            let notified = self.notify.notified();
            // Re-check after registering: set() between the check above and
            // notified() registration must not be missed.
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;
    use tokio::time::timeout;

    #[tokio::test]
    async fn callback_fires_on_first_poll_when_already_true() {
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = fired.clone();

        let start = Instant::now();
        let handle = wait_for_condition_every(
            Duration::from_millis(100),
            || true,
            move || {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            },
        );
        handle.await.unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        // No interval should have elapsed before the first evaluation.
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn callback_fires_once_after_condition_turns_true() {
        let flag = Arc::new(AtomicBool::new(false));
        let fired = Arc::new(AtomicU32::new(0));

        let flag_setter = flag.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            flag_setter.store(true, Ordering::SeqCst);
        });

        let flag_reader = flag.clone();
        let fired_clone = fired.clone();
        let start = Instant::now();
        let handle = wait_for_condition_every(
            Duration::from_millis(50),
            move || flag_reader.load(Ordering::SeqCst),
            move || {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            },
        );
        handle.await.unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() >= Duration::from_millis(250));

        // The poll task has exited; no further invocations are possible even
        // though the predicate stays true.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn callback_never_fires_while_condition_stays_false() {
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = fired.clone();

        let mut handle = wait_for_condition_every(
            Duration::from_millis(20),
            || false,
            move || {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            },
        );

        // External timeout is the only bound on the wait.
        let waited = timeout(Duration::from_millis(300), &mut handle).await;
        assert!(waited.is_err(), "poll task should still be running");
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        handle.abort();
    }

    #[tokio::test]
    async fn timer_driven_condition_observed_within_one_interval() {
        // Flag flips at 500ms, polling every 100ms: the callback must fire
        // once, no earlier than 500ms and before 700ms.
        let flag = Arc::new(AtomicBool::new(false));
        let fired = Arc::new(AtomicU32::new(0));

        let flag_setter = flag.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            flag_setter.store(true, Ordering::SeqCst);
        });

        let flag_reader = flag.clone();
        let fired_clone = fired.clone();
        let start = Instant::now();
        let handle = wait_for_condition_every(
            Duration::from_millis(100),
            move || flag_reader.load(Ordering::SeqCst),
            move || {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            },
        );
        handle.await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(elapsed >= Duration::from_millis(500), "fired at {elapsed:?}");
        assert!(elapsed < Duration::from_millis(700), "fired at {elapsed:?}");
    }

    #[tokio::test]
    async fn wait_until_resolves_when_condition_holds() {
        let flag = Arc::new(AtomicBool::new(false));

        let flag_setter = flag.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag_setter.store(true, Ordering::SeqCst);
        });

        let flag_reader = flag.clone();
        timeout(
            Duration::from_secs(2),
            wait_until(move || flag_reader.load(Ordering::SeqCst)),
        )
        .await
        .expect("condition should be observed");
    }

    #[tokio::test]
    async fn latch_wakes_waiters_without_polling() {
        let latch = Latch::new();

        let waiter = {
            let latch = latch.clone();
            tokio::spawn(async move {
                latch.wait().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        latch.set();
        timeout(Duration::from_millis(200), waiter)
            .await
            .expect("waiter should wake promptly")
            .unwrap();
        assert!(latch.is_set());
    }

    #[tokio::test]
    async fn latch_wait_returns_immediately_when_already_set() {
        let latch = Latch::new();
        latch.set();
        latch.set(); // second set is a no-op

        timeout(Duration::from_millis(50), latch.wait())
            .await
            .expect("already-set latch should not block");
    }
}
