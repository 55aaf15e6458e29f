//! Two independent repeating poll timers, re-armed whenever preferences change.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use sluice_api_models::DisplayPreferences;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::preferences::{effective_history_interval, effective_queue_interval};

/// Callback fired by a timer on every tick.
pub type TickFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Fetch-and-reconcile routine driven by the scheduler.
pub type PollFn = Arc<dyn Fn() -> BoxFuture<'static, Result<(), ApiError>> + Send + Sync>;

/// Source of repeating timers.
pub trait TimerFactory: Send + Sync {
    /// Arm a timer that fires `tick` every `period`, first one period after arming, until
    /// the returned handle is cancelled or dropped.
    fn repeat(&self, label: &'static str, period: Duration, tick: TickFn) -> TimerHandle;
}

/// Cancels its timer when cancelled explicitly or dropped.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    /// Handle that runs `cancel` exactly once.
    #[must_use]
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop the timer now.
    pub fn cancel(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.fire();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Timers backed by `tokio::time::interval`. Must be used from within a Tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTimerFactory;

impl TimerFactory for TokioTimerFactory {
    fn repeat(&self, label: &'static str, period: Duration, tick: TickFn) -> TimerHandle {
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                debug!(timer = label, "timer fired");
                // ticks never wait on one another
                tokio::spawn(tick());
            }
        });
        TimerHandle::new(move || task.abort())
    }
}

/// Queue and history timers plus the callbacks they drive.
pub struct PollScheduler {
    timers: Arc<dyn TimerFactory>,
    callbacks: Option<(PollFn, PollFn)>,
    queue_timer: Option<TimerHandle>,
    history_timer: Option<TimerHandle>,
    queue_interval: Option<Duration>,
    history_interval: Option<Duration>,
}

impl PollScheduler {
    /// Idle scheduler drawing timers from `timers`.
    #[must_use]
    pub fn new(timers: Arc<dyn TimerFactory>) -> Self {
        Self {
            timers,
            callbacks: None,
            queue_timer: None,
            history_timer: None,
            queue_interval: None,
            history_interval: None,
        }
    }

    /// Arm both timers at the effective intervals of `prefs`, replacing any live ones.
    pub fn start(&mut self, queue_tick: PollFn, history_tick: PollFn, prefs: &DisplayPreferences) {
        self.callbacks = Some((queue_tick, history_tick));
        self.arm(prefs);
    }

    /// Cancel both timers and re-create them for `prefs`. Returns `false` when the scheduler
    /// was never started.
    pub fn rearm(&mut self, prefs: &DisplayPreferences) -> bool {
        if self.callbacks.is_none() {
            return false;
        }
        self.arm(prefs);
        true
    }

    /// Cancel both timers. In-flight requests are left to finish.
    pub fn stop(&mut self) {
        self.cancel_timers();
        self.callbacks = None;
    }

    /// Whether timers are armed.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.queue_timer.is_some() && self.history_timer.is_some()
    }

    /// Period of the live queue timer.
    #[must_use]
    pub const fn queue_interval(&self) -> Option<Duration> {
        self.queue_interval
    }

    /// Period of the live history timer.
    #[must_use]
    pub const fn history_interval(&self) -> Option<Duration> {
        self.history_interval
    }

    fn arm(&mut self, prefs: &DisplayPreferences) {
        self.cancel_timers();
        let Some((queue_tick, history_tick)) = self.callbacks.clone() else {
            return;
        };
        let queue_period = effective_queue_interval(prefs);
        let history_period = effective_history_interval(prefs);
        self.queue_timer = Some(self.timers.repeat(
            "queue",
            queue_period,
            guarded("queue", queue_tick),
        ));
        self.history_timer = Some(self.timers.repeat(
            "history",
            history_period,
            guarded("history", history_tick),
        ));
        self.queue_interval = Some(queue_period);
        self.history_interval = Some(history_period);
        debug!(
            queue_ms = queue_period.as_millis(),
            history_ms = history_period.as_millis(),
            "poll timers armed"
        );
    }

    fn cancel_timers(&mut self) {
        if let Some(handle) = self.queue_timer.take() {
            handle.cancel();
        }
        if let Some(handle) = self.history_timer.take() {
            handle.cancel();
        }
        self.queue_interval = None;
        self.history_interval = None;
    }
}

/// Wrap a poll so its failure is logged and the timer keeps going.
fn guarded(feed: &'static str, poll: PollFn) -> TickFn {
    Arc::new(move || {
        let poll = Arc::clone(&poll);
        Box::pin(async move {
            if let Err(err) = poll().await {
                warn!(feed, path = err.path(), error = %err, "poll tick failed");
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct ManualTimers {
        armed: Mutex<Vec<(&'static str, Duration, TickFn)>>,
        cancelled: Arc<AtomicUsize>,
    }

    impl TimerFactory for ManualTimers {
        fn repeat(&self, label: &'static str, period: Duration, tick: TickFn) -> TimerHandle {
            self.armed.lock().unwrap().push((label, period, tick));
            let cancelled = Arc::clone(&self.cancelled);
            TimerHandle::new(move || {
                cancelled.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    fn counting(counter: &Arc<AtomicUsize>, fail: bool) -> PollFn {
        let counter = Arc::clone(counter);
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if fail {
                    Err(ApiError::Transport {
                        path: "/poll".into(),
                        source: TransportError::new("connection refused"),
                    })
                } else {
                    Ok(())
                }
            })
        })
    }

    fn prefs(queue_secs: u64, history_secs: u64) -> DisplayPreferences {
        let mut prefs = DisplayPreferences::default();
        prefs.queue.refresh_rate_seconds = queue_secs;
        prefs.history.refresh_rate_seconds = history_secs;
        prefs
    }

    #[test]
    fn start_arms_both_feeds_at_effective_intervals() {
        let timers = Arc::new(ManualTimers::default());
        let mut scheduler = PollScheduler::new(Arc::clone(&timers) as Arc<dyn TimerFactory>);
        let hits = Arc::new(AtomicUsize::new(0));
        scheduler.start(counting(&hits, false), counting(&hits, false), &prefs(1, 2));
        assert!(scheduler.is_running());
        let armed = timers.armed.lock().unwrap();
        let periods: Vec<_> = armed.iter().map(|(label, period, _)| (*label, *period)).collect();
        assert_eq!(
            periods,
            vec![
                ("queue", Duration::from_secs(5)),
                ("history", Duration::from_secs(2))
            ]
        );
    }

    #[test]
    fn rearm_cancels_before_recreating() {
        let timers = Arc::new(ManualTimers::default());
        let mut scheduler = PollScheduler::new(Arc::clone(&timers) as Arc<dyn TimerFactory>);
        assert!(!scheduler.rearm(&prefs(3, 30)));
        let hits = Arc::new(AtomicUsize::new(0));
        scheduler.start(counting(&hits, false), counting(&hits, false), &prefs(3, 30));
        assert!(scheduler.rearm(&prefs(10, 60)));
        assert_eq!(timers.cancelled.load(Ordering::SeqCst), 2);
        assert_eq!(timers.armed.lock().unwrap().len(), 4);
        assert_eq!(scheduler.queue_interval(), Some(Duration::from_secs(10)));
        assert_eq!(scheduler.history_interval(), Some(Duration::from_secs(60)));
        scheduler.stop();
        assert_eq!(timers.cancelled.load(Ordering::SeqCst), 4);
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.queue_interval(), None);
    }

    #[tokio::test]
    async fn failing_tick_is_swallowed() {
        let timers = Arc::new(ManualTimers::default());
        let mut scheduler = PollScheduler::new(Arc::clone(&timers) as Arc<dyn TimerFactory>);
        let hits = Arc::new(AtomicUsize::new(0));
        scheduler.start(counting(&hits, true), counting(&hits, false), &prefs(3, 30));
        let tick = Arc::clone(&timers.armed.lock().unwrap()[0].2);
        tick().await;
        tick().await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_timers_keep_firing_after_failures_until_stopped() {
        let mut scheduler = PollScheduler::new(Arc::new(TokioTimerFactory));
        let queue_hits = Arc::new(AtomicUsize::new(0));
        let history_hits = Arc::new(AtomicUsize::new(0));
        scheduler.start(
            counting(&queue_hits, true),
            counting(&history_hits, false),
            &prefs(1, 30),
        );

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(queue_hits.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(10_200)).await;
        tokio::task::yield_now().await;
        assert_eq!(queue_hits.load(Ordering::SeqCst), 3);
        assert_eq!(history_hits.load(Ordering::SeqCst), 0);

        scheduler.stop();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(queue_hits.load(Ordering::SeqCst), 3);
        assert_eq!(history_hits.load(Ordering::SeqCst), 0);
    }
}
