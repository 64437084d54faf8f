//! Dispatcher implementation

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::window::RateWindow;
use crate::config::DispatcherConfig;

/// The dispatcher's drain task is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("dispatcher closed")]
pub struct DispatcherClosed;

/// Statistics for the dispatcher
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatcherStats {
    pub total_released: u64,
    pub total_rate_limited: u64,
    pub total_abandoned: u64,
    pub queue_depth: usize,
    pub peak_queue_depth: usize,
}

/// Internal state protected by mutex
struct DispatcherInner {
    window: RateWindow,
    stats: DispatcherStats,
}

/// A queued caller
struct Waiter {
    release: oneshot::Sender<()>,
    enqueued_at: Instant,
}

/// Resolves when the dispatcher releases this caller
pub struct Ticket {
    rx: oneshot::Receiver<()>,
}

impl Future for Ticket {
    type Output = Result<(), DispatcherClosed>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|r| r.map_err(|_| DispatcherClosed))
    }
}

/// Admission control for the generation capability
///
/// Callers take a [`Ticket`] and await it before each capability call. A
/// single drain task releases tickets in arrival order, one at a time, no
/// closer than the configured spacing and no more than the window budget.
/// Cloning shares the same queue and window.
#[derive(Clone)]
pub struct Dispatcher {
    config: DispatcherConfig,
    inner: Arc<Mutex<DispatcherInner>>,
    tx: mpsc::UnboundedSender<Waiter>,
}

impl Dispatcher {
    /// Create the dispatcher and start its drain task
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(config: DispatcherConfig) -> Self {
        debug!(?config, "Dispatcher::spawn: called");
        let inner = Arc::new(Mutex::new(DispatcherInner {
            window: RateWindow::new(&config, Instant::now()),
            stats: DispatcherStats::default(),
        }));
        let (tx, rx) = mpsc::unbounded_channel();

        info!(
            max_requests = config.max_requests_per_window,
            window_secs = config.rate_window_secs,
            spacing_ms = config.min_spacing().as_millis() as u64,
            "Dispatcher started"
        );
        tokio::spawn(drain(rx, inner.clone(), config.release_pause()));

        Self { config, inner, tx }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Join the queue; the returned ticket resolves on release
    pub async fn enqueue(&self) -> Ticket {
        let (release, rx) = oneshot::channel();
        {
            let mut inner = self.inner.lock().await;
            inner.stats.queue_depth += 1;
            inner.stats.peak_queue_depth = inner.stats.peak_queue_depth.max(inner.stats.queue_depth);
            debug!(queue_depth = inner.stats.queue_depth, "Dispatcher::enqueue: called");
        }

        let waiter = Waiter {
            release,
            enqueued_at: Instant::now(),
        };
        if self.tx.send(waiter).is_err() {
            // rx resolves with DispatcherClosed since the sender was dropped
            warn!("Dispatcher::enqueue: drain task is gone");
            self.inner.lock().await.stats.queue_depth -= 1;
        }
        Ticket { rx }
    }

    /// Record an upstream rate-limit signal and return how long to back off
    ///
    /// Resets the window: the upstream limiter has effectively reset too.
    pub async fn on_rate_limited(&self, hint: Option<Duration>) -> Duration {
        debug!(?hint, "Dispatcher::on_rate_limited: called");
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let backoff = inner.window.backoff_for(hint, now, self.config.min_backoff());
        inner.window.reset(now);
        inner.stats.total_rate_limited += 1;
        warn!(?hint, ?backoff, "Received rate limit from capability");
        backoff
    }

    /// Record a call given up after exhausting retries
    pub async fn record_abandoned(&self) {
        debug!("Dispatcher::record_abandoned: called");
        self.inner.lock().await.stats.total_abandoned += 1;
    }

    /// Get the dispatcher statistics
    pub async fn stats(&self) -> DispatcherStats {
        self.inner.lock().await.stats.clone()
    }
}

/// Release waiters one at a time, in arrival order
async fn drain(mut rx: mpsc::UnboundedReceiver<Waiter>, inner: Arc<Mutex<DispatcherInner>>, pause: Duration) {
    debug!("drain: started");
    while let Some(waiter) = rx.recv().await {
        if waiter.release.is_closed() {
            debug!("drain: waiter dropped its ticket, skipping");
            inner.lock().await.stats.queue_depth -= 1;
            continue;
        }

        loop {
            let wait = {
                let mut guard = inner.lock().await;
                let now = Instant::now();
                let wait = guard.window.delay_until_ready(now);
                if wait.is_zero() {
                    guard.window.record_release(now);
                    guard.stats.total_released += 1;
                    guard.stats.queue_depth -= 1;
                }
                wait
            };
            if wait.is_zero() {
                break;
            }
            debug!(?wait, "drain: holding next waiter");
            tokio::time::sleep(wait).await;
        }

        debug!(waited = ?waiter.enqueued_at.elapsed(), "drain: releasing waiter");
        if waiter.release.send(()).is_err() {
            debug!("drain: waiter went away before release");
        }
        tokio::time::sleep(pause).await;
    }
    debug!("drain: channel closed, exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;

    fn small_budget() -> DispatcherConfig {
        DispatcherConfig {
            max_requests_per_window: 3,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_ticket_released_immediately() {
        let dispatcher = Dispatcher::spawn(DispatcherConfig::default());
        let start = Instant::now();
        dispatcher.enqueue().await.await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(10));
        assert_eq!(dispatcher.stats().await.total_released, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_releases_are_fifo_spaced_and_windowed() {
        let config = small_budget();
        let spacing = config.min_spacing();
        let window = config.window();
        let dispatcher = Dispatcher::spawn(config);

        let mut tickets = Vec::new();
        for _ in 0..8 {
            tickets.push(dispatcher.enqueue().await);
        }
        let released = join_all(tickets.into_iter().map(|ticket| async move {
            ticket.await.unwrap();
            Instant::now()
        }))
        .await;

        // FIFO and minimum spacing
        for pair in released.windows(2) {
            assert!(pair[1] > pair[0]);
            assert!(pair[1].duration_since(pair[0]) >= spacing);
        }

        // No more than the budget inside any window-length span
        for (i, start) in released.iter().enumerate() {
            let in_window = released[i..]
                .iter()
                .filter(|t| t.duration_since(*start) < window)
                .count();
            assert!(in_window <= 3, "{} releases within one window", in_window);
        }

        let stats = dispatcher.stats().await;
        assert_eq!(stats.total_released, 8);
        assert_eq!(stats.queue_depth, 0);
        assert_eq!(stats.peak_queue_depth, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_at_window_start_backs_off_at_least_thirty_seconds() {
        let dispatcher = Dispatcher::spawn(DispatcherConfig::default());
        let backoff = dispatcher.on_rate_limited(None).await;
        assert!(backoff >= Duration::from_millis(30_000));
        assert_eq!(dispatcher.stats().await.total_rate_limited, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_hint_is_used() {
        let dispatcher = Dispatcher::spawn(DispatcherConfig::default());
        let backoff = dispatcher.on_rate_limited(Some(Duration::from_secs(31))).await;
        assert_eq!(backoff, Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_hint_is_capped() {
        let dispatcher = Dispatcher::spawn(DispatcherConfig::default());
        let backoff = dispatcher.on_rate_limited(Some(Duration::from_secs(86_400))).await;
        assert_eq!(backoff, DispatcherConfig::default().max_backoff());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_ticket_does_not_consume_budget() {
        let dispatcher = Dispatcher::spawn(small_budget());
        dispatcher.enqueue().await.await.unwrap();

        // Second caller gives up while waiting for spacing
        let abandoned = dispatcher.enqueue().await;
        drop(abandoned);

        let third = dispatcher.enqueue().await;
        third.await.unwrap();

        let stats = dispatcher.stats().await;
        assert_eq!(stats.queue_depth, 0);
        assert_eq!(stats.total_released, 2);
    }
}
