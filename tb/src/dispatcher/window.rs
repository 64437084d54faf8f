//! Rolling-window arithmetic for the dispatcher
//!
//! Pure bookkeeping: callers pass `now` in, nothing here sleeps.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::config::DispatcherConfig;

/// Request budget state for one rolling window
#[derive(Debug, Clone)]
pub struct RateWindow {
    window: Duration,
    max_requests: u32,
    min_spacing: Duration,
    max_backoff: Duration,
    window_start: Instant,
    count: u32,
    last_release: Option<Instant>,
}

impl RateWindow {
    pub fn new(config: &DispatcherConfig, now: Instant) -> Self {
        debug!(?config, "RateWindow::new: called");
        Self {
            window: config.window(),
            max_requests: config.max_requests_per_window.max(1),
            min_spacing: config.min_spacing(),
            max_backoff: config.max_backoff(),
            window_start: now,
            count: 0,
            last_release: None,
        }
    }

    /// How long the next release has to wait
    ///
    /// Opens a fresh window first when the current one has elapsed. Zero
    /// means the release may happen now.
    pub fn delay_until_ready(&mut self, now: Instant) -> Duration {
        if now.duration_since(self.window_start) >= self.window {
            debug!(count = self.count, "RateWindow::delay_until_ready: window elapsed, resetting");
            self.window_start = now;
            self.count = 0;
        }

        if self.count >= self.max_requests {
            let wait = (self.window_start + self.window).saturating_duration_since(now);
            debug!(?wait, "RateWindow::delay_until_ready: window full");
            return wait;
        }

        if let Some(last) = self.last_release {
            let since = now.duration_since(last);
            if since < self.min_spacing {
                let wait = self.min_spacing - since;
                debug!(?wait, "RateWindow::delay_until_ready: spacing");
                return wait;
            }
        }

        Duration::ZERO
    }

    /// Count a release at `now`
    pub fn record_release(&mut self, now: Instant) {
        self.count += 1;
        self.last_release = Some(now);
        debug!(count = self.count, "RateWindow::record_release: called");
    }

    /// Backoff after an upstream rate-limit signal
    ///
    /// The hint wins when present; otherwise the rest of the current window,
    /// never less than `min_backoff`. Either way the result is capped at the
    /// configured maximum.
    pub fn backoff_for(&self, hint: Option<Duration>, now: Instant, min_backoff: Duration) -> Duration {
        let backoff = match hint {
            Some(hint) => {
                debug!(?hint, "RateWindow::backoff_for: using server hint");
                hint
            }
            None => {
                let remaining = self.window.saturating_sub(now.duration_since(self.window_start));
                debug!(?remaining, "RateWindow::backoff_for: computed from window");
                remaining.max(min_backoff)
            }
        };
        if backoff > self.max_backoff {
            debug!(?backoff, max = ?self.max_backoff, "RateWindow::backoff_for: capped");
            return self.max_backoff;
        }
        backoff
    }

    /// Start a new window at `now`; the upstream limiter has reset on its side
    pub fn reset(&mut self, now: Instant) {
        debug!("RateWindow::reset: called");
        self.window_start = now;
        self.count = 0;
    }
}
