//! Terminal resize monitor.
//!
//! Syncs the remote tty size once when the session starts running, then
//! again whenever the local terminal changes size. Notifications come from
//! SIGWINCH on unix, or from a fixed-interval poll where signals are not
//! available.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, trace};

use dockerpty_core::{Dimension, PtyResult, TerminalDevice};

/// Poll cadence used where no resize signal exists.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Decides which observed sizes are worth propagating.
///
/// A size is propagated only if it is readable (not `0x0`) and differs from
/// the last size that was propagated.
#[derive(Debug, Default)]
pub struct DimensionTracker {
    last: Option<Dimension>,
}

impl DimensionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Some(size)` if `size` should be sent to the remote side.
    pub fn observe(&mut self, size: Dimension) -> Option<Dimension> {
        if size.is_zero() || self.last == Some(size) {
            return None;
        }
        self.last = Some(size);
        Some(size)
    }

    pub fn last(&self) -> Option<Dimension> {
        self.last
    }
}

/// Where size-change notifications come from.
pub enum ResizeSource {
    /// SIGWINCH.
    #[cfg(unix)]
    Signal(tokio::signal::unix::Signal),
    /// A tick every interval; the tracker filters out unchanged sizes.
    Poll(Interval),
    /// Notifications pushed by the caller.
    Channel(mpsc::Receiver<()>),
}

impl ResizeSource {
    #[cfg(unix)]
    pub fn signal() -> PtyResult<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self::Signal(signal(SignalKind::window_change())?))
    }

    /// Poll every `period`, starting one period from now.
    pub fn poll(period: Duration) -> Self {
        let mut interval = time::interval_at(time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self::Poll(interval)
    }

    pub fn channel(rx: mpsc::Receiver<()>) -> Self {
        Self::Channel(rx)
    }

    /// A source that never fires: the monitor reports the initial size
    /// and stops.
    pub fn initial_only() -> Self {
        let (_tx, rx) = mpsc::channel(1);
        Self::Channel(rx)
    }

    /// SIGWINCH where available, polling otherwise or if the signal handler
    /// cannot be installed.
    pub fn platform_default(period: Duration) -> Self {
        #[cfg(unix)]
        {
            match Self::signal() {
                Ok(source) => return source,
                Err(e) => debug!("SIGWINCH unavailable, polling for resizes: {e}"),
            }
        }
        Self::poll(period)
    }

    /// Wait for the next notification. Returns `false` once the source is
    /// exhausted.
    async fn next(&mut self) -> bool {
        match self {
            #[cfg(unix)]
            Self::Signal(signal) => signal.recv().await.is_some(),
            Self::Poll(interval) => {
                interval.tick().await;
                true
            }
            Self::Channel(rx) => rx.recv().await.is_some(),
        }
    }
}

/// Watches a terminal and reports size changes.
pub struct ResizeMonitor {
    device: Arc<dyn TerminalDevice>,
    source: ResizeSource,
    tracker: DimensionTracker,
}

impl ResizeMonitor {
    pub fn new(device: Arc<dyn TerminalDevice>, source: ResizeSource) -> Self {
        Self {
            device,
            source,
            tracker: DimensionTracker::new(),
        }
    }

    /// Report the current size, then every change, to `on_resize`.
    ///
    /// Runs until the notification source is exhausted.
    pub async fn watch<F, Fut>(mut self, mut on_resize: F)
    where
        F: FnMut(Dimension) -> Fut,
        Fut: Future<Output = ()>,
    {
        if let Some(size) = self.tracker.observe(self.query()) {
            debug!(rows = size.rows, cols = size.cols, "initial terminal size");
            on_resize(size).await;
        }

        while self.source.next().await {
            let size = self.query();
            match self.tracker.observe(size) {
                Some(size) => {
                    debug!(rows = size.rows, cols = size.cols, "terminal resized");
                    on_resize(size).await;
                }
                None => trace!(%size, "resize notification without a new size"),
            }
        }
        debug!("resize source closed");
    }

    /// Run [`watch`](Self::watch) on its own task.
    pub fn spawn<F, Fut>(self, on_resize: F) -> JoinHandle<()>
    where
        F: FnMut(Dimension) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(self.watch(on_resize))
    }

    fn query(&self) -> Dimension {
        match self.device.size() {
            Ok(size) => size,
            Err(e) => {
                debug!("failed to read terminal size: {e}");
                Dimension::ZERO
            }
        }
    }
}
