//! Session coordinator.
//!
//! A [`Session`] drives one interactive attachment from raw-mode entry to
//! terminal restore:
//!
//! ```text
//! Idle -> RawModeActive -> AttachingStarting -> Running -> Cleaning -> Done
//! ```
//!
//! The stream relay (and, for containers, the exit watcher) is launched
//! before the process is started so no early output or lifecycle event is
//! missed. The resize monitor is launched only once the process runs. The
//! first completion signal decides the result; the losing task is left to
//! wind down on its own. The terminal is restored exactly once before
//! [`Session::run`] returns.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use dockerpty_core::{
    AttachOptions, Dimension, ProcessRef, PtyError, PtyResult, RuntimeClient, StartOptions,
    TerminalDevice,
};

use crate::completion::{Completion, Outcome};
use crate::exit::ExitWatcher;
use crate::relay::{LocalStreams, StreamRelay};
use crate::resize::{ResizeMonitor, ResizeSource, DEFAULT_POLL_INTERVAL};
use crate::terminal::{RawSession, StdTerminal};

/// Grace period before the first resize of an exec instance. Some engines
/// reject a resize issued before the exec process is fully running.
pub const DEFAULT_EXEC_RESIZE_DELAY: Duration = Duration::from_millis(50);

/// Coordinator state, traced on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    Idle,
    RawModeActive,
    AttachingStarting,
    Running,
    Cleaning,
    Done,
}

/// How the resize monitor learns about size changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    /// SIGWINCH where available, polling elsewhere.
    #[default]
    Auto,
    /// SIGWINCH only. If the handler cannot be installed the size is
    /// synced once at start and never again.
    Signal,
    /// Poll the terminal size at a fixed interval.
    Poll,
}

/// Tunables shared by both session flavours.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub attach: AttachOptions,
    pub start: StartOptions,
    pub resize_mode: ResizeMode,
    pub poll_interval: Duration,
    /// Applied to exec sessions only.
    pub exec_resize_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            attach: AttachOptions::default(),
            start: StartOptions::default(),
            resize_mode: ResizeMode::Auto,
            poll_interval: DEFAULT_POLL_INTERVAL,
            exec_resize_delay: DEFAULT_EXEC_RESIZE_DELAY,
        }
    }
}

/// How the remote process gets started once the relay is attached.
#[derive(Debug, Clone)]
pub(crate) enum StartStep {
    /// Issue a separate start RPC (containers).
    Issue(StartOptions),
    /// The attach call itself starts the process (exec instances).
    OnAttach,
}

/// One interactive session against a remote process.
pub struct Session {
    client: Arc<dyn RuntimeClient>,
    target: ProcessRef,
    start: StartStep,
    watch_exit: bool,
    attach: AttachOptions,
    resize_mode: ResizeMode,
    poll_interval: Duration,
    resize_delay: Duration,
    resize_source: Option<ResizeSource>,
    state: SessionState,
}

impl Session {
    /// A session that attaches to a created container, then starts it. Ends
    /// when the container dies or its stream closes, whichever comes first.
    pub fn container(
        client: Arc<dyn RuntimeClient>,
        container_id: impl Into<String>,
        options: SessionOptions,
    ) -> Self {
        Self {
            client,
            target: ProcessRef::Container(container_id.into()),
            start: StartStep::Issue(options.start),
            watch_exit: true,
            attach: options.attach,
            resize_mode: options.resize_mode,
            poll_interval: options.poll_interval,
            resize_delay: Duration::ZERO,
            resize_source: None,
            state: SessionState::Idle,
        }
    }

    /// A session that starts a created exec instance by attaching to it.
    /// Ends when the exec stream closes.
    pub fn exec(
        client: Arc<dyn RuntimeClient>,
        exec_id: impl Into<String>,
        options: SessionOptions,
    ) -> Self {
        Self {
            client,
            target: ProcessRef::Exec(exec_id.into()),
            start: StartStep::OnAttach,
            watch_exit: false,
            attach: options.attach,
            resize_mode: options.resize_mode,
            poll_interval: options.poll_interval,
            resize_delay: options.exec_resize_delay,
            resize_source: None,
            state: SessionState::Idle,
        }
    }

    /// Enable or disable the exit watcher.
    pub fn with_exit_watcher(mut self, enabled: bool) -> Self {
        self.watch_exit = enabled;
        self
    }

    /// Use `source` for resize notifications instead of one built from
    /// the configured [`ResizeMode`].
    pub fn with_resize_source(mut self, source: ResizeSource) -> Self {
        self.resize_source = Some(source);
        self
    }

    pub fn target(&self) -> &ProcessRef {
        &self.target
    }

    /// Run against the controlling terminal and the process's standard
    /// streams.
    pub async fn run(self) -> PtyResult<()> {
        self.run_with(Arc::new(StdTerminal), LocalStreams::std()).await
    }

    /// Run against an explicit terminal and set of local streams.
    pub async fn run_with(
        mut self,
        terminal: Arc<dyn TerminalDevice>,
        local: LocalStreams,
    ) -> PtyResult<()> {
        info!(id = %self.target, "starting session");

        let mut raw = match RawSession::enter(terminal.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                self.transition(SessionState::Done);
                return Err(e);
            }
        };
        self.transition(SessionState::RawModeActive);

        let result = self.drive(terminal, local).await;

        self.transition(SessionState::Cleaning);
        raw.restore();
        self.transition(SessionState::Done);

        match &result {
            Ok(()) => info!(id = %self.target, "session ended"),
            Err(e) => info!(id = %self.target, "session ended with error: {e}"),
        }
        result
    }

    /// Everything between raw-mode entry and cleanup. Any early return here
    /// still goes through the restore in [`run_with`](Self::run_with).
    async fn drive(
        &mut self,
        terminal: Arc<dyn TerminalDevice>,
        local: LocalStreams,
    ) -> PtyResult<()> {
        self.transition(SessionState::AttachingStarting);
        let (completion, signal) = Completion::new();

        if self.watch_exit {
            let watcher = ExitWatcher::subscribe(self.client.as_ref(), self.target.clone()).await?;
            tokio::spawn(watcher.run(completion.clone()));
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let relay = StreamRelay::new(self.client.clone(), self.target.clone(), self.attach);
        tokio::spawn(async move {
            let result = relay.run(local, Some(ready_tx)).await;
            completion.fire(Outcome::StreamEnded(result));
        });

        if ready_rx.await.is_err() {
            // The relay gave up before attaching; its outcome carries the attach error.
            let result = signal.wait().await.into_result();
            return match self.start {
                StartStep::Issue(_) => result.map_err(|e| {
                    PtyError::Stream(format!("attach to {} failed: {e}", self.target))
                }),
                // For exec instances attaching is starting.
                StartStep::OnAttach => result.map_err(|e| PtyError::RemoteStart(e.to_string())),
            };
        }

        if let StartStep::Issue(options) = &self.start {
            if let Err(e) = self.client.start(&self.target, options).await {
                warn!(id = %self.target, "start failed, abandoning attached stream: {e}");
                return Err(PtyError::RemoteStart(e.to_string()));
            }
            debug!(id = %self.target, "started");
        }

        self.transition(SessionState::Running);
        self.launch_resize_monitor(terminal);

        signal.wait().await.into_result()
    }

    fn launch_resize_monitor(&mut self, terminal: Arc<dyn TerminalDevice>) {
        let source = match self.resize_source.take() {
            Some(source) => source,
            None => resize_source_for(self.resize_mode, self.poll_interval),
        };

        let client = self.client.clone();
        let target = self.target.clone();
        let delay = self.resize_delay;
        let monitor = ResizeMonitor::new(terminal, source);

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            monitor
                .watch(move |size: Dimension| {
                    let client = client.clone();
                    let target = target.clone();
                    async move {
                        if let Err(e) = client.resize(&target, size).await {
                            debug!(id = %target, %size, "resize failed: {e}");
                        }
                    }
                })
                .await;
        });
    }

    fn transition(&mut self, next: SessionState) {
        debug!(id = %self.target, from = ?self.state, to = ?next, "session state");
        self.state = next;
    }
}

fn resize_source_for(mode: ResizeMode, poll_interval: Duration) -> ResizeSource {
    match mode {
        ResizeMode::Auto => ResizeSource::platform_default(poll_interval),
        ResizeMode::Poll => ResizeSource::poll(poll_interval),
        #[cfg(unix)]
        ResizeMode::Signal => ResizeSource::signal().unwrap_or_else(|e| {
            warn!("cannot watch SIGWINCH, terminal size will not follow resizes: {e}");
            ResizeSource::initial_only()
        }),
        #[cfg(not(unix))]
        ResizeMode::Signal => {
            warn!("SIGWINCH is not available, terminal size will not follow resizes");
            ResizeSource::initial_only()
        }
    }
}

/// Attach to a created container, start it, and relay the terminal until
/// the container exits or its stream closes.
pub async fn start_container_session(
    client: Arc<dyn RuntimeClient>,
    container_id: impl Into<String>,
    options: SessionOptions,
) -> PtyResult<()> {
    Session::container(client, container_id, options).run().await
}

/// Start a created exec instance and relay the terminal until its stream
/// closes.
pub async fn start_exec_session(
    client: Arc<dyn RuntimeClient>,
    exec_id: impl Into<String>,
    options: SessionOptions,
) -> PtyResult<()> {
    Session::exec(client, exec_id, options).run().await
}
