//! Container runtime collaborator.
//!
//! The session core never talks to a runtime directly; it is written against
//! [`RuntimeClient`], which a concrete engine client (or a test double)
//! implements. Methods return boxed futures so the trait stays object-safe
//! and can be shared as `Arc<dyn RuntimeClient>`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::PtyResult;
use crate::terminal::Dimension;

/// A boxed, sendable future borrowing from `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lifecycle events as delivered by [`RuntimeClient::subscribe_events`].
pub type EventStream = Pin<Box<dyn Stream<Item = PtyResult<RuntimeEvent>> + Send>>;

/// A bidirectional byte connection to a remote process.
pub trait RemoteIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> RemoteIo for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// An established attachment to a remote process's streams.
pub type RemoteStream = Box<dyn RemoteIo>;

/// The remote process a session is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProcessRef {
    /// A container's primary process.
    Container(String),
    /// An exec instance running inside a container.
    Exec(String),
}

impl ProcessRef {
    /// The raw runtime identifier.
    pub fn id(&self) -> &str {
        match self {
            Self::Container(id) | Self::Exec(id) => id,
        }
    }

    pub fn is_exec(&self) -> bool {
        matches!(self, Self::Exec(_))
    }
}

impl fmt::Display for ProcessRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container(id) => write!(f, "container {}", short_id(id)),
            Self::Exec(id) => write!(f, "exec {}", short_id(id)),
        }
    }
}

/// Truncate a runtime ID to the 12-character form runtimes usually print.
fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

/// Options for the start RPC.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartOptions {
    /// Key sequence that detaches from the container, e.g. `ctrl-p,ctrl-q`.
    #[serde(default)]
    pub detach_keys: Option<String>,
}

/// Which remote streams to attach, and whether the remote side is a tty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachOptions {
    pub stdin: bool,
    pub stdout: bool,
    pub stderr: bool,
    /// The remote process has a tty: output arrives as a single raw stream.
    /// When false, stdout and stderr are multiplexed with stream headers.
    pub raw: bool,
}

impl Default for AttachOptions {
    fn default() -> Self {
        Self {
            stdin: true,
            stdout: true,
            stderr: true,
            raw: true,
        }
    }
}

/// One process lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEvent {
    /// ID of the container or exec instance the event is about.
    pub subject_id: String,
    /// Runtime status string, e.g. `start`, `die`.
    pub status: String,
}

impl RuntimeEvent {
    pub fn new(subject_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            status: status.into(),
        }
    }

    /// Whether this event reports that its subject stopped running.
    pub fn is_termination(&self) -> bool {
        matches!(self.status.as_str(), "die" | "died" | "exit" | "exited")
    }
}

/// Operations the session core needs from a container runtime.
///
/// Implementations must tolerate concurrent calls: a session issues attach,
/// start, resize and event subscription from different tasks without any
/// locking of its own.
pub trait RuntimeClient: Send + Sync {
    /// Start the process. For exec instances the attach call itself starts
    /// the process, so sessions never call this for [`ProcessRef::Exec`].
    fn start<'a>(
        &'a self,
        target: &'a ProcessRef,
        options: &'a StartOptions,
    ) -> BoxFuture<'a, PtyResult<()>>;

    /// Open a streaming attachment to the process. The returned stream stays
    /// live until the remote side closes it.
    fn attach<'a>(
        &'a self,
        target: &'a ProcessRef,
        options: AttachOptions,
    ) -> BoxFuture<'a, PtyResult<RemoteStream>>;

    /// Resize the process's tty. `height` is rows, `width` is columns.
    fn resize<'a>(
        &'a self,
        target: &'a ProcessRef,
        size: Dimension,
    ) -> BoxFuture<'a, PtyResult<()>>;

    /// Subscribe to process lifecycle events.
    fn subscribe_events(&self) -> BoxFuture<'_, PtyResult<EventStream>>;
}
