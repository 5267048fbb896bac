//! dockerpty: interactive terminal sessions for containers.
//!
//! Attaches the local terminal to a container's primary process or to an
//! exec instance: the terminal is put into raw mode, standard streams are
//! relayed, size changes are propagated, and the original terminal mode is
//! restored on every exit path.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use dockerpty::{start_container_session, SessionOptions};
//!
//! # async fn example(client: Arc<dyn dockerpty_core::RuntimeClient>) -> dockerpty_core::PtyResult<()> {
//! start_container_session(client, "3f4e1c2a9b7d", SessionOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod completion;
pub mod exit;
pub mod relay;
pub mod resize;
pub mod session;
pub mod terminal;

#[cfg(test)]
mod mock;

// Re-export primary public types.
pub use completion::{Completion, CompletionSignal, Outcome};
pub use exit::ExitWatcher;
pub use relay::{LocalStreams, StreamRelay};
pub use resize::{DimensionTracker, ResizeMonitor, ResizeSource};
pub use session::{
    start_container_session, start_exec_session, ResizeMode, Session, SessionOptions,
};
pub use terminal::{RawSession, StdTerminal};

// Re-export dockerpty-core types for convenience.
pub use dockerpty_core::{Dimension, ProcessRef, PtyError, PtyResult, RuntimeClient};
