//! dockerpty-core: shared vocabulary for dockerpty.
//!
//! Provides the error taxonomy, terminal dimensions, process references,
//! runtime lifecycle events, and the two collaborator traits the session
//! core is written against: [`RuntimeClient`] (the container runtime) and
//! [`TerminalDevice`] (the local controlling terminal).

pub mod error;
pub mod runtime;
pub mod terminal;

// Re-export commonly used items at crate root.
pub use error::{PtyError, PtyResult};
pub use runtime::{
    AttachOptions, BoxFuture, EventStream, ProcessRef, RemoteIo, RemoteStream, RuntimeClient,
    RuntimeEvent, StartOptions,
};
pub use terminal::{Dimension, TerminalDevice};
