use thiserror::Error;

/// Errors produced while running a terminal session.
///
/// The first five variants name the session phase that failed; the rest
/// describe lower-level failures reported by collaborators, which the
/// session coordinator folds into a phase error.
#[derive(Debug, Error)]
pub enum PtyError {
    #[error("not a terminal")]
    NotATerminal,

    #[error("terminal mode switch failed: {0}")]
    ModeSwitch(String),

    #[error("failed to start remote process: {0}")]
    RemoteStart(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("event subscription failed: {0}")]
    EventSubscription(String),

    #[error("runtime returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for PtyError {
    fn from(e: serde_json::Error) -> Self {
        PtyError::Transport(format!("malformed json: {e}"))
    }
}

pub type PtyResult<T> = Result<T, PtyError>;
