//! Single-fire completion slot.
//!
//! Every task that can end a session holds a [`Completion`]; the coordinator
//! holds the matching [`CompletionSignal`]. The slot accepts exactly one
//! [`Outcome`]: the first `fire` wins and later ones are discarded.

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tracing::debug;

use dockerpty_core::{PtyError, PtyResult};

/// What ended a session.
#[derive(Debug)]
pub enum Outcome {
    /// The runtime reported that the remote process terminated.
    Exited,
    /// The stream relay finished, cleanly or with an error.
    StreamEnded(PtyResult<()>),
}

impl Outcome {
    pub fn into_result(self) -> PtyResult<()> {
        match self {
            Self::Exited => Ok(()),
            Self::StreamEnded(result) => result,
        }
    }
}

/// Write side of the completion slot. Cheap to clone.
#[derive(Clone)]
pub struct Completion {
    slot: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
}

/// Read side of the completion slot.
pub struct CompletionSignal {
    rx: oneshot::Receiver<Outcome>,
}

impl Completion {
    pub fn new() -> (Completion, CompletionSignal) {
        let (tx, rx) = oneshot::channel();
        (
            Completion {
                slot: Arc::new(Mutex::new(Some(tx))),
            },
            CompletionSignal { rx },
        )
    }

    /// Record `outcome` if nothing has been recorded yet.
    ///
    /// Returns `true` if this call decided the outcome.
    pub fn fire(&self, outcome: Outcome) -> bool {
        let sender = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(tx) => tx.send(outcome).is_ok(),
            None => {
                debug!(?outcome, "session already completed, discarding outcome");
                false
            }
        }
    }

    pub fn is_fired(&self) -> bool {
        match self.slot.lock() {
            Ok(slot) => slot.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

impl CompletionSignal {
    /// Wait for the first outcome.
    ///
    /// If every [`Completion`] is dropped without firing (a task panicked),
    /// this resolves to a stream error instead of hanging.
    pub async fn wait(self) -> Outcome {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Outcome::StreamEnded(Err(PtyError::Stream(
                "session tasks ended without reporting a result".into(),
            ))),
        }
    }
}
