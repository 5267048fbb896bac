//! Remote process exit watcher.
//!
//! Subscribes to the runtime's lifecycle events and reports the first
//! termination event for the watched process. Only container sessions use
//! it; exec sessions end when their stream closes.

use futures_util::StreamExt;
use tracing::{debug, trace, warn};

use dockerpty_core::{EventStream, ProcessRef, PtyError, PtyResult, RuntimeClient, RuntimeEvent};

use crate::completion::{Completion, Outcome};

/// An active event subscription filtered to one process.
pub struct ExitWatcher {
    target: ProcessRef,
    events: EventStream,
}

impl ExitWatcher {
    /// Subscribe to lifecycle events for `target`.
    pub async fn subscribe(client: &dyn RuntimeClient, target: ProcessRef) -> PtyResult<Self> {
        let events = client
            .subscribe_events()
            .await
            .map_err(|e| PtyError::EventSubscription(e.to_string()))?;
        debug!(id = %target, "subscribed to runtime events");
        Ok(Self { target, events })
    }

    /// Wait for the watched process to terminate.
    ///
    /// Returns the terminating event, or `None` if the subscription ends
    /// or fails first. The subscription is dropped on return.
    pub async fn wait(mut self) -> Option<RuntimeEvent> {
        while let Some(item) = self.events.next().await {
            match item {
                Ok(event) if self.matches(&event) => {
                    debug!(id = %self.target, status = %event.status, "remote process exited");
                    return Some(event);
                }
                Ok(event) => {
                    trace!(subject = %event.subject_id, status = %event.status, "ignoring event");
                }
                Err(e) => {
                    warn!(id = %self.target, "event subscription failed: {e}");
                    return None;
                }
            }
        }
        debug!(id = %self.target, "event subscription closed");
        None
    }

    /// Fire [`Outcome::Exited`] once the process terminates.
    pub async fn run(self, completion: Completion) {
        if self.wait().await.is_some() {
            completion.fire(Outcome::Exited);
        }
    }

    fn matches(&self, event: &RuntimeEvent) -> bool {
        event.subject_id == self.target.id() && event.is_termination()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, MockRuntime};

    #[tokio::test]
    async fn ignores_other_subjects_and_statuses() {
        let runtime = MockRuntime::new();
        let target = ProcessRef::Container("mine".into());
        let watcher = ExitWatcher::subscribe(&runtime, target).await.unwrap();

        runtime.send_event(RuntimeEvent::new("mine", "start"));
        runtime.send_event(RuntimeEvent::new("other", "die"));
        runtime.send_event(RuntimeEvent::new("mine", "die"));

        let event = watcher.wait().await.unwrap();
        assert_eq!(event, RuntimeEvent::new("mine", "die"));
        assert_eq!(runtime.calls(), vec![Call::Subscribe]);
    }

    #[tokio::test]
    async fn fires_once() {
        let runtime = MockRuntime::new();
        let watcher = ExitWatcher::subscribe(&runtime, ProcessRef::Container("mine".into()))
            .await
            .unwrap();
        let (completion, signal) = Completion::new();

        runtime.send_event(RuntimeEvent::new("mine", "die"));
        runtime.send_event(RuntimeEvent::new("mine", "die"));
        watcher.run(completion.clone()).await;

        assert!(completion.is_fired());
        assert!(matches!(signal.wait().await, Outcome::Exited));
    }

    #[tokio::test]
    async fn subscription_failure() {
        let runtime = MockRuntime::new()
            .with_subscribe_error(PtyError::Transport("connection refused".into()));
        let err = ExitWatcher::subscribe(&runtime, ProcessRef::Container("mine".into()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PtyError::EventSubscription(_)));
    }
}
