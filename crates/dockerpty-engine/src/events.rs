//! Decoding of the engine's `/events` stream.
//!
//! The engine writes one JSON object per event into a chunked response.
//! Chunk boundaries do not line up with object boundaries, so the decoder
//! buffers until a complete object is available.

use serde::Deserialize;

use dockerpty_core::{PtyResult, RuntimeEvent};

/// Wire form of an engine event. Older engines only fill `id`/`status`,
/// newer ones put the same information in `Actor.ID`/`Action`.
#[derive(Debug, Deserialize)]
struct EngineEvent {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(rename = "Action", default)]
    action: Option<String>,
    #[serde(rename = "Actor", default)]
    actor: Option<Actor>,
}

#[derive(Debug, Deserialize)]
struct Actor {
    #[serde(rename = "ID", default)]
    id: String,
}

impl From<EngineEvent> for RuntimeEvent {
    fn from(ev: EngineEvent) -> Self {
        let subject_id = ev
            .actor
            .map(|a| a.id)
            .filter(|id| !id.is_empty())
            .or(ev.id)
            .unwrap_or_default();
        let status = ev.action.or(ev.status).unwrap_or_default();
        RuntimeEvent { subject_id, status }
    }
}

/// Incremental decoder for a stream of concatenated JSON objects.
#[derive(Debug, Default)]
pub struct EventDecoder {
    buf: Vec<u8>,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> PtyResult<Vec<RuntimeEvent>> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut consumed = 0;
        {
            let mut iter =
                serde_json::Deserializer::from_slice(&self.buf).into_iter::<EngineEvent>();
            loop {
                match iter.next() {
                    Some(Ok(event)) => {
                        consumed = iter.byte_offset();
                        events.push(event.into());
                    }
                    // Partial object: wait for the next chunk.
                    Some(Err(e)) if e.is_eof() => break,
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        consumed = iter.byte_offset();
                        break;
                    }
                }
            }
        }
        self.buf.drain(..consumed);
        Ok(events)
    }

    /// Bytes held back waiting for the rest of an object.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
