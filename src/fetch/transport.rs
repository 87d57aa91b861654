//! The seam to the mail-retrieval transport.
//!
//! Connection and authentication live with the caller; this crate only asks
//! for one part stream at a time.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::{PayproofError, Result};
use crate::fetch::stream::{part_channel, PartSink, StreamAssembler};
use crate::model::structure::StructureNode;

/// Source of part streams for one message.
pub trait Transport: Sync {
    /// Start delivery of `part_id` (`"HEADER"`, `"1"`, `"2.MIME"`, …).
    ///
    /// Returns as soon as the request is issued; the assembler resolves
    /// when the part's terminal signal arrives.
    fn open(&self, part_id: &str) -> Result<StreamAssembler>;
}

#[derive(Debug, Clone)]
enum Outcome {
    Complete,
    Fail(std::io::ErrorKind, String),
}

#[derive(Debug, Clone)]
struct Scripted {
    chunks: Vec<Bytes>,
    outcome: Outcome,
    delay: Option<Duration>,
}

/// In-memory transport that replays scripted part streams.
///
/// Useful for tests and for feeding parts that were fetched elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    parts: HashMap<String, Scripted>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a part delivered as the given chunks followed by `End`.
    pub fn with_part<I, C>(mut self, part_id: &str, chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Bytes>,
    {
        self.parts.insert(
            part_id.to_string(),
            Scripted {
                chunks: chunks.into_iter().map(Into::into).collect(),
                outcome: Outcome::Complete,
                delay: None,
            },
        );
        self
    }

    /// Register a part whose delivery fails after the given chunks.
    pub fn with_failing_part<I, C>(mut self, part_id: &str, chunks: I, reason: &str) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Bytes>,
    {
        self.parts.insert(
            part_id.to_string(),
            Scripted {
                chunks: chunks.into_iter().map(Into::into).collect(),
                outcome: Outcome::Fail(std::io::ErrorKind::ConnectionAborted, reason.to_string()),
                delay: None,
            },
        );
        self
    }

    /// Deliver a registered part from a background task after `delay`.
    ///
    /// Delayed parts must be opened from inside a Tokio runtime.
    pub fn with_delay(mut self, part_id: &str, delay: Duration) -> Self {
        if let Some(part) = self.parts.get_mut(part_id) {
            part.delay = Some(delay);
        }
        self
    }
}

/// A message captured from a live transport: its structure plus the raw
/// text of every fetched section, keyed by part id.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CapturedMessage {
    pub structure: StructureNode,
    #[serde(default)]
    pub internal_date: Option<DateTime<Utc>>,
    pub parts: BTreeMap<String, String>,
}

impl CapturedMessage {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PayproofError::Decode(format!("captured message JSON: {e}")))
    }

    /// Replay the captured sections, one chunk each.
    pub fn transport(&self) -> MemoryTransport {
        self.parts
            .iter()
            .fold(MemoryTransport::new(), |transport, (part_id, text)| {
                transport.with_part(part_id, [text.clone()])
            })
    }
}

fn replay(script: Scripted, sink: PartSink) {
    for chunk in script.chunks {
        if !sink.send(chunk) {
            return;
        }
    }
    match script.outcome {
        Outcome::Complete => sink.end(),
        Outcome::Fail(kind, reason) => sink.fail(std::io::Error::new(kind, reason)),
    }
}

impl Transport for MemoryTransport {
    fn open(&self, part_id: &str) -> Result<StreamAssembler> {
        let script = self
            .parts
            .get(part_id)
            .cloned()
            .ok_or_else(|| PayproofError::Transport(format!("no such part '{part_id}'")))?;

        let (sink, assembler) = part_channel(part_id);
        match script.delay {
            Some(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    replay(script, sink);
                });
            }
            None => replay(script, sink),
        }
        Ok(assembler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_chunks() {
        let transport = MemoryTransport::new().with_part("1", ["a", "b"]);
        let part = transport.open("1").unwrap().finish().await.unwrap();
        assert_eq!(part.bytes().as_ref(), b"ab");
    }

    #[tokio::test]
    async fn test_failing_part() {
        let transport = MemoryTransport::new().with_failing_part("2", ["a"], "reset");
        let err = transport.open("2").unwrap().finish().await.unwrap_err();
        assert!(matches!(err, PayproofError::Io { .. }));
    }

    #[tokio::test]
    async fn test_delayed_part() {
        let transport = MemoryTransport::new()
            .with_part("1", ["late"])
            .with_delay("1", Duration::from_millis(5));
        let part = transport.open("1").unwrap().finish().await.unwrap();
        assert_eq!(part.text(), "late");
    }

    #[tokio::test]
    async fn test_captured_message() {
        let json = r#"{
            "structure": {"Composite": {"children": [
                {"Leaf": {"part_id": "1", "content_type": "text/plain",
                          "disposition": null, "encoding": "7bit", "size": 4}}
            ]}},
            "parts": {"HEADER": "Subject: hi\r\n", "1": "body"}
        }"#;
        let captured = CapturedMessage::from_json(json).unwrap();
        assert!(captured.internal_date.is_none());
        let part = captured.transport().open("1").unwrap().finish().await.unwrap();
        assert_eq!(part.text(), "body");
    }

    #[test]
    fn test_unknown_part() {
        let transport = MemoryTransport::new();
        assert!(matches!(
            transport.open("9"),
            Err(PayproofError::Transport(_))
        ));
    }
}
