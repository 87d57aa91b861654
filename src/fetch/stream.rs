//! Per-part chunk accumulation.
//!
//! The transport pushes [`PartEvent`]s into a [`PartSink`]; the consumer
//! awaits the matching [`StreamAssembler`], which owns its buffer and
//! resolves once the terminal event arrives.

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{PayproofError, Result};

/// One delivery event for a part stream.
#[derive(Debug)]
pub enum PartEvent {
    /// Next chunk, in arrival order.
    Data(Bytes),
    /// Terminal signal: the part is complete.
    End,
    /// Terminal signal: delivery failed.
    Error(std::io::Error),
}

/// Create a connected sink/assembler pair for one part.
pub fn part_channel(part_id: impl Into<String>) -> (PartSink, StreamAssembler) {
    let (tx, rx) = mpsc::unbounded_channel();
    let part_id = part_id.into();
    (
        PartSink { tx },
        StreamAssembler {
            part_id,
            rx,
            buffer: BytesMut::new(),
        },
    )
}

/// Producer side of a part stream, held by the transport.
#[derive(Debug, Clone)]
pub struct PartSink {
    tx: mpsc::UnboundedSender<PartEvent>,
}

impl PartSink {
    /// Push a chunk. Returns `false` once the assembler has gone away.
    pub fn send(&self, chunk: impl Into<Bytes>) -> bool {
        self.tx.send(PartEvent::Data(chunk.into())).is_ok()
    }

    pub fn end(self) {
        let _ = self.tx.send(PartEvent::End);
    }

    pub fn fail(self, error: std::io::Error) {
        let _ = self.tx.send(PartEvent::Error(error));
    }
}

/// Consumer side: accumulates the chunks of a single part.
#[derive(Debug)]
pub struct StreamAssembler {
    part_id: String,
    rx: mpsc::UnboundedReceiver<PartEvent>,
    buffer: BytesMut,
}

impl StreamAssembler {
    pub fn part_id(&self) -> &str {
        &self.part_id
    }

    /// Wait for the terminal event and return the concatenated part.
    ///
    /// An error event, or a sink dropped without `End`, discards whatever
    /// was buffered and yields `PayproofError::Io`.
    pub async fn finish(mut self) -> Result<RawPart> {
        let mut chunks = 0usize;
        loop {
            match self.rx.recv().await {
                Some(PartEvent::Data(chunk)) => {
                    chunks += 1;
                    self.buffer.extend_from_slice(&chunk);
                }
                Some(PartEvent::End) => break,
                Some(PartEvent::Error(e)) => return Err(PayproofError::io(self.part_id, e)),
                None => {
                    return Err(PayproofError::io(
                        self.part_id,
                        std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            "stream closed before end signal",
                        ),
                    ))
                }
            }
        }

        debug!(part = %self.part_id, chunks, bytes = self.buffer.len(), "part assembled");
        Ok(RawPart {
            part_id: self.part_id,
            data: self.buffer.freeze(),
        })
    }
}

/// A completed part. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPart {
    part_id: String,
    data: Bytes,
}

impl RawPart {
    pub fn new(part_id: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            part_id: part_id.into(),
            data: data.into(),
        }
    }

    pub fn part_id(&self) -> &str {
        &self.part_id
    }

    /// The raw bytes, untouched.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Decode as text for header, MIME and body sections.
    ///
    /// Those sections come over the wire without a charset of their own;
    /// legacy senders put raw 8-bit Latin text in them, so anything that is
    /// not UTF-8 is read as Windows-1252, which maps every byte.
    pub fn text(&self) -> String {
        let bytes = self
            .data
            .strip_prefix(&[0xEF, 0xBB, 0xBF])
            .unwrap_or(&self.data[..]);

        match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => {
                let (decoded, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
                decoded.into_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn assemble(chunks: &[&'static [u8]]) -> RawPart {
        let (sink, assembler) = part_channel("2");
        for chunk in chunks {
            assert!(sink.send(Bytes::from_static(chunk)));
        }
        sink.end();
        assembler.finish().await.unwrap()
    }

    #[tokio::test]
    async fn test_concatenates_in_arrival_order() {
        let part = assemble(&[b"ab", b"cd", b"ef"]).await;
        assert_eq!(part.part_id(), "2");
        assert_eq!(part.bytes().as_ref(), b"abcdef");
    }

    #[tokio::test]
    async fn test_rechunking_does_not_change_result() {
        let a = assemble(&[b"hello ", b"world"]).await;
        let b = assemble(&[b"h", b"ello w", b"", b"orld"]).await;
        let c = assemble(&[b"hello world"]).await;
        assert_eq!(a.bytes(), b.bytes());
        assert_eq!(b.bytes(), c.bytes());
    }

    #[tokio::test]
    async fn test_error_signal_discards_partial_data() {
        let (sink, assembler) = part_channel("3");
        sink.send(Bytes::from_static(b"partial"));
        sink.fail(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"));
        let err = assembler.finish().await.unwrap_err();
        assert!(matches!(err, PayproofError::Io { ref part_id, .. } if part_id == "3"));
    }

    #[tokio::test]
    async fn test_dropped_sink_is_an_error() {
        let (sink, assembler) = part_channel("1");
        sink.send(Bytes::from_static(b"data"));
        drop(sink);
        assert!(matches!(
            assembler.finish().await,
            Err(PayproofError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_chunks_sent_from_another_task() {
        let (sink, assembler) = part_channel("HEADER");
        let producer = tokio::spawn(async move {
            for chunk in ["Subject: ", "hi\r\n"] {
                sink.send(chunk.as_bytes().to_vec());
                tokio::task::yield_now().await;
            }
            sink.end();
        });
        let part = assembler.finish().await.unwrap();
        producer.await.unwrap();
        assert_eq!(part.text(), "Subject: hi\r\n");
    }

    #[test]
    fn test_text_falls_back_to_windows_1252() {
        let part = RawPart::new("1", vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(part.text(), "café");
    }

    #[test]
    fn test_text_strips_utf8_bom() {
        let part = RawPart::new("HEADER", &b"\xEF\xBB\xBFSubject: hi"[..]);
        assert_eq!(part.text(), "Subject: hi");
    }

    #[test]
    fn test_bytes_are_not_decoded() {
        let part = RawPart::new("2", &b"JVBERi0x"[..]);
        assert_eq!(part.bytes().as_ref(), b"JVBERi0x");
    }
}
