//! Centralized error types for payproof.

use std::time::Duration;

use thiserror::Error;

/// All errors produced by the payproof library.
#[derive(Error, Debug)]
pub enum PayproofError {
    /// The transport failed while delivering the chunks of one part.
    #[error("I/O error receiving part '{part_id}': {source}")]
    Io {
        part_id: String,
        source: std::io::Error,
    },

    /// The dedicated fetch of one attachment failed.
    #[error("Failed to fetch attachment #{index} '{name}' (part {part_id}): {source}")]
    AttachmentFetch {
        index: usize,
        part_id: String,
        name: String,
        source: Box<PayproofError>,
    },

    /// Percent-decoding or text decoding failed.
    #[error("Decode error: {0}")]
    Decode(String),

    /// An expected delimiter of the notification template was not found.
    #[error("Malformed notification: step {step} delimiter {delimiter:?} not found")]
    MalformedNotification {
        step: &'static str,
        delimiter: &'static str,
    },

    /// A field substring could not be coerced to its numeric or date type.
    #[error("Cannot coerce field '{field}' from {raw:?}")]
    FieldCoercion { field: &'static str, raw: String },

    /// The transport refused to open a part stream.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The caller-supplied deadline elapsed.
    #[error("Deadline of {0:?} exceeded")]
    Timeout(Duration),

    /// The configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, PayproofError>`.
pub type Result<T> = std::result::Result<T, PayproofError>;

impl PayproofError {
    /// Create an `Io` variant from a part id and an `io::Error`.
    pub fn io(part_id: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            part_id: part_id.into(),
            source,
        }
    }

    /// The template step that failed, for notification parse errors.
    pub fn notification_step(&self) -> Option<&'static str> {
        match self {
            Self::MalformedNotification { step, .. } => Some(*step),
            _ => None,
        }
    }
}
