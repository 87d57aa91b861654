//! Fetched attachments.
//!
//! The payload is kept exactly as the transport delivered it.
//! Transfer decoding happens only when the consumer asks for it.

use std::collections::BTreeMap;

use base64::Engine;
use bytes::Bytes;

use crate::error::{PayproofError, Result};

/// One displayable part of a message, fetched with its MIME header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Filename of the attachment. Generated if missing from the structure.
    pub name: String,

    /// MIME content type (e.g. `"application/pdf"`).
    pub content_type: String,

    /// Content-Transfer-Encoding of `data`.
    pub encoding: String,

    /// Encoded size in bytes as reported by the structure tree.
    pub size: u64,

    /// Raw, still transfer-encoded payload.
    pub data: Bytes,

    /// Headers of the part's MIME block, names lower-cased.
    pub headers: BTreeMap<String, String>,
}

impl Attachment {
    /// Decode `data` according to `encoding`.
    ///
    /// `base64` payloads are decoded here and nowhere else; whitespace and
    /// line breaks inside the encoded text are ignored.
    pub fn decoded(&self) -> Result<Vec<u8>> {
        match self.encoding.to_lowercase().as_str() {
            "base64" => {
                let compact: Vec<u8> = self
                    .data
                    .iter()
                    .copied()
                    .filter(|b| !b.is_ascii_whitespace())
                    .collect();
                base64::engine::general_purpose::STANDARD
                    .decode(compact)
                    .map_err(|e| {
                        PayproofError::Decode(format!("attachment '{}': {e}", self.name))
                    })
            }
            "" | "7bit" | "8bit" | "binary" => Ok(self.data.to_vec()),
            other => Err(PayproofError::Decode(format!(
                "attachment '{}': unsupported transfer encoding '{other}'",
                self.name
            ))),
        }
    }

    /// `true` if the content type matches one of `types` (case-insensitive).
    pub fn has_type(&self, types: &[String]) -> bool {
        types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(self.content_type.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(encoding: &str, data: &'static [u8]) -> Attachment {
        Attachment {
            name: "proof.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            encoding: encoding.to_string(),
            size: data.len() as u64,
            data: Bytes::from_static(data),
            headers: BTreeMap::new(),
        }
    }

    #[test]
    fn test_decoded_base64_with_line_breaks() {
        let att = attachment("BASE64", b"JVBE\r\nRi0x\r\n");
        assert_eq!(att.decoded().unwrap(), b"%PDF-1");
    }

    #[test]
    fn test_decoded_passthrough() {
        let att = attachment("7bit", b"plain text");
        assert_eq!(att.decoded().unwrap(), b"plain text");
    }

    #[test]
    fn test_decoded_invalid_base64() {
        let att = attachment("base64", b"!!!");
        assert!(matches!(att.decoded(), Err(PayproofError::Decode(_))));
    }

    #[test]
    fn test_decoded_unsupported_encoding() {
        let att = attachment("x-uuencode", b"begin 644");
        assert!(matches!(att.decoded(), Err(PayproofError::Decode(_))));
    }

    #[test]
    fn test_has_type() {
        let att = attachment("base64", b"");
        assert!(att.has_type(&["APPLICATION/PDF".to_string()]));
        assert!(!att.has_type(&["text/plain".to_string()]));
    }
}
