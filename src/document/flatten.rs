//! Flattening of a text layout into the single token stream the
//! notification grammar runs on.

use percent_encoding::percent_decode_str;

use crate::document::layout::Layout;
use crate::error::{PayproofError, Result};

/// Lower-cased document text with every whitespace run collapsed to one space.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FlattenedDocument {
    tokens: String,
}

impl FlattenedDocument {
    /// Normalize plain, already-decoded text.
    pub fn from_text(text: &str) -> Self {
        Self {
            tokens: collapse(&text.to_lowercase()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.tokens
    }

    pub fn into_string(self) -> String {
        self.tokens
    }
}

impl std::fmt::Display for FlattenedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tokens)
    }
}

/// Decode, lower-case and join every run of `layout`, in page then run order.
///
/// A single malformed run fails the whole document.
pub fn flatten(layout: &Layout) -> Result<FlattenedDocument> {
    let runs = layout
        .runs()
        .enumerate()
        .map(|(index, run)| decode_run(index, &run.text).map(|t| t.to_lowercase()))
        .collect::<Result<Vec<_>>>()?;

    Ok(FlattenedDocument {
        tokens: collapse(&runs.join(" ")),
    })
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strict percent-decoding: every `%` must introduce two hex digits and the
/// decoded bytes must be UTF-8.
fn decode_run(index: usize, text: &str) -> Result<String> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while let Some(offset) = bytes[i..].iter().position(|&b| b == b'%') {
        let at = i + offset;
        let valid = bytes
            .get(at + 1..at + 3)
            .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
        if !valid {
            return Err(PayproofError::Decode(format!(
                "run {index}: malformed percent-encoding at byte {at} in {text:?}"
            )));
        }
        i = at + 3;
    }

    percent_decode_str(text)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| PayproofError::Decode(format!("run {index}: {e}")))
}
