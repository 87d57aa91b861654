//! Page/run text layout produced by an external PDF layout extractor.
//!
//! The serde shape follows the pdf2json output format
//! (`Pages[].Texts[].R[].T`, plus `Meta` and `Transcoder`) so extractor
//! output can be deserialized directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PayproofError, Result};

/// Text layout of a whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    /// Extractor name and version.
    #[serde(rename = "Transcoder", default, skip_serializing_if = "Option::is_none")]
    pub transcoder: Option<String>,
    /// Document metadata (title, producer, …) as reported by the extractor.
    #[serde(rename = "Meta", default)]
    pub meta: BTreeMap<String, serde_json::Value>,
    #[serde(rename = "Pages", default)]
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    #[serde(rename = "Texts", default)]
    pub texts: Vec<TextItem>,
}

/// One positioned text element; usually holds a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextItem {
    #[serde(rename = "R", default)]
    pub runs: Vec<TextRun>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// Percent-encoded text fragment.
    #[serde(rename = "T")]
    pub text: String,
}

impl Layout {
    /// Parse extractor JSON output.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PayproofError::Decode(format!("layout JSON: {e}")))
    }

    /// Build a layout from pages of already-encoded run texts.
    pub fn from_pages<P, R, S>(pages: P) -> Self
    where
        P: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages = pages
            .into_iter()
            .map(|runs| Page {
                texts: runs
                    .into_iter()
                    .map(|t| TextItem {
                        runs: vec![TextRun { text: t.into() }],
                    })
                    .collect(),
            })
            .collect();
        Self {
            pages,
            ..Self::default()
        }
    }

    /// All runs, in page order then run order.
    pub fn runs(&self) -> impl Iterator<Item = &TextRun> {
        self.pages
            .iter()
            .flat_map(|p| p.texts.iter())
            .flat_map(|t| t.runs.iter())
    }

    /// Metadata with keys lower-cased.
    pub fn normalized_meta(&self) -> BTreeMap<String, serde_json::Value> {
        self.meta
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect()
    }
}

/// Turns a binary document into its text layout. Implemented outside this
/// crate (e.g. by wrapping a PDF text extractor).
pub trait LayoutExtractor {
    fn extract(&self, document: &[u8]) -> Result<Layout>;
}

/// Extractor for documents whose layout was produced ahead of time: the
/// attachment bytes are the extractor's JSON output.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLayoutExtractor;

impl LayoutExtractor for JsonLayoutExtractor {
    fn extract(&self, document: &[u8]) -> Result<Layout> {
        let json = std::str::from_utf8(document)
            .map_err(|e| PayproofError::Decode(format!("layout JSON is not UTF-8: {e}")))?;
        Layout::from_json(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDF2JSON: &str = r#"{
        "Transcoder": "pdf2json@3.0.0",
        "Meta": {"Title": "Notification", "PDFFormatVersion": "1.4"},
        "Pages": [
            {"Width": 38.25, "Texts": [
                {"x": 1.0, "y": 2.0, "R": [{"T": "NOTIFICATION%20OF", "S": -1, "TS": [0, 15, 1, 0]}]},
                {"x": 3.0, "y": 2.0, "R": [{"T": "PAYMENT"}]}
            ]},
            {"Texts": [{"R": [{"T": "a"}, {"T": "b"}]}]}
        ]
    }"#;

    #[test]
    fn test_from_pdf2json() {
        let layout = Layout::from_json(PDF2JSON).unwrap();
        assert_eq!(layout.transcoder.as_deref(), Some("pdf2json@3.0.0"));
        assert_eq!(layout.pages.len(), 2);
        let runs: Vec<_> = layout.runs().map(|r| r.text.as_str()).collect();
        assert_eq!(runs, vec!["NOTIFICATION%20OF", "PAYMENT", "a", "b"]);
    }

    #[test]
    fn test_normalized_meta() {
        let layout = Layout::from_json(PDF2JSON).unwrap();
        let meta = layout.normalized_meta();
        assert_eq!(meta["title"], "Notification");
        assert!(meta.contains_key("pdfformatversion"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            Layout::from_json("{\"Pages\": 3}"),
            Err(PayproofError::Decode(_))
        ));
    }

    #[test]
    fn test_json_extractor() {
        let layout = JsonLayoutExtractor.extract(PDF2JSON.as_bytes()).unwrap();
        assert_eq!(layout.runs().count(), 4);
        assert!(JsonLayoutExtractor.extract(&[0xFF, 0xFE]).is_err());
    }

    #[test]
    fn test_from_pages() {
        let layout = Layout::from_pages([vec!["a", "b"], vec!["c"]]);
        assert_eq!(layout.runs().count(), 3);
    }
}
