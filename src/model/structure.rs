//! Message structure tree, as described by the transport before any body fetch.

use std::collections::BTreeMap;

/// A part's declared role (`Content-Disposition`).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Disposition {
    /// Disposition type as sent by the server (`inline`, `ATTACHMENT`, …).
    pub kind: String,
    /// Disposition parameters, keys lower-cased (e.g. `filename`).
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl Disposition {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: BTreeMap::new(),
        }
    }

    /// Builder-style parameter insertion.
    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_lowercase(), value.into());
        self
    }

    /// `true` for `INLINE` / `ATTACHMENT`, compared case-insensitively.
    pub fn is_displayable(&self) -> bool {
        matches!(self.kind.to_uppercase().as_str(), "INLINE" | "ATTACHMENT")
    }
}

/// A single body part with no children.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Leaf {
    /// Section number addressing this part (`"2"`, `"1.3"`).
    pub part_id: String,
    /// MIME type, e.g. `application/pdf`.
    pub content_type: String,
    /// Content-Type parameters, keys lower-cased (e.g. `name`, `charset`).
    #[serde(default)]
    pub type_params: BTreeMap<String, String>,
    pub disposition: Option<Disposition>,
    /// Content-Transfer-Encoding (`base64`, `7bit`, …).
    pub encoding: String,
    /// Encoded size in bytes as reported by the transport.
    pub size: u64,
}

impl Leaf {
    pub fn new(part_id: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            part_id: part_id.into(),
            content_type: content_type.into(),
            type_params: BTreeMap::new(),
            disposition: None,
            encoding: "7bit".to_string(),
            size: 0,
        }
    }

    pub fn with_disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = Some(disposition);
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_type_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.type_params.insert(key.to_lowercase(), value.into());
        self
    }

    /// Section id of the part's own MIME header block.
    pub fn mime_part_id(&self) -> String {
        format!("{}.MIME", self.part_id)
    }

    /// Filename from the disposition, falling back to the content type's `name`.
    pub fn file_name(&self) -> Option<&str> {
        self.disposition
            .as_ref()
            .and_then(|d| d.params.get("filename"))
            .or_else(|| self.type_params.get("name"))
            .map(String::as_str)
    }
}

/// Node of the structure tree.
///
/// Children keep the order the message declares them in; attachment
/// numbering downstream depends on it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StructureNode {
    Leaf(Leaf),
    Composite { children: Vec<StructureNode> },
}

impl StructureNode {
    pub fn composite(children: Vec<StructureNode>) -> Self {
        Self::Composite { children }
    }
}

impl From<Leaf> for StructureNode {
    fn from(leaf: Leaf) -> Self {
        Self::Leaf(leaf)
    }
}
