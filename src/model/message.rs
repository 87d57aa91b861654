//! Assembled message types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::address::Address;
use super::attachment::Attachment;

/// Value of a header not modelled explicitly. Kept opaque so new headers
/// pass through without schema changes.
pub type HeaderValue = serde_json::Value;

/// Normalized message header.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Header {
    pub from: Address,
    pub to: Vec<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc: Option<Vec<Address>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bcc: Option<Vec<Address>>,
    pub subject: String,
    pub date: DateTime<Utc>,
    /// Every other header, lower-cased name → array of raw values.
    pub extra: BTreeMap<String, HeaderValue>,
}

/// Primary text body.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Body {
    pub text: String,
}

/// One inbound mail, fully fetched.
///
/// Built once by the message assembler and never mutated afterwards; the
/// fields are only reachable through accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    header: Header,
    body: Body,
    attachments: Vec<Attachment>,
}

impl Message {
    pub(crate) fn new(header: Header, body: Body, attachments: Vec<Attachment>) -> Self {
        Self {
            header,
            body,
            attachments,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Attachments in structure-tree order.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }
}
