//! Per-message orchestration: assemble the message, then turn every PDF
//! attachment into a payment notification.
//!
//! Message assembly is all-or-nothing. Document parsing is not: each
//! attachment gets its own outcome and one bad document never hides the
//! others.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::Config;
use crate::document::flatten::flatten;
use crate::document::layout::{Layout, LayoutExtractor};
use crate::error::{PayproofError, Result};
use crate::fetch::assembler::MessageAssembler;
use crate::fetch::transport::Transport;
use crate::model::attachment::Attachment;
use crate::model::message::Message;
use crate::model::notification::PaymentNotification;
use crate::model::structure::StructureNode;
use crate::notification::parser::parse_notification;

/// A parsed document together with what the extractor reported about it.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DocumentReport {
    pub transcoder: Option<String>,
    /// Document metadata, keys lower-cased.
    pub meta: BTreeMap<String, serde_json::Value>,
    pub notification: PaymentNotification,
}

/// Parse outcome for one attachment.
#[derive(Debug)]
pub struct AttachmentOutcome {
    /// Position in [`Message::attachments`].
    pub index: usize,
    pub name: String,
    pub result: Result<DocumentReport>,
}

/// Everything derived from one inbound mail.
#[derive(Debug)]
pub struct ProcessedMessage {
    pub message: Message,
    pub notifications: Vec<AttachmentOutcome>,
}

/// Flatten a layout and parse it as a notification.
pub fn read_notification(layout: &Layout) -> Result<DocumentReport> {
    let document = flatten(layout)?;
    let notification = parse_notification(&document)?;
    Ok(DocumentReport {
        transcoder: layout.transcoder.clone(),
        meta: layout.normalized_meta(),
        notification,
    })
}

pub struct Pipeline<'a, T: Transport, E: LayoutExtractor> {
    transport: &'a T,
    extractor: &'a E,
    pdf_content_types: Vec<String>,
    deadline: Option<Duration>,
}

impl<'a, T: Transport, E: LayoutExtractor> Pipeline<'a, T, E> {
    pub fn new(transport: &'a T, extractor: &'a E, config: &Config) -> Self {
        Self {
            transport,
            extractor,
            pdf_content_types: config.documents.pdf_content_types.clone(),
            deadline: config.fetch.deadline(),
        }
    }

    /// Override the configured deadline (`None` disables it).
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Fetch one message and parse its PDF attachments.
    pub async fn process(
        &self,
        structure: &StructureNode,
        internal_date: Option<DateTime<Utc>>,
    ) -> Result<ProcessedMessage> {
        let work = async {
            let message = MessageAssembler::new(self.transport)
                .fetch_message(structure, internal_date)
                .await?;
            let notifications = self.notifications(&message);
            Ok::<_, PayproofError>(ProcessedMessage {
                message,
                notifications,
            })
        };

        match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, work)
                .await
                .map_err(|_| PayproofError::Timeout(deadline))?,
            None => work.await,
        }
    }

    /// Parse every PDF-typed attachment of `message`, independently.
    pub fn notifications(&self, message: &Message) -> Vec<AttachmentOutcome> {
        message
            .attachments()
            .iter()
            .enumerate()
            .filter(|(_, att)| att.has_type(&self.pdf_content_types))
            .map(|(index, att)| {
                let result = self.read_attachment(att);
                match &result {
                    Ok(report) => debug!(
                        index,
                        trace_id = %report.notification.trace_id,
                        "notification parsed"
                    ),
                    Err(e) => warn!(index, name = %att.name, error = %e, "notification rejected"),
                }
                AttachmentOutcome {
                    index,
                    name: att.name.clone(),
                    result,
                }
            })
            .collect()
    }

    fn read_attachment(&self, attachment: &Attachment) -> Result<DocumentReport> {
        let bytes = attachment.decoded()?;
        let layout = self.extractor.extract(&bytes)?;
        read_notification(&layout)
    }
}
