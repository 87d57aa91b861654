//! Message assembly: header, primary body and every located attachment.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use tracing::{debug, info};

use crate::error::{PayproofError, Result};
use crate::fetch::locator::locate;
use crate::fetch::stream::RawPart;
use crate::fetch::transport::Transport;
use crate::model::attachment::Attachment;
use crate::model::message::{Body, Message};
use crate::model::structure::{Leaf, StructureNode};
use crate::parser::header::{parse_header, parse_mime_headers};

/// Section id of the message header block.
pub const HEADER_SECTION: &str = "HEADER";

/// Builds [`Message`]s, fetching attachment parts through a [`Transport`].
pub struct MessageAssembler<'t, T: Transport> {
    transport: &'t T,
}

impl<'t, T: Transport> MessageAssembler<'t, T> {
    pub fn new(transport: &'t T) -> Self {
        Self { transport }
    }

    /// Fetch header, primary body and attachments for a message whose
    /// structure is already known.
    pub async fn fetch_message(
        &self,
        structure: &StructureNode,
        internal_date: Option<DateTime<Utc>>,
    ) -> Result<Message> {
        let body_id = primary_body(structure)
            .map(|leaf| leaf.part_id.clone())
            .unwrap_or_else(|| "1".to_string());

        let header = self.transport.open(HEADER_SECTION)?;
        let body = self.transport.open(&body_id)?;
        let (header, body) = tokio::try_join!(header.finish(), body.finish())?;

        self.assemble(&header, internal_date, &body, &locate(structure))
            .await
    }

    /// Combine already-fetched header and body with the located attachment
    /// leaves.
    ///
    /// Every attachment is fetched concurrently; the result keeps the order of
    /// `located`. One failed fetch fails the whole message.
    pub async fn assemble(
        &self,
        header: &RawPart,
        internal_date: Option<DateTime<Utc>>,
        body: &RawPart,
        located: &[&Leaf],
    ) -> Result<Message> {
        let header = parse_header(&header.text(), internal_date);
        let body = Body {
            text: body.text().replace("\r\n", ""),
        };

        let attachments = try_join_all(
            located
                .iter()
                .enumerate()
                .map(|(index, leaf)| self.fetch_attachment(index, leaf)),
        )
        .await?;

        info!(
            from = %header.from,
            subject = %header.subject,
            attachments = attachments.len(),
            "message assembled"
        );
        Ok(Message::new(header, body, attachments))
    }

    async fn fetch_attachment(&self, index: usize, leaf: &Leaf) -> Result<Attachment> {
        let name = leaf
            .file_name()
            .map(String::from)
            .unwrap_or_else(|| format!("attachment_{index}"));

        let fetched = async {
            let data = self.transport.open(&leaf.part_id)?;
            let mime = self.transport.open(&leaf.mime_part_id())?;
            Ok::<_, PayproofError>(tokio::try_join!(data.finish(), mime.finish())?)
        }
        .await;

        let (data, mime) = fetched.map_err(|source| PayproofError::AttachmentFetch {
            index,
            part_id: leaf.part_id.clone(),
            name: name.clone(),
            source: Box::new(source),
        })?;

        debug!(index, part = %leaf.part_id, bytes = data.bytes().len(), "attachment fetched");
        Ok(Attachment {
            name,
            content_type: leaf.content_type.clone(),
            encoding: leaf.encoding.clone(),
            size: leaf.size,
            headers: parse_mime_headers(&mime.text()),
            data: data.into_bytes(),
        })
    }
}

/// First `text/*` leaf without a disposition, depth-first.
pub fn primary_body(root: &StructureNode) -> Option<&Leaf> {
    match root {
        StructureNode::Leaf(leaf) => (leaf.disposition.is_none()
            && leaf.content_type.to_lowercase().starts_with("text/"))
        .then_some(leaf),
        StructureNode::Composite { children } => children.iter().find_map(primary_body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::transport::MemoryTransport;
    use crate::model::structure::Disposition;
    use std::time::Duration;

    fn pdf(id: &str, file: &str) -> StructureNode {
        Leaf::new(id, "application/pdf")
            .with_encoding("base64")
            .with_size(8)
            .with_disposition(Disposition::new("attachment").with_param("filename", file))
            .into()
    }

    fn structure() -> StructureNode {
        StructureNode::composite(vec![
            Leaf::new("1", "text/plain").into(),
            pdf("2", "a.pdf"),
            pdf("3", "b.pdf"),
            pdf("4", "c.pdf"),
        ])
    }

    fn transport() -> MemoryTransport {
        MemoryTransport::new()
            .with_part("HEADER", ["From: Jane <jane@x.com>\r\nTo: ops@y.com\r\n", "Subject: proof\r\n"])
            .with_part("1", ["see\r\n", "attached"])
            .with_part("2", ["QUFB"])
            .with_part("2.MIME", ["Content-Type: application/pdf\r\n"])
            .with_part("3", ["Q", "kJC"])
            .with_part("3.MIME", ["Content-Type: application/pdf\r\n"])
            .with_part("4", ["Q0ND"])
            .with_part("4.MIME", ["Content-Type: application/pdf\r\n"])
    }

    #[tokio::test]
    async fn test_fetch_message() {
        let transport = transport();
        let message = MessageAssembler::new(&transport)
            .fetch_message(&structure(), None)
            .await
            .unwrap();

        assert_eq!(message.header().from.address, "jane@x.com");
        assert_eq!(message.header().subject, "proof");
        assert_eq!(message.body().text, "seeattached");

        let names: Vec<_> = message.attachments().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf", "c.pdf"]);
        assert_eq!(message.attachments()[1].data.as_ref(), b"QkJC");
        assert_eq!(message.attachments()[1].decoded().unwrap(), b"BBB");
        assert_eq!(
            message.attachments()[0].headers["content-type"],
            "application/pdf"
        );
    }

    #[tokio::test]
    async fn test_order_follows_structure_not_completion() {
        let transport = transport()
            .with_delay("2", Duration::from_millis(30))
            .with_delay("3.MIME", Duration::from_millis(15));
        let message = MessageAssembler::new(&transport)
            .fetch_message(&structure(), None)
            .await
            .unwrap();
        let data: Vec<_> = message.attachments().iter().map(|a| a.data.clone()).collect();
        assert_eq!(data, vec!["QUFB", "QkJC", "Q0ND"]);
    }

    #[tokio::test]
    async fn test_one_failed_fetch_fails_the_message() {
        let transport = transport().with_failing_part("3", ["Qk"], "connection reset");
        let err = MessageAssembler::new(&transport)
            .fetch_message(&structure(), None)
            .await
            .unwrap_err();

        match err {
            PayproofError::AttachmentFetch {
                index,
                part_id,
                name,
                source,
            } => {
                assert_eq!(index, 1);
                assert_eq!(part_id, "3");
                assert_eq!(name, "b.pdf");
                assert!(matches!(*source, PayproofError::Io { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_mime_part_fails_the_message() {
        let transport = MemoryTransport::new()
            .with_part("HEADER", ["From: a@b.com\r\n"])
            .with_part("1", ["body"])
            .with_part("2", ["QUFB"]);
        let structure = StructureNode::composite(vec![
            Leaf::new("1", "text/plain").into(),
            pdf("2", "a.pdf"),
        ]);
        let err = MessageAssembler::new(&transport)
            .fetch_message(&structure, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PayproofError::AttachmentFetch { index: 0, .. }));
    }

    #[tokio::test]
    async fn test_unnamed_attachment_gets_generated_name() {
        let transport = transport();
        let header = RawPart::new("HEADER", &b"From: a@b.com\r\n"[..]);
        let body = RawPart::new("1", &b""[..]);
        let leaf = Leaf::new("2", "image/png").with_disposition(Disposition::new("inline"));
        let message = MessageAssembler::new(&transport)
            .assemble(&header, None, &body, &[&leaf])
            .await
            .unwrap();
        assert_eq!(message.attachments()[0].name, "attachment_0");
    }

    #[test]
    fn test_primary_body() {
        let root = StructureNode::composite(vec![
            StructureNode::composite(vec![Leaf::new("1.1", "TEXT/PLAIN").into()]),
            pdf("2", "a.pdf"),
        ]);
        assert_eq!(primary_body(&root).map(|l| l.part_id.as_str()), Some("1.1"));
        assert!(primary_body(&pdf("1", "a.pdf")).is_none());
    }
}
