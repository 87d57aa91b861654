//! Header parsing for the message header section and attachment MIME blocks.

pub mod header;
