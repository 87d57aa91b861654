//! Core data model types: addresses, structure tree, attachments, messages and notifications.

pub mod address;
pub mod attachment;
pub mod message;
pub mod notification;
pub mod structure;
