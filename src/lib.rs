//! `payproof`: extract proof-of-payment documents from inbound mail.
//!
//! The library assembles a message from streamed transport parts, locates
//! its attachments, flattens each PDF's extracted text layout and parses it
//! into a structured payment notification.

pub mod config;
pub mod document;
pub mod error;
pub mod fetch;
pub mod model;
pub mod notification;
pub mod parser;
pub mod pipeline;
