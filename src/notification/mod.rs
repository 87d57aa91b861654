//! Payment-notification template parsing.

pub mod parser;
