//! Message retrieval: part streams, attachment discovery and message assembly.

pub mod assembler;
pub mod locator;
pub mod stream;
pub mod transport;
