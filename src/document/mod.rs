//! Document text: the layout extractor's page/run model and its flattening.

pub mod flatten;
pub mod layout;
