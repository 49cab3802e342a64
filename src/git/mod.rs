//! Git access layer

mod extractor;

pub use extractor::{CommitExtractor, CommitFilter};
