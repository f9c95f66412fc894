//! File system storage operations
//!
//! Reading local source files into chunks the loaders understand.

mod chunked;

pub use chunked::{CsvChunk, CsvChunks, CsvExtractor};
