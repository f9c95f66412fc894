//! Extractor trait for reading chunks out of a source file

use eyre::Result;
use std::path::Path;

/// Extractor trait for turning a source file into a sequence of chunks
///
/// Chunks are opaque to the pipeline; only the matching [`Loader`](super::Loader)
/// needs to understand them. Chunks are produced lazily so a large file never
/// has to be held in memory at once.
///
/// # Example
/// ```no_run
/// use divvy_pipeline::etl::Extractor;
/// use eyre::Result;
/// use std::path::Path;
///
/// struct LineExtractor;
///
/// impl Extractor for LineExtractor {
///     type Chunk = String;
///     type Chunks = std::vec::IntoIter<Result<String>>;
///
///     fn extract(&self, path: &Path) -> Result<Self::Chunks> {
///         let content = std::fs::read_to_string(path)?;
///         let lines: Vec<Result<String>> = content.lines().map(|l| Ok(l.to_string())).collect();
///         Ok(lines.into_iter())
///     }
/// }
/// ```
pub trait Extractor: Send + Sync {
    /// The unit of data handed to the loader
    type Chunk: Send;

    /// Iterator over the chunks of one source
    type Chunks: Iterator<Item = Result<Self::Chunk>> + Send;

    /// Open the source at `path` and return its chunks in order
    ///
    /// # Errors
    /// Returns an error if the source cannot be opened. Errors while reading
    /// later chunks are yielded by the iterator.
    fn extract(&self, path: &Path) -> Result<Self::Chunks>;
}
