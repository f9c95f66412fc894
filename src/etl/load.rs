//! Loader trait for loading chunks into a warehouse table

use eyre::Result;

/// Loader trait for writing a chunk into a destination table
///
/// # Example
/// ```no_run
/// use divvy_pipeline::etl::Loader;
/// use eyre::Result;
///
/// struct PrintLoader;
///
/// impl Loader for PrintLoader {
///     type Chunk = Vec<String>;
///
///     async fn load(&self, chunk: Self::Chunk, dataset_id: &str, table_id: &str) -> Result<usize> {
///         println!("{} rows into {}.{}", chunk.len(), dataset_id, table_id);
///         Ok(chunk.len())
///     }
/// }
/// ```
pub trait Loader: Send + Sync {
    /// The unit of data accepted by the destination
    type Chunk: Send;

    /// Load one chunk into `dataset_id.table_id`
    ///
    /// Returns the number of rows loaded
    ///
    /// # Errors
    /// Returns an error if loading fails (network, auth, rejected job, etc.)
    fn load(
        &self,
        chunk: Self::Chunk,
        dataset_id: &str,
        table_id: &str,
    ) -> impl std::future::Future<Output = Result<usize>> + Send;
}
