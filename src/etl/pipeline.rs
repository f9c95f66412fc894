//! Pipeline orchestration for upload, extract and load

use super::{Extractor, Loader, Uploader, object_name};
use crate::config::{Dataset, PipelineConfig, Step};
use eyre::{Context, Result};

/// Counts accumulated over one pipeline run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Files pushed to the bucket
    pub uploaded: usize,
    /// Chunks handed to the loader
    pub chunks: usize,
    /// Rows reported loaded by the loader
    pub rows: usize,
}

/// Pipeline that uploads every dataset, then extracts and loads each in turn
///
/// # Type Parameters
/// - `U`: Uploader type
/// - `E`: Extractor type
/// - `L`: Loader type (must accept E::Chunk)
///
/// # Example
/// ```no_run
/// use divvy_pipeline::client::{BigQueryClient, GcsClient};
/// use divvy_pipeline::config::PipelineConfig;
/// use divvy_pipeline::etl::Pipeline;
/// use divvy_pipeline::storage::CsvExtractor;
///
/// # async fn example() -> eyre::Result<()> {
/// let gcs = GcsClient::connect(None).await?;
/// let bigquery = BigQueryClient::connect(Some("my-project".to_string())).await?;
///
/// let pipeline = Pipeline::new(
///     PipelineConfig::default(),
///     gcs,
///     CsvExtractor::default(),
///     bigquery,
/// );
///
/// let summary = pipeline.run().await?;
/// println!("Loaded {} rows", summary.rows);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<U, E, L> {
    config: PipelineConfig,
    uploader: U,
    extractor: E,
    loader: L,
}

impl<U, E, L> Pipeline<U, E, L>
where
    U: Uploader,
    E: Extractor,
    L: Loader<Chunk = E::Chunk>,
{
    /// Create a new pipeline
    pub fn new(config: PipelineConfig, uploader: U, extractor: E, loader: L) -> Self {
        Self {
            config,
            uploader,
            extractor,
            loader,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Upload a dataset's source file to the configured bucket
    ///
    /// The object is named after the file's base name.
    pub async fn upload(&self, dataset: &Dataset) -> Result<()> {
        let path = dataset.path(&self.config.data_dir);
        let name = object_name(&path)?;
        let bucket = &self.config.bucket;

        log::debug!("Uploading {} as {}", path.display(), name);
        self.uploader
            .upload(&path, bucket, name)
            .await
            .wrap_err_with(|| {
                format!("Failed to upload {} to bucket {}", path.display(), bucket)
            })?;

        log::info!("File {} uploaded to GCS bucket {}", path.display(), bucket);
        Ok(())
    }

    /// Extract a dataset's source file and load each chunk into its table
    ///
    /// Returns the number of chunks and rows loaded
    pub async fn load(&self, dataset: &Dataset) -> Result<(usize, usize)> {
        let path = dataset.path(&self.config.data_dir);

        log::debug!("Extracting {}", path.display());
        let chunks = self
            .extractor
            .extract(&path)
            .wrap_err_with(|| format!("Failed to extract {}", path.display()))?;

        let mut chunk_count = 0;
        let mut rows = 0;
        for chunk in chunks {
            let chunk = chunk.wrap_err_with(|| {
                format!("Failed to read chunk {} of {}", chunk_count + 1, path.display())
            })?;
            rows += self
                .loader
                .load(chunk, &dataset.dataset_id, &dataset.table_id)
                .await
                .wrap_err_with(|| {
                    format!(
                        "Failed to load chunk {} into {}.{}",
                        chunk_count + 1,
                        dataset.dataset_id,
                        dataset.table_id
                    )
                })?;
            chunk_count += 1;
            log::debug!("Loaded chunk {} of {}", chunk_count, dataset.file_name);
        }

        log::info!(
            "Loaded {} row(s) in {} chunk(s) into {}.{}",
            rows,
            chunk_count,
            dataset.dataset_id,
            dataset.table_id
        );
        Ok((chunk_count, rows))
    }

    /// Run every step of the plan in order
    ///
    /// Steps:
    /// 1. Upload each dataset's file
    /// 2. Extract and load each dataset
    ///
    /// # Errors
    /// The first failing step aborts the run. Nothing already uploaded or
    /// loaded is rolled back.
    pub async fn run(&self) -> Result<RunSummary> {
        log::info!("Starting pipeline for {} dataset(s)", self.config.datasets.len());

        let mut summary = RunSummary::default();
        for step in self.config.steps() {
            log::debug!("Step: {}", step);
            match &step {
                Step::Upload(dataset) => {
                    self.upload(dataset).await?;
                    summary.uploaded += 1;
                }
                Step::Load(dataset) => {
                    let (chunks, rows) = self.load(dataset).await?;
                    summary.chunks += chunks;
                    summary.rows += rows;
                }
            }
        }

        log::info!(
            "Pipeline complete: {} file(s) uploaded, {} row(s) loaded",
            summary.uploaded,
            summary.rows
        );
        Ok(summary)
    }
}
