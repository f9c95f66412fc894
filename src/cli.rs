//! CLI helper functions

use crate::{
    client::{BigQueryClient, GcsClient},
    config::{DEFAULT_BUCKET, DEFAULT_CHUNK_SIZE, PipelineConfig, Step},
    etl::{Pipeline, RunSummary},
    storage::CsvExtractor,
};
use eyre::{Context, Result};
use std::path::PathBuf;
use url::Url;

/// Settings read from the environment
#[derive(Clone, Debug)]
pub struct Settings {
    pub project: Option<String>,
    pub gcs_url: Option<Url>,
    pub bucket: String,
    pub data_dir: PathBuf,
    pub chunk_size: usize,
}

impl Settings {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::default()
            .with_bucket(&self.bucket)
            .with_data_dir(&self.data_dir)
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Load settings from environment variables
///
/// Credentials are not read here: the Google SDKs find Application Default
/// Credentials (GOOGLE_APPLICATION_CREDENTIALS, gcloud, metadata server).
///
/// Expected environment variables:
/// - GCP_PROJECT: BigQuery project id (optional when the credentials carry one)
/// - GCS_URL: Cloud Storage endpoint for emulators (optional, anonymous when set)
/// - DIVVY_BUCKET: Destination bucket (optional, defaults to davvy_bikes_project)
/// - DIVVY_DATA_DIR: Directory holding the CSV files (optional, defaults to .)
/// - DIVVY_CHUNK_SIZE: Rows per chunk (optional, defaults to 100000)
pub fn load_settings() -> Result<Settings> {
    let chunk_size = match env_var("DIVVY_CHUNK_SIZE") {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid DIVVY_CHUNK_SIZE: {}", value))?,
        None => DEFAULT_CHUNK_SIZE,
    };

    let gcs_url = env_var("GCS_URL")
        .map(|value| Url::parse(&value).with_context(|| format!("Invalid GCS_URL: {}", value)))
        .transpose()?;

    Ok(Settings {
        project: env_var("GCP_PROJECT"),
        gcs_url,
        bucket: env_var("DIVVY_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
        data_dir: env_var("DIVVY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
        chunk_size,
    })
}

/// Connect to Cloud Storage, anonymously when an emulator endpoint is set
pub async fn load_gcs_client(settings: &Settings) -> Result<GcsClient> {
    let endpoint = settings.gcs_url.as_ref().map(|url| url.to_string());
    GcsClient::connect(endpoint)
        .await
        .context("Failed to create Cloud Storage client")
}

/// Connect to BigQuery with default credentials
pub async fn load_bigquery_client(settings: &Settings) -> Result<BigQueryClient> {
    BigQueryClient::connect(settings.project.clone())
        .await
        .context("Failed to create BigQuery client")
}

/// The ordered steps a run would execute
pub fn plan(settings: &Settings) -> Vec<Step> {
    settings.pipeline_config().steps()
}

/// Upload both CSV files, then load each into BigQuery
///
/// Pipeline: GcsClient uploads → CsvExtractor → BigQueryClient
pub async fn run_pipeline(settings: &Settings) -> Result<RunSummary> {
    let extractor = CsvExtractor::new(settings.chunk_size)?;
    let gcs = load_gcs_client(settings).await?;
    let bigquery = load_bigquery_client(settings).await?;

    log::info!("Cloud Storage: {}", gcs.endpoint());
    log::info!("BigQuery project: {}", bigquery.project());
    log::info!("Chunk size: {} row(s)", extractor.chunk_size());

    let pipeline = Pipeline::new(settings.pipeline_config(), gcs, extractor, bigquery);
    pipeline.run().await
}
