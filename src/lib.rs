//! Divvy Pipeline
//!
//! Uploads the Divvy trip CSV files to Cloud Storage and loads them into BigQuery

pub mod cli;
pub mod client;
pub mod config;
pub mod etl;
pub mod storage;

// Re-exports for convenience
pub use client::{BigQueryClient, GcsClient};
pub use config::{Dataset, PipelineConfig, Step};
pub use etl::{Extractor, Loader, Pipeline, RunSummary, Uploader};
pub use storage::{CsvChunk, CsvExtractor};
