//! Google Cloud clients.
//!
//! This module provides the [`GcsClient`] for uploading objects to Cloud
//! Storage and the [`BigQueryClient`] for appending rows to tables. Both
//! find credentials the way the Google SDKs do (Application Default
//! Credentials).

mod bigquery;
mod gcs;

pub use bigquery::BigQueryClient;
pub use gcs::{GcsClient, content_type};
