//! BigQuery client
//!
//! Appends CSV chunks to tables with the `google-cloud-bigquery` SDK. Tables
//! that don't exist yet are created with one STRING column per header field.

use crate::etl::Loader;
use crate::storage::CsvChunk;
use csv::StringRecord;
use eyre::{Context, Result, eyre};
use google_cloud_bigquery::client::{Client, ClientConfig};
use google_cloud_bigquery::http::job::query::QueryRequest;
use google_cloud_bigquery::http::tabledata::insert_all::{InsertAllRequest, Row};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Mutex;

/// Rows sent per streaming insert request
const INSERT_BATCH_ROWS: usize = 500;

type JsonRow = Map<String, Value>;

/// BigQuery client for appending CSV chunks to tables.
///
/// # Example
/// ```no_run
/// use divvy_pipeline::client::BigQueryClient;
///
/// # async fn example() -> eyre::Result<()> {
/// let client = BigQueryClient::connect(None).await?;
/// println!("Loading into project {}", client.project());
/// # Ok(())
/// # }
/// ```
pub struct BigQueryClient {
    client: Client,
    project: String,
    known_tables: Mutex<HashSet<String>>,
}

impl BigQueryClient {
    /// Connect with Application Default Credentials.
    ///
    /// `project` overrides the project id carried by the credentials.
    ///
    /// # Errors
    /// Returns an error if no credentials can be found or neither `project`
    /// nor the credentials name a project
    pub async fn connect(project: Option<String>) -> Result<Self> {
        let (config, detected) = ClientConfig::new_with_auth()
            .await
            .context("Failed to authenticate to BigQuery")?;
        let project = project
            .or(detected)
            .ok_or_else(|| eyre!("No BigQuery project: set GCP_PROJECT"))?;
        let client = Client::new(config)
            .await
            .context("Failed to create BigQuery client")?;

        Ok(Self {
            client,
            project,
            known_tables: Mutex::new(HashSet::new()),
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn is_known(&self, key: &str) -> Result<bool> {
        let tables = self
            .known_tables
            .lock()
            .map_err(|e| eyre!("Table registry poisoned: {}", e))?;
        Ok(tables.contains(key))
    }

    fn remember(&self, key: String) -> Result<()> {
        self.known_tables
            .lock()
            .map_err(|e| eyre!("Table registry poisoned: {}", e))?
            .insert(key);
        Ok(())
    }

    /// Create `dataset_id.table_id` from the chunk header unless it exists
    async fn ensure_table(&self, dataset_id: &str, table_id: &str, header: &StringRecord) -> Result<()> {
        let key = format!("{}.{}", dataset_id, table_id);
        if self.is_known(&key)? {
            return Ok(());
        }

        let request = QueryRequest {
            query: create_table_ddl(&self.project, dataset_id, table_id, header)?,
            use_legacy_sql: false,
            ..Default::default()
        };
        log::debug!("Ensuring table {}.{}", self.project, key);
        self.client
            .job()
            .query(&self.project, &request)
            .await
            .with_context(|| format!("Failed to create table {}", key))?;

        self.remember(key)
    }
}

impl Loader for BigQueryClient {
    type Chunk = CsvChunk;

    async fn load(&self, chunk: Self::Chunk, dataset_id: &str, table_id: &str) -> Result<usize> {
        self.ensure_table(dataset_id, table_id, chunk.header())
            .await?;

        let rows = chunk.len();
        for batch in insert_batches(&chunk, INSERT_BATCH_ROWS) {
            let request = InsertAllRequest {
                rows: batch
                    .into_iter()
                    .map(|json| Row {
                        insert_id: None,
                        json,
                    })
                    .collect(),
                ..Default::default()
            };

            let response = self
                .client
                .tabledata()
                .insert(&self.project, dataset_id, table_id, &request)
                .await
                .with_context(|| format!("Failed to insert rows into {}.{}", dataset_id, table_id))?;
            check_insert_errors(response.insert_errors, dataset_id, table_id)?;
        }

        log::debug!("Appended {} row(s) to {}.{}", rows, dataset_id, table_id);
        Ok(rows)
    }
}

/// `CREATE TABLE IF NOT EXISTS` with one STRING column per header field
fn create_table_ddl(
    project: &str,
    dataset_id: &str,
    table_id: &str,
    header: &StringRecord,
) -> Result<String> {
    if header.is_empty() {
        eyre::bail!("Cannot create {}.{} without columns", dataset_id, table_id);
    }
    for name in [project, dataset_id, table_id].into_iter().chain(header.iter()) {
        if name.trim().is_empty() || name.contains('`') {
            eyre::bail!("Invalid BigQuery identifier: {:?}", name);
        }
    }

    let columns = header
        .iter()
        .map(|name| format!("`{}` STRING", name.trim()))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS `{}.{}.{}` ({})",
        project, dataset_id, table_id, columns
    ))
}

/// Chunk records as JSON objects keyed by header, in batches of `size`
///
/// Empty fields become NULL.
fn insert_batches(chunk: &CsvChunk, size: usize) -> Vec<Vec<JsonRow>> {
    let header: Vec<String> = chunk.header().iter().map(|h| h.trim().to_string()).collect();
    chunk
        .records()
        .chunks(size.max(1))
        .map(|records| {
            records
                .iter()
                .map(|record| {
                    header
                        .iter()
                        .zip(record.iter())
                        .map(|(name, field)| {
                            let value = match field {
                                "" => Value::Null,
                                field => Value::String(field.to_string()),
                            };
                            (name.clone(), value)
                        })
                        .collect()
                })
                .collect()
        })
        .collect()
}

/// Fail when a streaming insert reports rejected rows
fn check_insert_errors<E: Debug>(errors: Option<Vec<E>>, dataset_id: &str, table_id: &str) -> Result<()> {
    match errors {
        Some(errors) if !errors.is_empty() => eyre::bail!(
            "{} row(s) rejected by {}.{}, first: {:?}",
            errors.len(),
            dataset_id,
            table_id,
            errors[0]
        ),
        _ => Ok(()),
    }
}
