//! Pipeline configuration
//!
//! The datasets, bucket and warehouse names the pipeline moves data between.
//! Defaults hold the two Divvy trip files this tool was written for.

use std::fmt;
use std::path::{Path, PathBuf};

/// Bucket the CSV files are uploaded to
pub const DEFAULT_BUCKET: &str = "davvy_bikes_project";

/// BigQuery dataset that receives every table
pub const DEFAULT_DATASET_ID: &str = "divvy_data";

/// Rows per chunk handed to the loader
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// One CSV source file and the warehouse table it lands in
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dataset {
    pub file_name: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl Dataset {
    pub fn new(
        file_name: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }

    /// Resolve the source file against a data directory
    pub fn path(&self, data_dir: impl AsRef<Path>) -> PathBuf {
        data_dir.as_ref().join(&self.file_name)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}.{}",
            self.file_name, self.dataset_id, self.table_id
        )
    }
}

/// A single entry of the pipeline plan
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Push the dataset's source file to the bucket
    Upload(Dataset),
    /// Extract the source file and load every chunk into its table
    Load(Dataset),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload(dataset) => write!(f, "upload {}", dataset.file_name),
            Self::Load(dataset) => write!(f, "load {}", dataset),
        }
    }
}

/// Everything the pipeline needs to know about where data comes from and goes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    pub bucket: String,
    pub data_dir: PathBuf,
    pub datasets: Vec<Dataset>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            data_dir: PathBuf::from("."),
            datasets: vec![
                Dataset::new("divvy_2022.csv", DEFAULT_DATASET_ID, "divvy_2022"),
                Dataset::new("divvy_2023.csv", DEFAULT_DATASET_ID, "divvy_2023"),
            ],
        }
    }
}

impl PipelineConfig {
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl AsRef<Path>) -> Self {
        self.data_dir = data_dir.as_ref().to_path_buf();
        self
    }

    /// The ordered plan: every upload first, then every load, in dataset order
    pub fn steps(&self) -> Vec<Step> {
        let uploads = self.datasets.iter().cloned().map(Step::Upload);
        let loads = self.datasets.iter().cloned().map(Step::Load);
        uploads.chain(loads).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.bucket, "davvy_bikes_project");
        assert_eq!(config.datasets.len(), 2);
        assert_eq!(
            config.datasets[0],
            Dataset::new("divvy_2022.csv", "divvy_data", "divvy_2022")
        );
        assert_eq!(
            config.datasets[1],
            Dataset::new("divvy_2023.csv", "divvy_data", "divvy_2023")
        );
    }

    #[test]
    fn test_steps_upload_before_load() {
        let config = PipelineConfig::default();
        let steps = config.steps();

        assert_eq!(steps.len(), 4);
        assert!(matches!(&steps[0], Step::Upload(d) if d.file_name == "divvy_2022.csv"));
        assert!(matches!(&steps[1], Step::Upload(d) if d.file_name == "divvy_2023.csv"));
        assert!(matches!(&steps[2], Step::Load(d) if d.table_id == "divvy_2022"));
        assert!(matches!(&steps[3], Step::Load(d) if d.table_id == "divvy_2023"));
    }

    #[test]
    fn test_dataset_path() {
        let config = PipelineConfig::default().with_data_dir("/data/divvy");
        let path = config.datasets[0].path(&config.data_dir);
        assert_eq!(path, PathBuf::from("/data/divvy/divvy_2022.csv"));
    }

    #[test]
    fn test_step_display() {
        let dataset = Dataset::new("divvy_2022.csv", "divvy_data", "divvy_2022");
        assert_eq!(
            Step::Upload(dataset.clone()).to_string(),
            "upload divvy_2022.csv"
        );
        assert_eq!(
            Step::Load(dataset).to_string(),
            "load divvy_2022.csv -> divvy_data.divvy_2022"
        );
    }
}
