//! Chunked CSV reading

use crate::config::DEFAULT_CHUNK_SIZE;
use crate::etl::Extractor;

use csv::{Reader, ReaderBuilder, StringRecord, Writer};
use eyre::{Context, Result, eyre};
use std::fs::File;
use std::path::Path;

/// A batch of CSV records sharing the header of the file they came from
#[derive(Clone, Debug, PartialEq)]
pub struct CsvChunk {
    header: StringRecord,
    records: Vec<StringRecord>,
}

impl CsvChunk {
    pub fn new(header: StringRecord, records: Vec<StringRecord>) -> Self {
        Self { header, records }
    }

    pub fn header(&self) -> &StringRecord {
        &self.header
    }

    pub fn records(&self) -> &[StringRecord] {
        &self.records
    }

    /// Number of data rows (the header is not counted)
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize the header followed by every record as CSV
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::from_writer(Vec::new());
        writer.write_record(&self.header)?;
        for record in &self.records {
            writer.write_record(record)?;
        }
        writer
            .into_inner()
            .map_err(|e| eyre!("Failed to flush CSV chunk: {}", e.error()))
    }
}

/// Extract CSV files with a header row in chunks of at most `chunk_size` records
#[derive(Clone, Copy, Debug)]
pub struct CsvExtractor {
    chunk_size: usize,
}

impl Default for CsvExtractor {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl CsvExtractor {
    /// # Errors
    /// Returns an error if `chunk_size` is zero
    pub fn new(chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            eyre::bail!("Chunk size must be greater than zero");
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Extractor for CsvExtractor {
    type Chunk = CsvChunk;
    type Chunks = CsvChunks;

    fn extract(&self, path: &Path) -> Result<Self::Chunks> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
        let header = reader
            .headers()
            .with_context(|| format!("Failed to read CSV header: {}", path.display()))?
            .clone();

        log::debug!(
            "Reading {} with {} column(s) in chunks of {}",
            path.display(),
            header.len(),
            self.chunk_size
        );

        Ok(CsvChunks {
            reader,
            header,
            chunk_size: self.chunk_size,
            done: false,
        })
    }
}

/// Lazy iterator over the chunks of one CSV file
pub struct CsvChunks {
    reader: Reader<File>,
    header: StringRecord,
    chunk_size: usize,
    done: bool,
}

impl Iterator for CsvChunks {
    type Item = Result<CsvChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut records = Vec::with_capacity(self.chunk_size.min(4096));
        let mut record = StringRecord::new();
        while records.len() < self.chunk_size {
            match self.reader.read_record(&mut record) {
                Ok(true) => records.push(record.clone()),
                Ok(false) => {
                    self.done = true;
                    break;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(eyre::Report::new(e).wrap_err("Failed to read CSV record")));
                }
            }
        }

        if records.is_empty() {
            None
        } else {
            Some(Ok(CsvChunk::new(self.header.clone(), records)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut temp = NamedTempFile::new().unwrap();
        write!(temp, "{}", content).unwrap();
        temp
    }

    #[test]
    fn test_chunks_split_by_size() {
        let temp = csv_file("ride_id,rideable_type\nr1,electric\nr2,classic\nr3,docked\nr4,classic\nr5,electric\n");
        let extractor = CsvExtractor::new(2).unwrap();

        let chunks: Vec<CsvChunk> = extractor
            .extract(temp.path())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(chunks.iter().map(CsvChunk::len).collect::<Vec<_>>(), vec![2, 2, 1]);
        assert_eq!(chunks[0].header(), &StringRecord::from(vec!["ride_id", "rideable_type"]));
        assert_eq!(&chunks[2].records()[0][0], "r5");
    }

    #[test]
    fn test_header_only_yields_no_chunks() {
        let temp = csv_file("ride_id,rideable_type\n");
        let mut chunks = CsvExtractor::default().extract(temp.path()).unwrap();
        assert!(chunks.next().is_none());
    }

    #[test]
    fn test_chunk_to_csv_bytes() {
        let temp = csv_file("ride_id,note\nr1,\"two\nlines\"\nr2,\"has, comma\"\n");
        let chunk = CsvExtractor::default()
            .extract(temp.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap();

        assert_eq!(chunk.len(), 2);
        let bytes = chunk.to_csv_bytes().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "ride_id,note\nr1,\"two\nlines\"\nr2,\"has, comma\"\n"
        );
    }

    #[test]
    fn test_chunk_size() {
        assert!(CsvExtractor::new(0).is_err());
        assert_eq!(CsvExtractor::new(250).unwrap().chunk_size(), 250);
        assert_eq!(CsvExtractor::default().chunk_size(), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_missing_file() {
        let result = CsvExtractor::default().extract(Path::new("/nonexistent/divvy_2022.csv"));
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_record() {
        let temp = csv_file("a,b\n1,2\n3,4,5\n");
        let extractor = CsvExtractor::new(1).unwrap();
        let mut chunks = extractor.extract(temp.path()).unwrap();

        assert_eq!(chunks.next().unwrap().unwrap().len(), 1);
        assert!(chunks.next().unwrap().is_err());
        assert!(chunks.next().is_none());
    }
}
