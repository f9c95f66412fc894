//! Cloud Storage client
//!
//! Streams local files into buckets with the `google-cloud-storage` SDK.

use crate::etl::Uploader;
use eyre::{Context, Result};
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use std::path::Path;
use tokio::fs::File;

/// Cloud Storage client for uploading files into buckets.
///
/// # Example
/// ```no_run
/// use divvy_pipeline::client::GcsClient;
/// use divvy_pipeline::etl::Uploader;
/// use std::path::Path;
///
/// # async fn example() -> eyre::Result<()> {
/// let client = GcsClient::connect(None).await?;
///
/// client
///     .upload(Path::new("divvy_2022.csv"), "davvy_bikes_project", "divvy_2022.csv")
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GcsClient {
    client: Client,
    endpoint: String,
}

impl GcsClient {
    /// Connect to Cloud Storage.
    ///
    /// With no endpoint the client authenticates with Application Default
    /// Credentials against the public API. With an endpoint (e.g. a local
    /// emulator) it sends anonymous requests there instead.
    ///
    /// # Errors
    /// Returns an error if no default credentials can be found
    pub async fn connect(endpoint: Option<String>) -> Result<Self> {
        let config = match endpoint {
            Some(endpoint) => {
                let mut config = ClientConfig::default().anonymous();
                config.storage_endpoint = endpoint.trim_end_matches('/').to_string();
                config
            }
            None => ClientConfig::default()
                .with_auth()
                .await
                .context("Failed to authenticate to Cloud Storage")?,
        };
        let endpoint = config.storage_endpoint.clone();

        Ok(Self {
            client: Client::new(config),
            endpoint,
        })
    }

    /// The API endpoint requests are sent to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Content type stored with an uploaded object, guessed from its extension
pub fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

impl Uploader for GcsClient {
    async fn upload(&self, local_path: &Path, bucket: &str, object_name: &str) -> Result<()> {
        let file = File::open(local_path)
            .await
            .with_context(|| format!("Failed to open file: {}", local_path.display()))?;
        let len = file
            .metadata()
            .await
            .with_context(|| format!("Failed to stat file: {}", local_path.display()))?
            .len();

        let mut media = Media::new(object_name.to_string());
        media.content_type = content_type(local_path).into();
        media.content_length = Some(len);

        let request = UploadObjectRequest {
            bucket: bucket.to_string(),
            ..Default::default()
        };

        self.client
            .upload_object(&request, file, &UploadType::Simple(media))
            .await
            .with_context(|| format!("Cloud Storage rejected gs://{}/{}", bucket, object_name))?;

        log::debug!("Stored {} byte(s) at gs://{}/{}", len, bucket, object_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// What a stub server saw of one request
    struct Received {
        head: String,
        body_len: usize,
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    /// Decode a chunked body, returning its length once the final chunk arrived
    fn chunked_len(mut body: &[u8]) -> Option<usize> {
        let mut total = 0;
        loop {
            let line_end = find(body, b"\r\n")?;
            let size_field = std::str::from_utf8(&body[..line_end]).ok()?;
            let size = usize::from_str_radix(size_field.split(';').next()?.trim(), 16).ok()?;
            if size == 0 {
                return Some(total);
            }
            let next = line_end + 2 + size + 2;
            if body.len() < next {
                return None;
            }
            total += size;
            body = &body[next..];
        }
    }

    /// Accept one request, read it fully, answer with `status` and `body`
    async fn serve_once(listener: TcpListener, status: &'static str, body: &'static str) -> Received {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut read = [0u8; 8192];

        let head_end = loop {
            let n = socket.read(&mut read).await.unwrap();
            assert!(n > 0, "connection closed before headers");
            buf.extend_from_slice(&read[..n]);
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();

        let content_length = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map(|v| v.trim().parse::<usize>().unwrap());
        let body_len = loop {
            let body = &buf[head_end..];
            let done = match content_length {
                Some(len) if body.len() >= len => Some(len),
                Some(_) => None,
                None => chunked_len(body),
            };
            if let Some(len) = done {
                break len;
            }
            let n = socket.read(&mut read).await.unwrap();
            assert!(n > 0, "connection closed before body");
            buf.extend_from_slice(&read[..n]);
        };

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        Received { head, body_len }
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type(Path::new("divvy_2022.csv")), "text/csv");
        assert_eq!(content_type(Path::new("DATA/TRIPS.CSV")), "text/csv");
        assert_eq!(content_type(Path::new("manifest.json")), "application/json");
        assert_eq!(content_type(Path::new("archive")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_connect_with_endpoint() {
        let client = GcsClient::connect(Some("http://localhost:4443/".to_string()))
            .await
            .unwrap();
        assert_eq!(client.endpoint(), "http://localhost:4443");
    }

    #[tokio::test]
    async fn test_upload_streams_file_and_surfaces_rejection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_once(
            listener,
            "403 Forbidden",
            r#"{"error":{"code":403,"message":"upload-denied","errors":[{"domain":"global","reason":"forbidden","message":"upload-denied"}]}}"#,
        ));

        let mut temp = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        let row = "ride_id,rideable_type\n";
        for _ in 0..5000 {
            temp.write_all(row.as_bytes()).unwrap();
        }
        temp.flush().unwrap();

        let client = GcsClient::connect(Some(format!("http://{}", addr))).await.unwrap();
        let result = client
            .upload(temp.path(), "test-bucket", "divvy_2022.csv")
            .await;

        let received = server.await.unwrap();
        assert!(received.head.starts_with("post "));
        assert!(received.head.contains("/upload/storage/v1/b/test-bucket/o"));
        assert!(received.head.contains("divvy_2022.csv"));
        assert!(received.head.contains("content-type: text/csv"));
        assert!(!received.head.contains("authorization:"));
        assert_eq!(received.body_len, row.len() * 5000);

        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("gs://test-bucket/divvy_2022.csv"));
        assert!(
            message.contains("403") || message.contains("upload-denied"),
            "status not surfaced: {}",
            message
        );
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let client = GcsClient::connect(Some("http://127.0.0.1:9".to_string()))
            .await
            .unwrap();

        let result = client
            .upload(Path::new("/nonexistent/divvy_2022.csv"), "bucket", "divvy_2022.csv")
            .await;
        assert!(result.unwrap_err().to_string().contains("Failed to open file"));
    }

    #[test]
    fn test_chunked_len() {
        assert_eq!(chunked_len(b"4\r\nabcd\r\n2\r\nef\r\n0\r\n\r\n"), Some(6));
        assert_eq!(chunked_len(b"4\r\nab"), None);
    }
}
