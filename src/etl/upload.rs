//! Uploader trait for pushing files to an object store

use eyre::Result;
use std::path::Path;

/// Uploader trait for transferring a local file into a bucket
///
/// Implementations create the object or overwrite an existing one.
pub trait Uploader: Send + Sync {
    /// Upload the bytes at `local_path` to `bucket` as `object_name`
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the store rejects the
    /// request (transport, auth, missing bucket, etc.)
    fn upload(
        &self,
        local_path: &Path,
        bucket: &str,
        object_name: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// The object name a local file is stored under: its base filename
///
/// # Errors
/// Returns an error if the path has no file name component (e.g. `..` or `/`)
pub fn object_name(local_path: &Path) -> Result<&str> {
    local_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| eyre::eyre!("Path has no file name: {}", local_path.display()))
}
