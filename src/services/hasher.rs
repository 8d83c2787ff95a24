//! Content Addresser
//!
//! SHA-256 digests of file content, used for change detection and as the
//! `contentHash` of stored per-file results.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::utils::error::{AppError, AppResult};

/// Lowercase hex SHA-256 of `bytes`
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Hash the content of a file.
///
/// Fails with `FileUnavailable` when the file cannot be read.
pub async fn hash_file(path: &Path) -> AppResult<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AppError::file_unavailable(path, e))?;
    Ok(hash_bytes(&bytes))
}
