//! Optional integrity check of downloaded archives.

use crate::error::FetchError;
use bytes::Bytes;
use sha2::{Digest, Sha256};

/// Verifies that `data` hashes to `expected_hash` (SHA-256, hex, any case).
///
/// Hashing runs on the blocking pool so large archives do not stall the runtime.
pub async fn verify_sha256(data: Bytes, expected_hash: &str) -> Result<(), FetchError> {
    let expected_hash = expected_hash.trim().to_string();

    tokio::task::spawn_blocking(move || {
        let actual_hash = hex::encode(Sha256::digest(&data));

        if actual_hash.eq_ignore_ascii_case(&expected_hash) {
            Ok(())
        } else {
            Err(FetchError::ChecksumMismatch {
                expected: expected_hash,
                actual: actual_hash,
            })
        }
    })
    .await
    .map_err(|e| FetchError::Io(std::io::Error::other(e)))?
}
