//! SHA-256 content digests.
//!
//! Image identity in the hash index and backup verification both rest on
//! these digests, always rendered as lowercase hex.

use crate::error::{GalleryError, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const READ_BUFFER: usize = 64 * 1024;

/// Digest a file without loading it whole.
pub fn compute_sha256(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| GalleryError::io_with_path(e, path))?;
    let mut reader = BufReader::with_capacity(READ_BUFFER, file);

    let mut hasher = Sha256::new();
    let mut chunk = [0u8; 8 * 1024];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => hasher.update(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(GalleryError::io_with_path(e, path)),
        }
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn sha256_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
