use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Size of the read buffer used while hashing.
pub const DIGEST_CHUNK_SIZE: usize = 64 * 1024;

/// Hex-encoded SHA-256 digest of a file's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(pub String);

impl ContentDigest {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Computes the SHA-256 digest of a file, reading it in fixed-size chunks.
///
/// The whole file is never held in memory. Fails with the underlying I/O error
/// if the file cannot be opened or a read fails mid-stream.
pub async fn digest_file(path: &Path) -> std::io::Result<ContentDigest> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; DIGEST_CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(ContentDigest(hex::encode(hasher.finalize())))
}

/// Digest of an in-memory buffer; matches [`digest_file`] for the same bytes.
pub fn digest_bytes(bytes: &[u8]) -> ContentDigest {
    ContentDigest(hex::encode(Sha256::digest(bytes)))
}
