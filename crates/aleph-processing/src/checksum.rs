//! Content-and-name fingerprint used as the document identity key.

use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Read size for streaming the file into the hash.
const CHUNK_SIZE: usize = 4096;

/// SHA-256 over the file's bytes followed by the UTF-8 bytes of `original_name`,
/// hex encoded.
///
/// Identical bytes under different names hash differently.
pub async fn file_checksum(path: &Path, original_name: &str) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    hasher.update(original_name.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Storage key for an upload: checksum plus the upload's unix timestamp.
pub fn unique_key(checksum: &str, unix_timestamp: i64) -> String {
    format!("{}_{}", checksum, unix_timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write(dir: &Path, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    #[tokio::test]
    async fn hashes_bytes_then_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "upload", b"ab").await;

        // sha256("abc")
        assert_eq!(
            file_checksum(&path, "c").await.unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn deterministic_and_name_aware() {
        let dir = tempfile::tempdir().unwrap();
        let content = vec![7u8; CHUNK_SIZE * 3 + 17];
        let path = write(dir.path(), "blob", &content).await;

        let first = file_checksum(&path, "report.pdf").await.unwrap();
        let second = file_checksum(&path, "report.pdf").await.unwrap();
        let renamed = file_checksum(&path, "report-final.pdf").await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first, renamed);
        assert_eq!(first.len(), 64);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(file_checksum(&dir.path().join("nope"), "nope").await.is_err());
    }

    #[test]
    fn unique_keys_differ_across_seconds() {
        let checksum = "ba7816bf";
        let a = unique_key(checksum, 1_700_000_000);
        let b = unique_key(checksum, 1_700_000_001);
        assert_eq!(a, "ba7816bf_1700000000");
        assert_ne!(a, b);
    }
}
