//! Shared key helpers for storage backends and the ingestion pipeline.

use crate::traits::{StorageError, StorageResult};

/// Storage key of the rendered image for one page (1-based) of a document.
pub fn page_image_key(unique_key: &str, page_number: u32) -> String {
    format!("{}_page_{}.jpg", unique_key, page_number)
}

/// Content type guessed from a file name or key extension.
pub fn content_type_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Reject keys and bucket names that could escape their namespace.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.contains("..") || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains invalid characters: {}",
            key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_keys_are_one_based_jpegs() {
        assert_eq!(page_image_key("abc_17", 1), "abc_17_page_1.jpg");
        assert_eq!(page_image_key("abc_17", 12), "abc_17_page_12.jpg");
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type_for("report.pdf"), "application/pdf");
        assert_eq!(content_type_for("abc_page_1.jpg"), "image/jpeg");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[test]
    fn rejects_traversal() {
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("/abs").is_err());
        assert!(validate_key("").is_err());
        assert!(validate_key("abc_1700000000").is_ok());
    }
}
