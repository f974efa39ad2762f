//! Filesystem metadata captured for an uploaded file before upload.

use aleph_core::models::{FileMetadata, NOT_AVAILABLE};
use chrono::{DateTime, Local};
use std::path::Path;
use std::time::SystemTime;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Collect size, guessed MIME type, directory flag, timestamps and permissions.
///
/// `display_name` is the uploaded file's original name; the MIME type is guessed
/// from its extension, independently of content classification. Values the
/// platform cannot supply render as `"not available"`.
pub async fn file_metadata(path: &Path, display_name: &str) -> std::io::Result<FileMetadata> {
    let meta = tokio::fs::metadata(path).await?;

    let file_type = mime_guess::from_path(display_name)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    Ok(FileMetadata {
        name: display_name.to_string(),
        size_bytes: meta.len() as i64,
        file_type,
        is_directory: meta.is_dir(),
        creation_time: format_time(meta.created().ok()),
        last_modified_time: format_time(meta.modified().ok()),
        last_accessed_time: format_time(meta.accessed().ok()),
        permissions: permissions_string(&meta),
    })
}

fn format_time(time: Option<SystemTime>) -> String {
    match time {
        Some(t) => DateTime::<Local>::from(t).format(TIMESTAMP_FORMAT).to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

#[cfg(unix)]
fn permissions_string(meta: &std::fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    format!("{:o}", meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn permissions_string(meta: &std::fs::Metadata) -> String {
    if meta.permissions().readonly() {
        "readonly".to_string()
    } else {
        NOT_AVAILABLE.to_string()
    }
}
