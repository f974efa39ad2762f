use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

/// Fallback when the client sends no usable file name.
const UNNAMED_UPLOAD: &str = "upload";

/// An uploaded file written to local temp storage.
///
/// Each upload gets its own temp directory, so concurrent uploads of the same
/// file name never collide. The file keeps its original name inside that
/// directory. Dropping the value removes the directory.
#[derive(Debug)]
pub struct StagedUpload {
    original_name: String,
    path: PathBuf,
    dir: Option<TempDir>,
}

impl StagedUpload {
    /// Create an empty staged file and return it with a handle for streaming
    /// the body into it.
    pub async fn create(root: &Path, original_name: &str) -> io::Result<(Self, tokio::fs::File)> {
        tokio::fs::create_dir_all(root).await?;
        let dir = tempfile::Builder::new().prefix("aleph-upload-").tempdir_in(root)?;
        let original_name = sanitize_file_name(original_name);
        let path = dir.path().join(&original_name);
        let file = tokio::fs::File::create(&path).await?;

        Ok((
            Self {
                original_name,
                path,
                dir: Some(dir),
            },
            file,
        ))
    }

    /// Stage an in-memory body.
    pub async fn from_bytes(root: &Path, original_name: &str, data: &[u8]) -> io::Result<Self> {
        let (staged, mut file) = Self::create(root, original_name).await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(staged)
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the staged file and its directory. Safe to call more than once.
    pub fn cleanup(&mut self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        if let Some(dir) = self.dir.take() {
            dir.close()?;
        }
        Ok(())
    }
}

/// Keep only the final path component of a client-supplied name.
fn sanitize_file_name(name: &str) -> String {
    let normalized = name.replace('\\', "/");
    match Path::new(&normalized).file_name().and_then(|n| n.to_str()) {
        Some(base) if !base.trim().is_empty() => base.to_string(),
        _ => UNNAMED_UPLOAD.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_name_uploads_do_not_collide() {
        let root = tempfile::tempdir().unwrap();
        let a = StagedUpload::from_bytes(root.path(), "report.pdf", b"one").await.unwrap();
        let b = StagedUpload::from_bytes(root.path(), "report.pdf", b"two").await.unwrap();

        assert_ne!(a.path(), b.path());
        assert_eq!(a.path().file_name().unwrap(), "report.pdf");
        assert_eq!(std::fs::read(a.path()).unwrap(), b"one");
        assert_eq!(std::fs::read(b.path()).unwrap(), b"two");
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let mut staged = StagedUpload::from_bytes(root.path(), "a.txt", b"x").await.unwrap();
        let path = staged.path().to_path_buf();

        staged.cleanup().unwrap();
        assert!(!path.exists());
        staged.cleanup().unwrap();
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn drop_removes_the_staged_file() {
        let root = tempfile::tempdir().unwrap();
        let staged = StagedUpload::from_bytes(root.path(), "a.txt", b"x").await.unwrap();
        let path = staged.path().to_path_buf();
        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn client_paths_are_stripped() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\cv.docx"), "cv.docx");
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(sanitize_file_name(".."), "upload");
    }
}
