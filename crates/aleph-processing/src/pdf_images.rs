//! Embedded PDF image export capability.
//!
//! Images the native decoder cannot read (CCITT fax, JBIG2, exotic color
//! spaces) are exported by poppler's `pdfimages`, which ships next to
//! `pdftoppm`.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::command::handle_cmd_output;
use crate::extract::ExtractionError;

/// Writes the embedded images of one PDF page as image files.
pub trait PageImageExporter: Send + Sync {
    /// Files written into `out_dir`, in the order the page draws them.
    fn export_page(
        &self,
        pdf: &Path,
        page: u32,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError>;
}

/// Exporter backed by the `pdfimages` command.
#[derive(Debug, Clone)]
pub struct PdfimagesExporter {
    binary: String,
}

impl PdfimagesExporter {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for PdfimagesExporter {
    fn default() -> Self {
        Self::new("pdfimages")
    }
}

impl PageImageExporter for PdfimagesExporter {
    fn export_page(
        &self,
        pdf: &Path,
        page: u32,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError> {
        let page_arg = page.to_string();
        let output = Command::new(&self.binary)
            .args(["-f", &page_arg, "-l", &page_arg, "-png"])
            .arg(pdf)
            .arg(out_dir.join(export_prefix(page)))
            .output();
        handle_cmd_output(output, "pdfimages")?;

        exported_files(out_dir, page)
    }
}

fn export_prefix(page: u32) -> String {
    format!("export-p{}", page)
}

/// Files `pdfimages` wrote for `page`, sorted by its running image number.
pub(crate) fn exported_files(out_dir: &Path, page: u32) -> Result<Vec<PathBuf>, ExtractionError> {
    let prefix = format!("{}-", export_prefix(page));
    let mut files: Vec<PathBuf> = std::fs::read_dir(out_dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix))
        })
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_tool_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = PdfimagesExporter::new("/nonexistent/aleph-pdfimages");
        let err = exporter
            .export_page(Path::new("/tmp/whatever.pdf"), 1, dir.path())
            .unwrap_err();
        assert!(matches!(err, ExtractionError::ToolNotFound(_)));
    }

    #[test]
    fn collects_only_the_requested_page_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "export-p1-001.png",
            "export-p1-000.png",
            "export-p10-000.png",
            "page1_img0.png",
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let names: Vec<String> = exported_files(dir.path(), 1)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["export-p1-000.png", "export-p1-001.png"]);
    }
}
