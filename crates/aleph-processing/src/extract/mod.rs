//! Per-format text extraction
//!
//! [`FileExtractor`] classifies a file and dispatches to one handler per
//! [`DocumentFormat`] variant. Expected failures (unsupported type, tool
//! failure, corrupt file) come back inside [`ExtractionResult`] rather than as
//! errors, so callers branch on data.

#[cfg(feature = "docx")]
mod docx;
pub(crate) mod pdf;
mod tabular;
mod text;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aleph_core::config::ToolPaths;
use async_trait::async_trait;
use thiserror::Error;

use crate::classifier::{classify, DocumentFormat, MIME_UNKNOWN};
use crate::legacy_doc::{AntiwordConverter, LegacyDocConverter};
use crate::ocr::{OcrEngine, TesseractOcr};
use crate::pdf_images::{PageImageExporter, PdfimagesExporter};

/// Errors that can occur during text extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("{tool} failed: {stderr}")]
    ToolFailed { tool: String, stderr: String },

    #[error("Failed to extract text from {format}: {reason}")]
    Parse { format: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractionError {
    pub(crate) fn parse(format: &'static str, reason: impl ToString) -> Self {
        ExtractionError::Parse {
            format,
            reason: reason.to_string(),
        }
    }
}

/// Either the extracted text or the reason there is none. Never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Text(String),
    Failed(String),
}

/// Result of text extraction for one file.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// Format the classifier picked.
    pub format: DocumentFormat,
    pub outcome: ExtractionOutcome,
    /// Non-fatal problems, such as embedded images that could not be read.
    pub warnings: Vec<String>,
}

impl ExtractionResult {
    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            ExtractionOutcome::Text(text) => Some(text),
            ExtractionOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ExtractionOutcome::Text(_) => None,
            ExtractionOutcome::Failed(error) => Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, ExtractionOutcome::Text(_))
    }

    fn failed(format: DocumentFormat, error: &ExtractionError) -> Self {
        let message = match error {
            ExtractionError::UnsupportedFileType(_) => error.to_string(),
            other => format!("Error extracting text from file: {}", other),
        };
        ExtractionResult {
            format,
            outcome: ExtractionOutcome::Failed(message),
            warnings: Vec::new(),
        }
    }
}

/// Extracts text from a local file.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Never fails: problems are reported through the returned result.
    async fn extract(&self, path: &Path) -> ExtractionResult;
}

/// The default extractor: content classification plus per-format handlers.
#[derive(Clone)]
pub struct FileExtractor {
    ocr: Arc<dyn OcrEngine>,
    doc_converter: Arc<dyn LegacyDocConverter>,
    image_exporter: Arc<dyn PageImageExporter>,
}

impl FileExtractor {
    pub fn new(
        ocr: Arc<dyn OcrEngine>,
        doc_converter: Arc<dyn LegacyDocConverter>,
        image_exporter: Arc<dyn PageImageExporter>,
    ) -> Self {
        Self {
            ocr,
            doc_converter,
            image_exporter,
        }
    }

    /// Extractor wired to the configured command-line tools.
    pub fn from_tools(tools: &ToolPaths) -> Self {
        Self::new(
            Arc::new(TesseractOcr::new(&tools.tesseract_path, &tools.tesseract_lang)),
            Arc::new(AntiwordConverter::new(&tools.antiword_path)),
            Arc::new(PdfimagesExporter::new(&tools.pdfimages_path)),
        )
    }

    fn extract_blocking(
        format: &DocumentFormat,
        path: &Path,
        ocr: &dyn OcrEngine,
        doc_converter: &dyn LegacyDocConverter,
        image_exporter: &dyn PageImageExporter,
        warnings: &mut Vec<String>,
    ) -> Result<String, ExtractionError> {
        match format {
            DocumentFormat::Pdf => pdf::extract_pdf(path, ocr, image_exporter, warnings),
            #[cfg(feature = "docx")]
            DocumentFormat::Docx => docx::extract_docx(path),
            #[cfg(not(feature = "docx"))]
            DocumentFormat::Docx => Err(ExtractionError::UnsupportedFileType(
                format.mime_type().to_string(),
            )),
            DocumentFormat::Doc => doc_converter.convert(path),
            DocumentFormat::Image(_) => ocr.ocr_image(path),
            DocumentFormat::PlainText => text::read_text(path),
            DocumentFormat::Csv => tabular::extract_csv(path),
            DocumentFormat::Unsupported(mime) => {
                Err(ExtractionError::UnsupportedFileType(mime.clone()))
            }
        }
    }
}

impl Default for FileExtractor {
    fn default() -> Self {
        Self::from_tools(&ToolPaths::default())
    }
}

#[async_trait]
impl TextExtractor for FileExtractor {
    async fn extract(&self, path: &Path) -> ExtractionResult {
        let start = std::time::Instant::now();

        let format = match classify(path).await {
            Ok(format) => format,
            Err(e) => {
                return ExtractionResult::failed(
                    DocumentFormat::Unsupported(MIME_UNKNOWN.to_string()),
                    &ExtractionError::Io(e),
                )
            }
        };

        if let DocumentFormat::Unsupported(mime) = &format {
            tracing::info!(path = %path.display(), mime = %mime, "Unsupported file type");
            let error = ExtractionError::UnsupportedFileType(mime.clone());
            return ExtractionResult::failed(format, &error);
        }

        let task_format = format.clone();
        let task_path: PathBuf = path.to_path_buf();
        let ocr = Arc::clone(&self.ocr);
        let doc_converter = Arc::clone(&self.doc_converter);
        let image_exporter = Arc::clone(&self.image_exporter);

        let joined = tokio::task::spawn_blocking(move || {
            let mut warnings = Vec::new();
            let text = Self::extract_blocking(
                &task_format,
                &task_path,
                ocr.as_ref(),
                doc_converter.as_ref(),
                image_exporter.as_ref(),
                &mut warnings,
            );
            text.map(|text| (text, warnings))
        })
        .await;

        let result = match joined {
            Ok(Ok((text, warnings))) => ExtractionResult {
                format,
                outcome: ExtractionOutcome::Text(text),
                warnings,
            },
            Ok(Err(e)) => ExtractionResult::failed(format, &e),
            Err(join_err) => ExtractionResult::failed(
                format,
                &ExtractionError::Io(std::io::Error::other(join_err.to_string())),
            ),
        };

        match result.error() {
            None => tracing::debug!(
                path = %path.display(),
                format = %result.format,
                chars = result.text().map(str::len).unwrap_or(0),
                warnings = result.warnings.len(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Text extraction finished"
            ),
            Some(error) => tracing::warn!(
                path = %path.display(),
                format = %result.format,
                error = %error,
                "Text extraction failed"
            ),
        }

        result
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// OCR engine returning canned text and recording what it was asked to read.
    #[derive(Default)]
    pub struct ScriptedOcr {
        pub text: String,
        pub fail: bool,
        pub seen: Mutex<Vec<PathBuf>>,
    }

    impl OcrEngine for ScriptedOcr {
        fn ocr_image(&self, image_path: &Path) -> Result<String, ExtractionError> {
            self.seen.lock().unwrap().push(image_path.to_path_buf());
            if self.fail {
                return Err(ExtractionError::ToolNotFound("tesseract".to_string()));
            }
            Ok(self.text.clone())
        }
    }

    /// Image exporter that writes `files` placeholder images per page, or fails.
    #[derive(Default)]
    pub struct ScriptedExporter {
        pub files: usize,
        pub fail: bool,
        pub pages: Mutex<Vec<u32>>,
    }

    impl ScriptedExporter {
        pub fn writing(files: usize) -> Self {
            Self {
                files,
                ..Default::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }
    }

    impl PageImageExporter for ScriptedExporter {
        fn export_page(
            &self,
            _pdf: &Path,
            page: u32,
            out_dir: &Path,
        ) -> Result<Vec<PathBuf>, ExtractionError> {
            self.pages.lock().unwrap().push(page);
            if self.fail {
                return Err(ExtractionError::ToolNotFound("pdfimages".to_string()));
            }
            (0..self.files)
                .map(|i| -> Result<PathBuf, ExtractionError> {
                    let path = out_dir.join(format!("export-p{}-{:03}.png", page, i));
                    std::fs::write(&path, b"png")?;
                    Ok(path)
                })
                .collect()
        }
    }

    /// Converter that panics, standing in for a parser crashing on bad input.
    pub struct PanickingConverter;

    impl LegacyDocConverter for PanickingConverter {
        fn convert(&self, _path: &Path) -> Result<String, ExtractionError> {
            panic!("malformed document tree");
        }
    }

    pub struct FailingConverter;

    impl LegacyDocConverter for FailingConverter {
        fn convert(&self, _path: &Path) -> Result<String, ExtractionError> {
            Err(ExtractionError::ToolFailed {
                tool: "antiword".to_string(),
                stderr: "I can't find the name of your HOME directory".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{FailingConverter, PanickingConverter, ScriptedExporter, ScriptedOcr};
    use super::*;

    fn extractor(ocr_text: &str) -> FileExtractor {
        FileExtractor::new(
            Arc::new(ScriptedOcr {
                text: ocr_text.to_string(),
                ..Default::default()
            }),
            Arc::new(FailingConverter),
            Arc::new(ScriptedExporter::default()),
        )
    }

    async fn write(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    #[tokio::test]
    async fn plain_text_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "notes.txt", b"hello a@b.com\n").await;

        let result = extractor("").extract(&path).await;
        assert_eq!(result.format, DocumentFormat::PlainText);
        assert_eq!(result.text(), Some("hello a@b.com\n"));
        assert!(result.error().is_none());
    }

    #[tokio::test]
    async fn csv_rows_are_reserialized() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "rows.csv", b"a,b\nc,d\n").await;

        let result = extractor("").extract(&path).await;
        assert_eq!(result.format, DocumentFormat::Csv);
        assert_eq!(result.text(), Some("a,b\nc,d"));
    }

    #[tokio::test]
    async fn images_go_through_ocr() {
        let dir = tempfile::tempdir().unwrap();
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
        let path = write(dir.path(), "scan.png", &png).await;

        let result = extractor("INVOICE 42").extract(&path).await;
        assert_eq!(result.format, DocumentFormat::Image("image/png".to_string()));
        assert_eq!(result.text(), Some("INVOICE 42"));
    }

    #[tokio::test]
    async fn zero_byte_file_reports_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "empty.pdf", b"").await;

        let result = extractor("").extract(&path).await;
        assert!(result.text().is_none());
        assert_eq!(
            result.error(),
            Some("Unsupported file type: application/x-empty")
        );
    }

    #[tokio::test]
    async fn truncated_pdf_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "cut.pdf", b"%PDF-1.7\n1 0 obj\n<< /Type /Cat").await;

        let result = extractor("").extract(&path).await;
        assert_eq!(result.format, DocumentFormat::Pdf);
        assert!(result.text().is_none());
        assert!(result
            .error()
            .unwrap()
            .starts_with("Error extracting text from file:"));
    }

    #[tokio::test]
    async fn legacy_doc_failure_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "memo.doc", b"not really a word file").await;

        let result = extractor("").extract(&path).await;
        assert_eq!(result.format, DocumentFormat::Doc);
        let error = result.error().unwrap();
        assert!(error.contains("antiword failed"));
        assert!(error.contains("HOME directory"));
    }

    #[tokio::test]
    async fn handler_panic_becomes_a_failed_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "memo.doc", b"not really a word file").await;
        let extractor = FileExtractor::new(
            Arc::new(ScriptedOcr::default()),
            Arc::new(PanickingConverter),
            Arc::new(ScriptedExporter::default()),
        );

        let result = extractor.extract(&path).await;
        assert_eq!(result.format, DocumentFormat::Doc);
        assert!(result.text().is_none());
        assert!(result
            .error()
            .unwrap()
            .starts_with("Error extracting text from file:"));
    }

    #[tokio::test]
    async fn missing_file_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let result = extractor("").extract(&dir.path().join("gone.txt")).await;
        assert!(!result.is_ok());
        assert!(result.error().unwrap().contains("IO error"));
    }
}
