//! OCR engine capability.
//!
//! Uses Tesseract via command-line for text recognition over image files.

use std::path::Path;
use std::process::Command;

use crate::command::handle_cmd_output;
use crate::extract::ExtractionError;

/// Recognizes text in an image file.
///
/// Implementations are synchronous; callers run them on a blocking thread.
pub trait OcrEngine: Send + Sync {
    fn ocr_image(&self, image_path: &Path) -> Result<String, ExtractionError>;
}

/// Tesseract OCR backend.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

impl OcrEngine for TesseractOcr {
    fn ocr_image(&self, image_path: &Path) -> Result<String, ExtractionError> {
        let start = std::time::Instant::now();
        let output = Command::new(&self.binary)
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.language])
            .output();

        let text = handle_cmd_output(output, "tesseract")?;

        tracing::debug!(
            image = %image_path.display(),
            chars = text.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Tesseract OCR finished"
        );

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_tool_not_found() {
        let ocr = TesseractOcr::new("/nonexistent/aleph-tesseract", "eng");
        let err = ocr.ocr_image(Path::new("/tmp/whatever.png")).unwrap_err();
        assert!(matches!(err, ExtractionError::ToolNotFound(_)));
    }
}
