//! Per-page rendering of paginated documents.
//!
//! Pages are rendered one at a time so a large PDF never holds more than one
//! page image in memory.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use crate::command::handle_cmd_output;
use crate::extract::{pdf, ExtractionError};

/// Resolution used for page images.
pub const RASTER_DPI: u32 = 144;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: u32, count: u32 },

    #[error("Renderer produced no output for page {0}")]
    NoOutput(u32),

    #[error(transparent)]
    Tool(#[from] ExtractionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One rendered page, JPEG encoded. Page numbers start at 1.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub page_number: u32,
    pub bytes: Vec<u8>,
}

/// Renders individual pages of a document to JPEG.
///
/// Implementations are synchronous; callers run them on a blocking thread.
pub trait PageRenderer: Send + Sync {
    fn page_count(&self, path: &Path) -> Result<u32, RenderError>;

    fn render_page(&self, path: &Path, page_number: u32) -> Result<RenderedPage, RenderError>;
}

/// Poppler `pdftoppm` backend.
#[derive(Debug, Clone)]
pub struct PdftoppmRenderer {
    binary: String,
    dpi: u32,
}

impl PdftoppmRenderer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            dpi: RASTER_DPI,
        }
    }

    fn output_prefix(dir: &Path) -> PathBuf {
        dir.join("page")
    }
}

impl Default for PdftoppmRenderer {
    fn default() -> Self {
        Self::new("pdftoppm")
    }
}

impl PageRenderer for PdftoppmRenderer {
    fn page_count(&self, path: &Path) -> Result<u32, RenderError> {
        Ok(pdf::page_count(path)?)
    }

    fn render_page(&self, path: &Path, page_number: u32) -> Result<RenderedPage, RenderError> {
        let start = std::time::Instant::now();
        let scratch = tempfile::tempdir()?;
        let prefix = Self::output_prefix(scratch.path());
        let page = page_number.to_string();

        let output = Command::new(&self.binary)
            .arg("-jpeg")
            .args(["-r", &self.dpi.to_string()])
            .args(["-f", &page, "-l", &page])
            .arg("-singlefile")
            .arg(path)
            .arg(&prefix)
            .output();
        handle_cmd_output(output, "pdftoppm")?;

        let rendered = prefix.with_extension("jpg");
        let bytes = match std::fs::read(&rendered) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RenderError::NoOutput(page_number))
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            page = page_number,
            bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Rendered PDF page"
        );

        Ok(RenderedPage { page_number, bytes })
    }
}
