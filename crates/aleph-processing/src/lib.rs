//! Aleph Processing Library
//!
//! Everything that turns an uploaded file into text and page images:
//!
//! - [`classifier`]: content sniffing into a closed set of document formats
//! - [`extract`]: per-format text extraction that reports failures as data
//! - [`email`]: email harvesting over extracted text
//! - [`checksum`] / [`metadata`]: identity hash and filesystem facts
//! - [`raster`]: per-page rendering of paginated documents
//!
//! External tools (tesseract, antiword, pdftoppm, pdfimages) sit behind the
//! [`ocr::OcrEngine`], [`legacy_doc::LegacyDocConverter`], [`raster::PageRenderer`]
//! and [`pdf_images::PageImageExporter`] traits.

pub mod checksum;
pub mod classifier;
mod command;
pub mod email;
pub mod extract;
pub mod legacy_doc;
pub mod metadata;
pub mod ocr;
pub mod pdf_images;
pub mod raster;

pub use checksum::{file_checksum, unique_key};
pub use classifier::{classify, DocumentFormat};
pub use email::extract_emails;
pub use extract::{
    ExtractionError, ExtractionOutcome, ExtractionResult, FileExtractor, TextExtractor,
};
pub use legacy_doc::{AntiwordConverter, LegacyDocConverter};
pub use metadata::file_metadata;
pub use ocr::{OcrEngine, TesseractOcr};
pub use pdf_images::{PageImageExporter, PdfimagesExporter};
pub use raster::{PageRenderer, PdftoppmRenderer, RenderError, RenderedPage, RASTER_DPI};
