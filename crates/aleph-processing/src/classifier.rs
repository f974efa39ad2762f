//! Format classification by content sniffing
//!
//! The file's leading bytes decide the format. The file name is consulted only
//! where content is inconclusive: legacy `.doc` files (OLE containers are
//! shared by every old Office format), `.docx` files whose ZIP directory falls
//! outside the sniffed window, and `.csv` among text files.

use std::fmt;
use std::path::Path;

use tokio::io::AsyncReadExt;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_DOC: &str = "application/msword";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_CSV: &str = "text/csv";
pub const MIME_EMPTY: &str = "application/x-empty";
pub const MIME_UNKNOWN: &str = "application/octet-stream";

const MIME_ZIP: &str = "application/zip";

/// Compound File Binary header shared by all legacy Office formats.
const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Bytes read from the head of a file for sniffing.
const SNIFF_LEN: usize = 8192;

/// The closed set of formats the extractor knows how to handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Doc,
    /// Any raster image; carries the sniffed MIME type.
    Image(String),
    PlainText,
    Csv,
    /// Anything else; carries the detected MIME type.
    Unsupported(String),
}

impl DocumentFormat {
    pub fn mime_type(&self) -> &str {
        match self {
            DocumentFormat::Pdf => MIME_PDF,
            DocumentFormat::Docx => MIME_DOCX,
            DocumentFormat::Doc => MIME_DOC,
            DocumentFormat::Image(mime) => mime,
            DocumentFormat::PlainText => MIME_TEXT,
            DocumentFormat::Csv => MIME_CSV,
            DocumentFormat::Unsupported(mime) => mime,
        }
    }

    /// Page-oriented formats get per-page images after persistence.
    pub fn is_paginated(&self) -> bool {
        matches!(self, DocumentFormat::Pdf)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, DocumentFormat::Unsupported(_))
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Classify the file at `path` from its content.
pub async fn classify(path: &Path) -> std::io::Result<DocumentFormat> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    (&mut file).take(SNIFF_LEN as u64).read_to_end(&mut head).await?;
    let truncated = head.len() == SNIFF_LEN;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    Ok(classify_bytes(&head, &name, truncated))
}

/// Classify from a content prefix and a lowercase file name.
///
/// `truncated` tells whether `head` is only the beginning of a longer file, in
/// which case a multi-byte UTF-8 sequence cut at the end is not held against it.
pub fn classify_bytes(head: &[u8], name: &str, truncated: bool) -> DocumentFormat {
    if head.is_empty() {
        return DocumentFormat::Unsupported(MIME_EMPTY.to_string());
    }

    let has_ext = |ext: &str| name.ends_with(ext);

    let sniffed = infer::get(head).map(|kind| kind.mime_type());
    match sniffed {
        Some(MIME_PDF) => DocumentFormat::Pdf,
        Some(MIME_DOCX) => DocumentFormat::Docx,
        Some(MIME_ZIP) if has_ext(".docx") => DocumentFormat::Docx,
        Some(MIME_DOC) => DocumentFormat::Doc,
        _ if has_ext(".doc") && (sniffed.is_none() || head.starts_with(&OLE_MAGIC)) => {
            DocumentFormat::Doc
        }
        Some(mime) if mime.starts_with("image/") => DocumentFormat::Image(mime.to_string()),
        Some(mime) if mime.starts_with("text/") => text_format(name),
        Some(mime) => DocumentFormat::Unsupported(mime.to_string()),
        None if looks_like_text(head, truncated) => text_format(name),
        None => DocumentFormat::Unsupported(MIME_UNKNOWN.to_string()),
    }
}

fn text_format(name: &str) -> DocumentFormat {
    if name.ends_with(".csv") {
        DocumentFormat::Csv
    } else {
        DocumentFormat::PlainText
    }
}

fn looks_like_text(head: &[u8], truncated: bool) -> bool {
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        // Incomplete sequence at the very end of a cut-off prefix.
        Err(e) => truncated && e.error_len().is_none(),
    }
}
