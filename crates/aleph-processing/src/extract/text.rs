use std::path::Path;

use super::ExtractionError;

/// Whole-file UTF-8 read.
pub(super) fn read_text(path: &Path) -> Result<String, ExtractionError> {
    Ok(std::fs::read_to_string(path)?)
}
