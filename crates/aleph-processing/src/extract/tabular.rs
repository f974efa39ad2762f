use std::path::Path;

use super::ExtractionError;

const FORMAT: &str = "CSV";

/// Rows re-serialized with `,` between fields and `\n` between rows. Quoting
/// is dropped; ragged rows are kept as they are.
pub(super) fn extract_csv(path: &Path) -> Result<String, ExtractionError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| ExtractionError::parse(FORMAT, e))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ExtractionError::parse(FORMAT, e))?;
        rows.push(record.iter().collect::<Vec<_>>().join(","));
    }
    Ok(rows.join("\n"))
}
