//! Helpers for invoking external command-line tools.

use crate::extract::ExtractionError;

/// Map a finished tool invocation to its stdout, or to a typed failure.
///
/// A missing binary is reported as `ToolNotFound`; a non-zero exit carries the
/// tool's stderr.
pub(crate) fn handle_cmd_output(
    result: std::io::Result<std::process::Output>,
    tool_name: &str,
) -> Result<String, ExtractionError> {
    match result {
        Ok(output) => {
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            } else {
                Err(ExtractionError::ToolFailed {
                    tool: tool_name.to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                })
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ExtractionError::ToolNotFound(tool_name.to_string()))
        }
        Err(e) => Err(ExtractionError::Io(e)),
    }
}
