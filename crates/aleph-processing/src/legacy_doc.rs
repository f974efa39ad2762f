//! Legacy binary `.doc` conversion capability.

use std::path::Path;
use std::process::Command;

use crate::command::handle_cmd_output;
use crate::extract::ExtractionError;

/// Converts a legacy Word document into plain text.
pub trait LegacyDocConverter: Send + Sync {
    /// Fails with the tool's stderr when the conversion exits non-zero.
    fn convert(&self, path: &Path) -> Result<String, ExtractionError>;
}

/// Converter backed by the `antiword` command.
#[derive(Debug, Clone)]
pub struct AntiwordConverter {
    binary: String,
}

impl AntiwordConverter {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for AntiwordConverter {
    fn default() -> Self {
        Self::new("antiword")
    }
}

impl LegacyDocConverter for AntiwordConverter {
    fn convert(&self, path: &Path) -> Result<String, ExtractionError> {
        let output = Command::new(&self.binary).arg(path).output();
        handle_cmd_output(output, "antiword")
    }
}
