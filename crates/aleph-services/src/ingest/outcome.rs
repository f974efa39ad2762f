use serde::Serialize;
use uuid::Uuid;

use super::IngestState;

/// Result of one file's run: the new document, or why there is none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FileOutcome {
    Ingested { document_id: Uuid },
    Failed { error: String },
}

/// Per-file report returned to the batch caller.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file_name: String,
    #[serde(flatten)]
    pub outcome: FileOutcome,
    /// Non-fatal problems, such as pages that failed to render.
    #[serde(skip)]
    pub warnings: Vec<String>,
    #[serde(skip)]
    pub states: Vec<IngestState>,
}

impl FileReport {
    pub fn document_id(&self) -> Option<Uuid> {
        match self.outcome {
            FileOutcome::Ingested { document_id } => Some(document_id),
            FileOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            FileOutcome::Ingested { .. } => None,
            FileOutcome::Failed { error } => Some(error),
        }
    }

    /// Last state reached; always `Cleaned` for a finished run.
    pub fn final_state(&self) -> Option<IngestState> {
        self.states.last().copied()
    }

    /// The state that decided the outcome, ignoring the trailing `Cleaned`.
    pub fn terminal_state(&self) -> Option<IngestState> {
        self.states
            .iter()
            .rev()
            .find(|s| **s != IngestState::Cleaned)
            .copied()
    }
}

/// Outcome of a batch: one report per file in submission order, plus the
/// warnings of every file.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub results: Vec<FileReport>,
    pub warnings: Vec<String>,
}

impl BatchOutcome {
    pub fn from_reports(results: Vec<FileReport>) -> Self {
        let warnings = results
            .iter()
            .flat_map(|r| {
                r.warnings
                    .iter()
                    .map(move |w| format!("{}: {}", r.file_name, w))
            })
            .collect();
        Self { results, warnings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_serialize_as_document_id_or_error() {
        let id = Uuid::new_v4();
        let ok = FileReport {
            file_name: "a.pdf".to_string(),
            outcome: FileOutcome::Ingested { document_id: id },
            warnings: vec!["Error rasterizing page 2: boom".to_string()],
            states: vec![],
        };
        let failed = FileReport {
            file_name: "b.bin".to_string(),
            outcome: FileOutcome::Failed {
                error: "Unsupported file type: application/octet-stream".to_string(),
            },
            warnings: vec![],
            states: vec![],
        };

        let batch = BatchOutcome::from_reports(vec![ok, failed]);
        let json = serde_json::to_value(&batch).unwrap();

        assert_eq!(json["results"][0]["document_id"], id.to_string());
        assert!(json["results"][0].get("error").is_none());
        assert_eq!(
            json["results"][1]["error"],
            "Unsupported file type: application/octet-stream"
        );
        assert_eq!(json["warnings"][0], "a.pdf: Error rasterizing page 2: boom");
    }
}
