use serde::Serialize;
use std::fmt;

/// Where one file is in the ingestion pipeline.
///
/// Happy path: `Received → LocalWritten → Extracted → Uploaded → Persisted →
/// Rasterized → Cleaned`. `Rasterized` is only reached by paginated formats
/// with at least one stored page. Every failure state moves straight to
/// `Cleaned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestState {
    Received,
    LocalWritten,
    Extracted,
    Uploaded,
    Persisted,
    Rasterized,
    Cleaned,
    ExtractionFailed,
    UploadFailed,
    PersistFailed,
    Duplicate,
}

impl IngestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestState::Received => "RECEIVED",
            IngestState::LocalWritten => "LOCAL_WRITTEN",
            IngestState::Extracted => "EXTRACTED",
            IngestState::Uploaded => "UPLOADED",
            IngestState::Persisted => "PERSISTED",
            IngestState::Rasterized => "RASTERIZED",
            IngestState::Cleaned => "CLEANED",
            IngestState::ExtractionFailed => "EXTRACTION_FAILED",
            IngestState::UploadFailed => "UPLOAD_FAILED",
            IngestState::PersistFailed => "PERSIST_FAILED",
            IngestState::Duplicate => "DUPLICATE",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            IngestState::ExtractionFailed
                | IngestState::UploadFailed
                | IngestState::PersistFailed
                | IngestState::Duplicate
        )
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: IngestState) -> bool {
        use IngestState::*;
        match (self, next) {
            (Received, LocalWritten) => true,
            (LocalWritten, Extracted | ExtractionFailed) => true,
            (Extracted, Uploaded | UploadFailed | Duplicate) => true,
            (Uploaded, Persisted | PersistFailed | Duplicate) => true,
            (Persisted, Rasterized) => true,
            (Cleaned, _) => false,
            (_, Cleaned) => true,
            _ => false,
        }
    }
}

impl fmt::Display for IngestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The states one file went through, in order.
#[derive(Debug, Clone)]
pub(crate) struct StateTrail {
    file_name: String,
    states: Vec<IngestState>,
}

impl StateTrail {
    /// A trail for a file already written to local temp storage.
    pub(crate) fn staged(file_name: &str) -> Self {
        let mut trail = Self {
            file_name: file_name.to_string(),
            states: vec![IngestState::Received],
        };
        trail.advance(IngestState::LocalWritten);
        trail
    }

    pub(crate) fn current(&self) -> IngestState {
        // Never empty: constructed with Received.
        self.states
            .last()
            .copied()
            .unwrap_or(IngestState::Received)
    }

    pub(crate) fn advance(&mut self, next: IngestState) {
        let current = self.current();
        if !current.can_transition_to(next) {
            tracing::warn!(
                file_name = %self.file_name,
                from = %current,
                to = %next,
                "Unexpected ingest state transition"
            );
        }
        tracing::debug!(file_name = %self.file_name, state = %next, "Ingest state");
        self.states.push(next);
    }

    pub(crate) fn into_states(self) -> Vec<IngestState> {
        self.states
    }
}
