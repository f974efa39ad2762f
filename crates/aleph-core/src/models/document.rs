use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel rendered for metadata values the filesystem could not supply.
pub const NOT_AVAILABLE: &str = "not available";

/// One uploaded file within a project.
///
/// `storage_key` identifies the stored object; `file_url` is derived from
/// bucket and key at upload time and is never changed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Document {
    pub id: Uuid,
    pub project_id: Uuid,
    pub storage_key: String,
    pub file_name: String,
    pub file_url: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DocumentMeta {
    pub id: Uuid,
    pub document_id: Uuid,
    pub hash_value: String,
    pub name: String,
    pub size_bytes: i64,
    pub file_type: String,
    pub is_directory: bool,
    pub creation_time: String,
    pub last_modified_time: String,
    pub last_accessed_time: String,
    pub permissions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OcrText {
    pub id: Uuid,
    pub document_id: Uuid,
    pub text: String,
    /// Scan order, duplicates kept.
    pub emails: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PageImage {
    pub id: Uuid,
    pub document_id: Uuid,
    /// 1-based.
    pub page_number: i32,
    pub storage_key: String,
    pub image_url: String,
}

/// Filesystem facts about an uploaded file, captured before upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    pub size_bytes: i64,
    pub file_type: String,
    pub is_directory: bool,
    pub creation_time: String,
    pub last_modified_time: String,
    pub last_accessed_time: String,
    pub permissions: String,
}

/// Everything needed to create a document and its 1:1 records in one unit.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: Uuid,
    pub project_id: Uuid,
    pub storage_key: String,
    pub file_name: String,
    pub file_url: String,
    pub hash_value: String,
    pub metadata: FileMetadata,
    pub text: String,
    pub emails: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewPageImage {
    pub document_id: Uuid,
    pub page_number: i32,
    pub storage_key: String,
    pub image_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub file_name: String,
    pub file_url: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<DocumentMetaResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentMetaResponse {
    pub hash_value: String,
    pub size_bytes: i64,
    pub file_type: String,
    pub last_modified_time: String,
    pub permissions: String,
}

impl From<DocumentMeta> for DocumentMetaResponse {
    fn from(meta: DocumentMeta) -> Self {
        DocumentMetaResponse {
            hash_value: meta.hash_value,
            size_bytes: meta.size_bytes,
            file_type: meta.file_type,
            last_modified_time: meta.last_modified_time,
            permissions: meta.permissions,
        }
    }
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        DocumentResponse {
            id: doc.id,
            project_id: doc.project_id,
            file_name: doc.file_name,
            file_url: doc.file_url,
            uploaded_at: doc.uploaded_at,
            meta: None,
        }
    }
}

impl DocumentResponse {
    pub fn with_meta(mut self, meta: Option<DocumentMeta>) -> Self {
        self.meta = meta.map(DocumentMetaResponse::from);
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PageImageResponse {
    pub page_number: i32,
    pub image_url: String,
}

impl From<PageImage> for PageImageResponse {
    fn from(page: PageImage) -> Self {
        PageImageResponse {
            page_number: page.page_number,
            image_url: page.image_url,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentTextResponse {
    pub document_id: Uuid,
    pub text: String,
    pub emails: Vec<String>,
}

impl From<OcrText> for DocumentTextResponse {
    fn from(ocr: OcrText) -> Self {
        DocumentTextResponse {
            document_id: ocr.document_id,
            text: ocr.text,
            emails: ocr.emails,
        }
    }
}
