//! In-memory collaborators for tests
//!
//! Available to this crate's tests and, through the `test-helpers` feature,
//! to downstream crates.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use aleph_core::models::{
    Document, DocumentMeta, NewDocument, NewPageImage, OcrText, PageImage, Project,
    NOT_AVAILABLE,
};
use aleph_core::{AppError, SearchDocument, SearchIndexer, StorageBackend};
use aleph_db::{DocumentStore, ProjectStore};
use aleph_processing::classifier::DocumentFormat;
use aleph_processing::{
    ExtractionOutcome, ExtractionResult, PageRenderer, RenderError, RenderedPage, TextExtractor,
};
use aleph_storage::keys::page_image_key;
use aleph_storage::{ObjectStorage, StorageError, StorageResult};
use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

use crate::{DeletionService, IngestService, IngestSettings, StagedUpload};

#[derive(Default)]
struct Tables {
    projects: HashMap<Uuid, Project>,
    documents: HashMap<Uuid, Document>,
    metas: HashMap<Uuid, DocumentMeta>,
    texts: HashMap<Uuid, OcrText>,
    pages: Vec<PageImage>,
}

impl Tables {
    fn remove_document(&mut self, id: Uuid) -> bool {
        self.metas.remove(&id);
        self.texts.remove(&id);
        self.pages.retain(|p| p.document_id != id);
        self.documents.remove(&id).is_some()
    }
}

/// Project and document store backed by hash maps, with the same uniqueness
/// and cascade rules as the SQL schema.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_create_document: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_project(&self, name: &str) -> Uuid {
        let project = Project {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            created_at: Utc::now(),
        };
        let id = project.id;
        self.tables.lock().unwrap().projects.insert(id, project);
        id
    }

    pub fn has_project(&self, id: Uuid) -> bool {
        self.tables.lock().unwrap().projects.contains_key(&id)
    }

    pub fn document_count(&self) -> usize {
        self.tables.lock().unwrap().documents.len()
    }

    pub fn meta_count(&self) -> usize {
        self.tables.lock().unwrap().metas.len()
    }

    pub fn text_count(&self) -> usize {
        self.tables.lock().unwrap().texts.len()
    }

    pub fn text_of(&self, document_id: Uuid) -> Option<OcrText> {
        self.tables.lock().unwrap().texts.get(&document_id).cloned()
    }

    pub fn meta_of(&self, document_id: Uuid) -> Option<DocumentMeta> {
        self.tables.lock().unwrap().metas.get(&document_id).cloned()
    }

    pub fn page_numbers(&self, document_id: Uuid) -> Vec<i32> {
        let mut numbers: Vec<i32> = self
            .tables
            .lock()
            .unwrap()
            .pages
            .iter()
            .filter(|p| p.document_id == document_id)
            .map(|p| p.page_number)
            .collect();
        numbers.sort_unstable();
        numbers
    }

    /// Make `create_document` fail with a database error.
    pub fn fail_create_document(&self, fail: bool) {
        self.fail_create_document.store(fail, Ordering::SeqCst);
    }

    /// Insert a document and its dependents directly.
    pub fn insert_document(
        &self,
        project_id: Uuid,
        storage_key: &str,
        file_name: &str,
        pages: &[String],
    ) -> Uuid {
        let new = NewDocument {
            id: Uuid::new_v4(),
            project_id,
            storage_key: storage_key.to_string(),
            file_name: file_name.to_string(),
            file_url: format!("https://documents.storage.test/{}", storage_key),
            hash_value: format!("hash-{}", storage_key),
            metadata: aleph_core::models::FileMetadata {
                name: file_name.to_string(),
                size_bytes: 0,
                file_type: "application/pdf".to_string(),
                is_directory: false,
                creation_time: NOT_AVAILABLE.to_string(),
                last_modified_time: NOT_AVAILABLE.to_string(),
                last_accessed_time: NOT_AVAILABLE.to_string(),
                permissions: NOT_AVAILABLE.to_string(),
            },
            text: String::new(),
            emails: Vec::new(),
        };
        let id = new.id;
        let mut tables = self.tables.lock().unwrap();
        insert_new_document(&mut tables, &new);
        for (idx, key) in pages.iter().enumerate() {
            tables.pages.push(PageImage {
                id: Uuid::new_v4(),
                document_id: id,
                page_number: idx as i32 + 1,
                storage_key: key.clone(),
                image_url: format!("https://documents.storage.test/{}", key),
            });
        }
        id
    }
}

fn insert_new_document(tables: &mut Tables, new: &NewDocument) -> Document {
    let document = Document {
        id: new.id,
        project_id: new.project_id,
        storage_key: new.storage_key.clone(),
        file_name: new.file_name.clone(),
        file_url: new.file_url.clone(),
        uploaded_at: Utc::now(),
    };
    let meta = &new.metadata;
    tables.metas.insert(
        new.id,
        DocumentMeta {
            id: Uuid::new_v4(),
            document_id: new.id,
            hash_value: new.hash_value.clone(),
            name: meta.name.clone(),
            size_bytes: meta.size_bytes,
            file_type: meta.file_type.clone(),
            is_directory: meta.is_directory,
            creation_time: meta.creation_time.clone(),
            last_modified_time: meta.last_modified_time.clone(),
            last_accessed_time: meta.last_accessed_time.clone(),
            permissions: meta.permissions.clone(),
        },
    );
    tables.texts.insert(
        new.id,
        OcrText {
            id: Uuid::new_v4(),
            document_id: new.id,
            text: new.text.clone(),
            emails: new.emails.clone(),
        },
    );
    tables.documents.insert(new.id, document.clone());
    document
}

#[async_trait]
impl ProjectStore for InMemoryStore {
    async fn project_exists(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.has_project(id))
    }

    async fn create_project(
        &self,
        name: String,
        description: Option<String>,
    ) -> Result<Project, AppError> {
        let project = Project {
            id: Uuid::new_v4(),
            name,
            description,
            created_at: Utc::now(),
        };
        self.tables
            .lock()
            .unwrap()
            .projects
            .insert(project.id, project.clone());
        Ok(project)
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, AppError> {
        Ok(self.tables.lock().unwrap().projects.get(&id).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>, AppError> {
        Ok(self.tables.lock().unwrap().projects.values().cloned().collect())
    }

    async fn delete_project(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.projects.remove(&id).is_none() {
            return Ok(false);
        }
        let owned: Vec<Uuid> = tables
            .documents
            .values()
            .filter(|d| d.project_id == id)
            .map(|d| d.id)
            .collect();
        for document_id in owned {
            tables.remove_document(document_id);
        }
        Ok(true)
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create_document(&self, new: &NewDocument) -> Result<Document, AppError> {
        if self.fail_create_document.load(Ordering::SeqCst) {
            return Err(AppError::Internal("pool timed out while waiting for an open connection".to_string()));
        }
        let mut tables = self.tables.lock().unwrap();
        if !tables.projects.contains_key(&new.project_id) {
            return Err(AppError::NotFound("Project not found".to_string()));
        }
        if tables.metas.values().any(|m| m.hash_value == new.hash_value) {
            return Err(AppError::Duplicate(new.hash_value.clone()));
        }
        Ok(insert_new_document(&mut tables, new))
    }

    async fn add_page_image(&self, page: &NewPageImage) -> Result<PageImage, AppError> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.documents.contains_key(&page.document_id) {
            return Err(AppError::NotFound("Document not found".to_string()));
        }
        let row = PageImage {
            id: Uuid::new_v4(),
            document_id: page.document_id,
            page_number: page.page_number,
            storage_key: page.storage_key.clone(),
            image_url: page.image_url.clone(),
        };
        tables.pages.push(row.clone());
        Ok(row)
    }

    async fn hash_exists(&self, hash_value: &str) -> Result<bool, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .metas
            .values()
            .any(|m| m.hash_value == hash_value))
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, AppError> {
        Ok(self.tables.lock().unwrap().documents.get(&id).cloned())
    }

    async fn get_meta(&self, document_id: Uuid) -> Result<Option<DocumentMeta>, AppError> {
        Ok(self.meta_of(document_id))
    }

    async fn get_text(&self, document_id: Uuid) -> Result<Option<OcrText>, AppError> {
        Ok(self.text_of(document_id))
    }

    async fn page_images(&self, document_id: Uuid) -> Result<Vec<PageImage>, AppError> {
        let mut pages: Vec<PageImage> = self
            .tables
            .lock()
            .unwrap()
            .pages
            .iter()
            .filter(|p| p.document_id == document_id)
            .cloned()
            .collect();
        pages.sort_by_key(|p| p.page_number);
        Ok(pages)
    }

    async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<Document>, AppError> {
        let mut documents: Vec<Document> = self
            .tables
            .lock()
            .unwrap()
            .documents
            .values()
            .filter(|d| d.project_id == project_id)
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(documents)
    }

    async fn project_storage_keys(&self, project_id: Uuid) -> Result<Vec<String>, AppError> {
        let tables = self.tables.lock().unwrap();
        let mut documents: Vec<&Document> = tables
            .documents
            .values()
            .filter(|d| d.project_id == project_id)
            .collect();
        documents.sort_by(|a, b| a.storage_key.cmp(&b.storage_key));

        let mut keys: Vec<String> = documents.iter().map(|d| d.storage_key.clone()).collect();
        for document in &documents {
            keys.extend(
                tables
                    .pages
                    .iter()
                    .filter(|p| p.document_id == document.id)
                    .map(|p| p.storage_key.clone()),
            );
        }
        Ok(keys)
    }

    async fn delete_document(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.tables.lock().unwrap().remove_document(id))
    }
}

/// Object storage held in memory, with injectable failures.
#[derive(Default)]
pub struct MockStorage {
    objects: Arc<Mutex<HashMap<(String, String), Vec<u8>>>>,
    fail_uploads: AtomicBool,
    failing_upload_keys: Mutex<HashSet<String>>,
    failing_delete_keys: Mutex<HashSet<String>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, key: &str, data: Vec<u8>) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), data);
    }

    pub fn remove(&self, bucket: &str, key: &str) {
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
    }

    pub fn has(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&(bucket.to_string(), key.to_string()))
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Make every upload fail.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Make uploads of keys ending with `suffix` fail.
    pub fn fail_upload_for(&self, suffix: &str) {
        self.failing_upload_keys
            .lock()
            .unwrap()
            .insert(suffix.to_string());
    }

    /// Make deletes of exactly `key` fail with a transport error.
    pub fn fail_delete_for(&self, key: &str) {
        self.failing_delete_keys
            .lock()
            .unwrap()
            .insert(key.to_string());
    }

    fn check_upload(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let failing = self.fail_uploads.load(Ordering::SeqCst)
            || self
                .failing_upload_keys
                .lock()
                .unwrap()
                .iter()
                .any(|suffix| key.ends_with(suffix.as_str()));
        if failing {
            return Err(StorageError::UploadFailed {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: "connection reset by peer".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MockStorage {
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> StorageResult<()> {
        self.check_upload(bucket, key)?;
        let data = tokio::fs::read(local_path).await?;
        self.put(bucket, key, data);
        Ok(())
    }

    async fn upload_bytes(&self, data: Vec<u8>, bucket: &str, key: &str) -> StorageResult<()> {
        self.check_upload(bucket, key)?;
        self.put(bucket, key, data);
        Ok(())
    }

    fn url(&self, bucket: &str, key: &str) -> String {
        format!("https://{}.storage.test/{}", bucket, key)
    }

    async fn download(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        self.get(bucket, key).ok_or_else(|| StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        Ok(self.has(bucket, key))
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        if self.failing_delete_keys.lock().unwrap().contains(key) {
            return Err(StorageError::DeleteFailed {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: "access denied".to_string(),
            });
        }
        let removed = self
            .objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
        match removed {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

/// Extractor that returns a fixed result for every file.
pub struct ScriptedExtractor {
    result: ExtractionResult,
}

impl ScriptedExtractor {
    pub fn text(format: DocumentFormat, text: &str) -> Self {
        Self {
            result: ExtractionResult {
                format,
                outcome: ExtractionOutcome::Text(text.to_string()),
                warnings: Vec::new(),
            },
        }
    }

    pub fn failure(format: DocumentFormat, error: &str) -> Self {
        Self {
            result: ExtractionResult {
                format,
                outcome: ExtractionOutcome::Failed(error.to_string()),
                warnings: Vec::new(),
            },
        }
    }

    pub fn with_warning(mut self, warning: &str) -> Self {
        self.result.warnings.push(warning.to_string());
        self
    }
}

#[async_trait]
impl TextExtractor for ScriptedExtractor {
    async fn extract(&self, _path: &Path) -> ExtractionResult {
        self.result.clone()
    }
}

/// Renderer reporting a fixed page count, failing on chosen pages.
#[derive(Default)]
pub struct ScriptedRenderer {
    pages: u32,
    failing_pages: HashSet<u32>,
    unreadable: bool,
}

impl ScriptedRenderer {
    pub fn pages(pages: u32) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    pub fn failing_on(mut self, page: u32) -> Self {
        self.failing_pages.insert(page);
        self
    }

    /// Fail to open the document at all.
    pub fn unreadable() -> Self {
        Self {
            unreadable: true,
            ..Default::default()
        }
    }
}

impl PageRenderer for ScriptedRenderer {
    fn page_count(&self, _path: &Path) -> Result<u32, RenderError> {
        if self.unreadable {
            return Err(RenderError::Io(std::io::Error::other("xref table damaged")));
        }
        Ok(self.pages)
    }

    fn render_page(&self, _path: &Path, page_number: u32) -> Result<RenderedPage, RenderError> {
        if page_number > self.pages {
            return Err(RenderError::PageOutOfRange {
                page: page_number,
                count: self.pages,
            });
        }
        if self.failing_pages.contains(&page_number) {
            return Err(RenderError::NoOutput(page_number));
        }
        Ok(RenderedPage {
            page_number,
            bytes: format!("jpeg page {}", page_number).into_bytes(),
        })
    }
}

/// Search indexer that records what it receives.
#[derive(Default)]
pub struct RecordingIndexer {
    indexed: Mutex<Vec<SearchDocument>>,
    removed: Mutex<Vec<Uuid>>,
}

impl RecordingIndexer {
    pub fn indexed(&self) -> Vec<SearchDocument> {
        self.indexed.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<Uuid> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchIndexer for RecordingIndexer {
    async fn index_document(&self, document: SearchDocument) -> Result<(), String> {
        self.indexed.lock().unwrap().push(document);
        Ok(())
    }

    async fn remove_document(&self, document_id: Uuid) -> Result<(), String> {
        self.removed.lock().unwrap().push(document_id);
        Ok(())
    }
}

/// Shared collaborators for service tests.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub storage: Arc<MockStorage>,
    pub indexer: Arc<RecordingIndexer>,
    pub bucket: String,
    pub temp: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            storage: Arc::new(MockStorage::new()),
            indexer: Arc::new(RecordingIndexer::default()),
            bucket: "documents".to_string(),
            temp: tempfile::tempdir().expect("temp dir"),
        }
    }

    pub fn settings(&self) -> IngestSettings {
        IngestSettings {
            bucket: self.bucket.clone(),
            temp_dir: self.temp.path().to_path_buf(),
        }
    }

    pub fn ingest_service(
        &self,
        extractor: impl TextExtractor + 'static,
        renderer: impl PageRenderer + 'static,
    ) -> IngestService {
        IngestService::new(
            self.store.clone(),
            self.store.clone(),
            self.storage.clone(),
            Arc::new(extractor),
            Arc::new(renderer),
            self.settings(),
        )
        .with_indexer(self.indexer.clone())
    }

    pub fn deletion_service(&self) -> DeletionService {
        DeletionService::new(
            self.store.clone(),
            self.store.clone(),
            self.storage.clone(),
            self.bucket.clone(),
        )
        .with_indexer(self.indexer.clone())
    }

    pub async fn stage(&self, name: &str, data: &[u8]) -> StagedUpload {
        StagedUpload::from_bytes(self.temp.path(), name, data)
            .await
            .expect("stage upload")
    }

    /// Files left in the staging directory.
    pub fn staged_file_count(&self) -> usize {
        std::fs::read_dir(self.temp.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// A persisted document with its object and `pages` page images stored.
    pub fn seed_document(&self, project_id: Uuid, key: &str, pages: u32) -> Uuid {
        self.storage.put(&self.bucket, key, b"original".to_vec());
        let page_keys: Vec<String> = (1..=pages)
            .map(|n| {
                let page_key = page_image_key(key, n);
                self.storage.put(&self.bucket, &page_key, b"jpeg".to_vec());
                page_key
            })
            .collect();
        self.store
            .insert_document(project_id, key, &format!("{}.pdf", key), &page_keys)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
