//! Per-page rasterization of persisted paginated documents.

use std::path::Path;
use std::sync::Arc;

use aleph_core::models::NewPageImage;
use aleph_processing::{PageRenderer, RenderError, RenderedPage};
use aleph_storage::keys::page_image_key;
use uuid::Uuid;

use super::IngestService;

impl IngestService {
    /// Render, upload and record every page, one at a time. Returns the number
    /// of pages recorded.
    ///
    /// Never fails: problems are pushed onto `warnings`. A failed page is
    /// skipped; pages already recorded and the document itself stay in place.
    pub(crate) async fn rasterize(
        &self,
        path: &Path,
        unique_key: &str,
        document_id: Uuid,
        warnings: &mut Vec<String>,
    ) -> u32 {
        let start = std::time::Instant::now();
        let page_count = match self.page_count(path).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(document_id = %document_id, error = %e, "Could not open document for rasterization");
                warnings.push(format!("Error rasterizing document: {}", e));
                return 0;
            }
        };

        let mut rendered = 0u32;
        for page_number in 1..=page_count {
            match self
                .rasterize_page(path, unique_key, document_id, page_number)
                .await
            {
                Ok(()) => rendered += 1,
                Err(reason) => {
                    tracing::warn!(
                        document_id = %document_id,
                        page = page_number,
                        error = %reason,
                        "Page rasterization failed"
                    );
                    warnings.push(format!("Error rasterizing page {}: {}", page_number, reason));
                }
            }
        }

        tracing::info!(
            document_id = %document_id,
            pages = page_count,
            rendered,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Rasterization finished"
        );

        rendered
    }

    async fn rasterize_page(
        &self,
        path: &Path,
        unique_key: &str,
        document_id: Uuid,
        page_number: u32,
    ) -> Result<(), String> {
        let page = self
            .render_page(path, page_number)
            .await
            .map_err(|e| e.to_string())?;

        let key = page_image_key(unique_key, page.page_number);
        let bucket = &self.settings.bucket;
        self.storage
            .upload_bytes(page.bytes, bucket, &key)
            .await
            .map_err(|e| e.to_string())?;

        let image_url = self.storage.url(bucket, &key);
        self.documents
            .add_page_image(&NewPageImage {
                document_id,
                page_number: page_number as i32,
                storage_key: key,
                image_url,
            })
            .await
            .map_err(|e| e.to_string())?;

        Ok(())
    }

    async fn page_count(&self, path: &Path) -> Result<u32, RenderError> {
        let renderer: Arc<dyn PageRenderer> = Arc::clone(&self.renderer);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || renderer.page_count(&path))
            .await
            .map_err(|e| RenderError::Io(std::io::Error::other(e.to_string())))?
    }

    async fn render_page(&self, path: &Path, page_number: u32) -> Result<RenderedPage, RenderError> {
        let renderer: Arc<dyn PageRenderer> = Arc::clone(&self.renderer);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || renderer.render_page(&path, page_number))
            .await
            .map_err(|e| RenderError::Io(std::io::Error::other(e.to_string())))?
    }
}
