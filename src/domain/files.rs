//! Attachment lifecycle against the shared bucket: naming, upload, and
//! best-effort removal by public URL.
//!
//! Removal never fails the surrounding operation. A file that could not be
//! deleted is logged and left behind.

use crate::domain::form::UploadedFile;
use crate::storage::error::BackendError;
use crate::storage::objects::ObjectStorage;
use chrono::Utc;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// `folder/<millis>_<name>`. Path separators inside the original name are
/// replaced so the object always lands directly in `folder`.
pub fn object_path(folder: &str, millis: i64, original_name: &str) -> String {
    format!("{}/{}_{}", folder.trim_matches('/'), millis, flat_name(original_name))
}

fn flat_name(original_name: &str) -> String {
    original_name.trim().replace(['/', '\\'], "_")
}

/// Path of the `index`-th file of one upload batch. Later files carry the
/// index so same-named files stamped in the same millisecond stay distinct.
pub fn batch_object_path(folder: &str, millis: i64, index: usize, original_name: &str) -> String {
    if index == 0 {
        return object_path(folder, millis, original_name);
    }
    format!(
        "{}/{}-{}_{}",
        folder.trim_matches('/'),
        millis,
        index,
        flat_name(original_name)
    )
}

/// Recovers the bucket-relative object path from a public URL: everything
/// after the first `/<bucket>/`, without query or fragment, percent-decoded.
pub fn storage_path_from_url(url: &str, bucket: &str) -> Option<String> {
    let marker = format!("/{}/", bucket);
    let start = url.find(&marker)? + marker.len();
    let rest = url[start..].split(['?', '#']).next().unwrap_or("");
    let decoded = percent_decode_str(rest).decode_utf8().ok()?;
    if decoded.is_empty() {
        None
    } else {
        Some(decoded.into_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub requested: usize,
    pub removed: usize,
}

impl DeleteReport {
    pub fn is_complete(&self) -> bool {
        self.requested == self.removed
    }
}

#[derive(Clone)]
pub struct FileLifecycle {
    storage: Arc<dyn ObjectStorage>,
}

impl FileLifecycle {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    pub fn bucket(&self) -> &str {
        self.storage.bucket()
    }

    pub fn path_of(&self, url: &str) -> Option<String> {
        storage_path_from_url(url, self.storage.bucket())
    }

    /// Uploads under `folder` and returns the public URL.
    pub async fn upload(&self, folder: &str, file: &UploadedFile) -> Result<String, BackendError> {
        self.upload_nth(folder, 0, file).await
    }

    async fn upload_nth(
        &self,
        folder: &str,
        index: usize,
        file: &UploadedFile,
    ) -> Result<String, BackendError> {
        let path = batch_object_path(folder, Utc::now().timestamp_millis(), index, &file.file_name);
        self.storage
            .upload(&path, &file.content_type, file.data.clone())
            .await?;
        info!(path = %path, bytes = file.size(), "uploaded attachment");
        Ok(self.storage.public_url(&path))
    }

    /// Uploads every file in order. On the first failure the files already
    /// uploaded by this call are removed (best effort) and the error returned.
    pub async fn upload_all(
        &self,
        folder: &str,
        files: &[UploadedFile],
    ) -> Result<Vec<String>, BackendError> {
        let mut urls = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            match self.upload_nth(folder, index, file).await {
                Ok(url) => urls.push(url),
                Err(e) => {
                    if !urls.is_empty() {
                        self.delete_many(&urls).await;
                    }
                    return Err(e);
                }
            }
        }
        Ok(urls)
    }

    /// Returns whether the removal call succeeded. Unresolvable URLs and
    /// storage errors are logged and reported as `false`.
    pub async fn delete_by_url(&self, url: &str) -> bool {
        let Some(path) = self.path_of(url) else {
            warn!(url = %url, bucket = %self.bucket(), "cannot derive storage path from url");
            return false;
        };
        match self.storage.remove(&[path.clone()]).await {
            Ok(_) => {
                debug!(path = %path, "removed attachment");
                true
            }
            Err(e) => {
                warn!(path = %path, error = %e, "failed to remove attachment");
                false
            }
        }
    }

    /// One batch removal for all resolvable URLs; if the batch call fails,
    /// each path is retried on its own.
    pub async fn delete_many(&self, urls: &[String]) -> DeleteReport {
        let mut report = DeleteReport {
            requested: urls.len(),
            removed: 0,
        };

        let mut paths = Vec::with_capacity(urls.len());
        for url in urls {
            match self.path_of(url) {
                Some(p) => paths.push(p),
                None => warn!(url = %url, "cannot derive storage path from url"),
            }
        }
        if paths.is_empty() {
            return report;
        }

        match self.storage.remove(&paths).await {
            Ok(_) => {
                report.removed = paths.len();
            }
            Err(e) => {
                warn!(count = paths.len(), error = %e, "batch removal failed, retrying per file");
                for path in &paths {
                    match self.storage.remove(std::slice::from_ref(path)).await {
                        Ok(_) => report.removed += 1,
                        Err(e) => warn!(path = %path, error = %e, "failed to remove attachment"),
                    }
                }
            }
        }

        if !report.is_complete() {
            warn!(
                requested = report.requested,
                removed = report.removed,
                "some attachments were left in storage"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryObjectStorage;
    use axum::body::Bytes;

    #[test]
    fn path_layout() {
        assert_eq!(
            object_path("latest-update", 1730000000000, "circular.pdf"),
            "latest-update/1730000000000_circular.pdf"
        );
        assert_eq!(object_path("news-media/", 5, "a/b.png"), "news-media/5_a_b.png");
        assert_eq!(batch_object_path("news-media", 5, 0, "a.png"), "news-media/5_a.png");
        assert_eq!(batch_object_path("news-media", 5, 2, "a.png"), "news-media/5-2_a.png");
    }

    #[tokio::test]
    async fn same_named_files_in_one_batch_all_upload() {
        let storage = Arc::new(MemoryObjectStorage::new("AISPPUR"));
        let files = FileLifecycle::new(storage.clone());
        let batch: Vec<UploadedFile> = (0..3)
            .map(|_| UploadedFile::new("IMG_0001.jpg", Some("image/jpeg"), Bytes::from_static(b"j")))
            .collect();
        let urls = files.upload_all("photo-gallery", &batch).await.unwrap();
        assert_eq!(urls.len(), 3);
        assert_eq!(storage.paths().await.len(), 3);
    }

    #[tokio::test]
    async fn failed_batch_upload_removes_earlier_files() {
        let storage = Arc::new(MemoryObjectStorage::new("AISPPUR"));
        let files = FileLifecycle::new(storage.clone());
        storage.fail_uploads_after(1).await;
        let batch = vec![
            UploadedFile::new("a.png", Some("image/png"), Bytes::from_static(b"a")),
            UploadedFile::new("b.png", Some("image/png"), Bytes::from_static(b"b")),
        ];
        assert!(files.upload_all("photo-gallery", &batch).await.is_err());
        assert!(storage.paths().await.is_empty());
        assert_eq!(storage.remove_calls().await.len(), 1);
    }

    #[test]
    fn path_from_public_url() {
        let url = "https://x.supabase.co/storage/v1/object/public/AISPPUR/latest-update/17_my%20file.pdf";
        assert_eq!(
            storage_path_from_url(url, "AISPPUR").as_deref(),
            Some("latest-update/17_my file.pdf")
        );
        assert_eq!(
            storage_path_from_url("https://cdn/AISPPUR/a/b.png?token=1", "AISPPUR").as_deref(),
            Some("a/b.png")
        );
        assert_eq!(storage_path_from_url("https://cdn/other/a.png", "AISPPUR"), None);
        assert_eq!(storage_path_from_url("https://cdn/AISPPUR/", "AISPPUR"), None);
    }

    #[tokio::test]
    async fn batch_failure_falls_back_to_single_removals() {
        let storage = Arc::new(MemoryObjectStorage::new("AISPPUR"));
        let files = FileLifecycle::new(storage.clone());
        let a = files
            .upload("photo-gallery", &UploadedFile::new("a.png", None, Bytes::from_static(b"a")))
            .await
            .unwrap();
        let b = files
            .upload("photo-gallery", &UploadedFile::new("b.png", None, Bytes::from_static(b"b")))
            .await
            .unwrap();

        storage.fail_batch_removals(true).await;
        let report = files
            .delete_many(&[a, b, "https://elsewhere/x.png".to_string()])
            .await;
        assert_eq!(report, DeleteReport { requested: 3, removed: 2 });
        assert!(storage.paths().await.is_empty());
        assert_eq!(storage.remove_calls().await.len(), 3);
    }

    #[tokio::test]
    async fn delete_by_url_never_errors() {
        let storage = Arc::new(MemoryObjectStorage::new("AISPPUR"));
        let files = FileLifecycle::new(storage.clone());
        assert!(!files.delete_by_url("not a url").await);

        storage.fail_removals(true).await;
        let url = storage.public_url("faculty-staff/1_a.pdf");
        assert!(!files.delete_by_url(&url).await);
    }
}
