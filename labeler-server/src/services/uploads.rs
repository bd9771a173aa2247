//! ZIP archive uploads
//!
//! Archives land under `<upload_root>/batches/` or
//! `<upload_root>/non_labeled/`. The client-supplied file name is reduced to
//! its final component and restricted to a safe character set before use.
//! Data is streamed into a `.part` file that is renamed into place once
//! complete; a same-named archive is replaced.

use labeler_common::Result;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Request body limit for upload routes
pub const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

const MAX_FILE_NAME_LEN: usize = 200;

/// Destination of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Archive of predefined batches
    Batch,
    /// Archive of images still to be labeled
    NonLabeled,
}

impl UploadKind {
    fn dir_name(self) -> &'static str {
        match self {
            UploadKind::Batch => "batches",
            UploadKind::NonLabeled => "non_labeled",
        }
    }
}

/// Reduce a client file name to a safe `.zip` name, or `None` if nothing
/// usable remains
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();

    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    let is_zip = Path::new(cleaned)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    let stem_empty = cleaned.len() <= ".zip".len();

    if !is_zip || stem_empty || cleaned.len() > MAX_FILE_NAME_LEN {
        return None;
    }
    Some(cleaned.to_string())
}

/// Upload destination root
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, kind: UploadKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Open a pending upload for an already sanitized file name
    pub async fn begin(&self, kind: UploadKind, file_name: &str) -> Result<PendingUpload> {
        let dir = self.dir(kind);
        fs::create_dir_all(&dir).await?;

        let final_path = dir.join(file_name);
        let part_path = dir.join(format!("{}.part", file_name));
        let file = File::create(&part_path).await?;

        Ok(PendingUpload {
            file,
            part_path,
            final_path,
            written: 0,
        })
    }
}

/// An upload being written
#[derive(Debug)]
pub struct PendingUpload {
    file: File,
    part_path: PathBuf,
    final_path: PathBuf,
    written: u64,
}

impl PendingUpload {
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush and move the archive into place, returning its size
    pub async fn finish(mut self) -> Result<u64> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        drop(self.file);

        fs::rename(&self.part_path, &self.final_path).await?;
        info!(
            "Stored upload {} ({} bytes)",
            self.final_path.display(),
            self.written
        );
        Ok(self.written)
    }

    /// Discard the partial file
    pub async fn abort(self) {
        drop(self.file);
        if let Err(e) = fs::remove_file(&self.part_path).await {
            warn!(
                "Failed to remove partial upload {}: {}",
                self.part_path.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("batch1.zip").as_deref(), Some("batch1.zip"));
        assert_eq!(sanitize_file_name("Batch 1.ZIP").as_deref(), Some("Batch_1.ZIP"));
        assert_eq!(sanitize_file_name("../../etc/evil.zip").as_deref(), Some("evil.zip"));
        assert_eq!(sanitize_file_name("C:\\tmp\\x.zip").as_deref(), Some("x.zip"));
        assert_eq!(sanitize_file_name("..hidden.zip").as_deref(), Some("hidden.zip"));
        assert_eq!(sanitize_file_name("notes.txt"), None);
        assert_eq!(sanitize_file_name(".zip"), None);
        assert_eq!(sanitize_file_name("dir/"), None);
        assert_eq!(sanitize_file_name(""), None);
    }

    #[tokio::test]
    async fn test_finish_moves_file_into_kind_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        let mut upload = store.begin(UploadKind::Batch, "a.zip").await.unwrap();
        upload.write(b"PK\x03\x04").await.unwrap();
        upload.write(b"rest").await.unwrap();
        let bytes = upload.finish().await.unwrap();

        assert_eq!(bytes, 8);
        let stored = std::fs::read(dir.path().join("batches/a.zip")).unwrap();
        assert_eq!(stored, b"PK\x03\x04rest");
        assert!(!dir.path().join("batches/a.zip.part").exists());
    }

    #[tokio::test]
    async fn test_unwritable_root_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("not_a_dir");
        std::fs::write(&root, b"file").unwrap();

        let err = UploadStore::new(&root)
            .begin(UploadKind::Batch, "a.zip")
            .await
            .unwrap_err();
        assert!(matches!(err, labeler_common::Error::Io(_)));
    }

    #[tokio::test]
    async fn test_abort_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        let mut upload = store.begin(UploadKind::NonLabeled, "b.zip").await.unwrap();
        upload.write(b"partial").await.unwrap();
        upload.abort().await;

        assert!(!dir.path().join("non_labeled/b.zip.part").exists());
        assert!(!dir.path().join("non_labeled/b.zip").exists());
    }
}
