//! Local filesystem storage backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ObjectReader, ObjectStore};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::instrument;
use uuid::Uuid;

/// Local filesystem object store.
///
/// Objects live at `{root}/{key}` with intermediate directories created on
/// demand. Writes go through a temp file plus rename so a crash mid-write
/// never leaves a truncated object at the destination.
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a new local backend, creating the root directory if needed.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o755);
            fs::set_permissions(&root, perms).await?;
        }
        Ok(Self { root })
    }

    /// Get the full path for a key, rejecting traversal outside the root.
    fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        if key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
            return Err(StorageError::InvalidKey(format!(
                "path traversal not allowed: {key}"
            )));
        }
        for component in Path::new(key).components() {
            match component {
                std::path::Component::Normal(_) => {}
                _ => {
                    return Err(StorageError::InvalidKey(format!(
                        "contains unsafe path component: {key}"
                    )));
                }
            }
        }
        Ok(self.root.join(key))
    }

    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalBackend {
    #[instrument(skip(self, reader), fields(backend = "local"))]
    async fn upload(&self, key: &str, mut reader: ObjectReader) -> StorageResult<u64> {
        let path = self.key_path(key)?;
        self.ensure_parent(&path).await?;

        // Unique temp name so concurrent writes to the same key never
        // clobber each other's temp file.
        let temp_name = format!(".tmp.{}", Uuid::new_v4());
        let temp_path = path.with_file_name(
            path.file_name()
                .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
                .unwrap_or_else(|| temp_name.clone()),
        );

        let result = async {
            let mut file = fs::File::create(&temp_path).await?;
            let written = tokio::io::copy(&mut reader, &mut file).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp_path, &path).await?;
            Ok(written)
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&temp_path).await;
        }
        result
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn download(&self, key: &str) -> StorageResult<ObjectReader> {
        let path = self.key_path(key)?;
        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(Box::pin(file))
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;
        if !metadata.is_dir() {
            return Err(StorageError::Config(format!(
                "storage root is not a directory: {:?}",
                self.root
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn reader(data: &'static [u8]) -> ObjectReader {
        Box::pin(data)
    }

    async fn read_all(mut r: ObjectReader) -> Vec<u8> {
        let mut out = Vec::new();
        r.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn upload_download_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path()).await.unwrap();

        let written = backend
            .upload("templates/a/1", reader(b"hello world"))
            .await
            .unwrap();
        assert_eq!(written, 11);

        let got = read_all(backend.download("templates/a/1").await.unwrap()).await;
        assert_eq!(got, b"hello world");
    }

    #[tokio::test]
    async fn upload_overwrites_existing_object() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path()).await.unwrap();

        backend.upload("k", reader(b"first")).await.unwrap();
        backend.upload("k", reader(b"second")).await.unwrap();

        let got = read_all(backend.download("k").await.unwrap()).await;
        assert_eq!(got, b"second");
    }

    #[tokio::test]
    async fn download_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path()).await.unwrap();

        let err = backend.download("missing").await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path()).await.unwrap();

        backend.upload("k", reader(b"data")).await.unwrap();
        backend.delete("k").await.unwrap();
        backend.delete("k").await.unwrap();
        assert!(backend.download("k").await.err().unwrap().is_not_found());
    }

    #[tokio::test]
    async fn path_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path()).await.unwrap();

        for key in ["../escape", "/absolute/path", "foo/../bar", ""] {
            let err = backend.download(key).await.err().unwrap();
            assert!(
                matches!(err, StorageError::InvalidKey(_)),
                "key {key:?} should be rejected, got {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn no_temp_file_left_at_destination_after_upload() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path()).await.unwrap();

        backend.upload("nested/key", reader(b"data")).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(entries, vec!["key".to_string()]);
    }

    #[tokio::test]
    async fn empty_object_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path()).await.unwrap();

        let written = backend.upload("empty", reader(b"")).await.unwrap();
        assert_eq!(written, 0);
        let got = read_all(backend.download("empty").await.unwrap()).await;
        assert!(got.is_empty());
    }
}
