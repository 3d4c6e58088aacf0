//! Object storage for camera/vehicle images, grounded in shape (not
//! implementation) on `original_source/utils/minio_utils.py`'s bucket
//! naming (`full-images`, `plate-images`, `profile-images`) and
//! put/remove/presigned-url operations. The core event path never
//! exercises this trait — plate and live images pass through as
//! base64 strings in the fanned-out payload — it backs only the CRUD
//! surface's profile-image upload endpoint.

use async_trait::async_trait;

pub const FULL_IMAGE_BUCKET: &str = "full-images";
pub const PLATE_IMAGE_BUCKET: &str = "plate-images";
pub const PROFILE_IMAGE_BUCKET: &str = "profile-images";

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("object not found: {0}/{1}")]
    NotFound(String, String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<String, BlobError>;
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), BlobError>;
}

/// Filesystem-backed `BlobStore`: `{root}/{bucket}/{key}`, returning a
/// `file://` URL in place of MinIO's presigned GET URL.
pub struct FilesystemBlobStore {
    root: std::path::PathBuf,
}

impl FilesystemBlobStore {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, bucket: &str, key: &str) -> std::path::PathBuf {
        self.root.join(bucket).join(key)
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<String, BlobError> {
        let path = self.path_for(bucket, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(format!("file://{}", path.display()))
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), BlobError> {
        let path = self.path_for(bucket, key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(bucket.to_string(), key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_delete_round_trips() {
        let dir = std::env::temp_dir().join(format!("lpr-blobstore-test-{}", uuid::Uuid::new_v4()));
        let store = FilesystemBlobStore::new(dir.clone());

        let url = store.put(PLATE_IMAGE_BUCKET, "abc.jpg", vec![1, 2, 3]).await.unwrap();
        assert!(url.contains("abc.jpg"));

        store.delete(PLATE_IMAGE_BUCKET, "abc.jpg").await.unwrap();
        let err = store.delete(PLATE_IMAGE_BUCKET, "abc.jpg").await.unwrap_err();
        assert!(matches!(err, BlobError::NotFound(_, _)));

        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}
