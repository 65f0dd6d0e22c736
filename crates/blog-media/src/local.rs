use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::{info, warn};

use crate::{MediaError, MediaStore, Result, UrlSigner, validate_key};

/// Directory-backed object store.
///
/// Each object is a flat file at `{dir}/{key}`. Writes go to a temp file
/// first and are renamed into place, so a reader never sees a partial object.
pub struct LocalMediaStore {
    dir: PathBuf,
    signer: UrlSigner,
}

impl LocalMediaStore {
    pub async fn new(dir: PathBuf, signer: UrlSigner) -> Result<Self> {
        fs::create_dir_all(&dir).await.map_err(unavailable)?;
        info!("Media storage directory: {}", dir.display());
        Ok(Self { dir, signer })
    }

    pub fn signer(&self) -> &UrlSigner {
        &self.signer
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn put(&self, key: &str, content: Bytes) -> Result<String> {
        let path = self.object_path(key)?;
        let tmp = self.dir.join(format!(".{key}.part"));

        fs::write(&tmp, &content).await.map_err(unavailable)?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(unavailable(e));
        }

        info!("Stored media object {} ({} bytes)", key, content.len());
        Ok(self.signer.url(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted media object {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Media object {} already gone", key);
                Ok(())
            }
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let path = self.object_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MediaError::NotFound(key.to_string()))
            }
            Err(e) => Err(unavailable(e)),
        }
    }

    fn access_url(&self, key: &str) -> String {
        self.signer.url(key)
    }
}

fn unavailable(e: std::io::Error) -> MediaError {
    MediaError::StoreUnavailable(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, LocalMediaStore) {
        let dir = tempfile::tempdir().unwrap();
        let signer = UrlSigner::new("secret", "http://localhost:12346");
        let store = LocalMediaStore::new(dir.path().join("bucket"), signer)
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn put_get_delete() {
        let (_dir, store) = store().await;

        let url = store.put("k1-cat.png", Bytes::from_static(b"meow")).await.unwrap();
        assert!(url.contains("/media/k1-cat.png?expires="));
        assert_eq!(store.get("k1-cat.png").await.unwrap(), Bytes::from_static(b"meow"));

        store.delete("k1-cat.png").await.unwrap();
        assert!(matches!(store.get("k1-cat.png").await, Err(MediaError::NotFound(_))));
    }

    #[tokio::test]
    async fn deleting_a_missing_key_is_ok() {
        let (_dir, store) = store().await;
        store.delete("never-written").await.unwrap();
    }

    #[tokio::test]
    async fn put_overwrites_in_place() {
        let (_dir, store) = store().await;
        store.put("k", Bytes::from_static(b"one")).await.unwrap();
        store.put("k", Bytes::from_static(b"two")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn traversal_keys_never_touch_disk() {
        let (dir, store) = store().await;
        let result = store.put("../escape", Bytes::from_static(b"x")).await;
        assert!(matches!(result, Err(MediaError::InvalidKey(_))));
        assert!(!dir.path().join("escape").exists());
    }

    #[tokio::test]
    async fn unwritable_bucket_reports_unavailable() {
        let (dir, store) = store().await;
        std::fs::remove_dir_all(dir.path().join("bucket")).unwrap();

        let result = store.put("k", Bytes::from_static(b"x")).await;
        assert!(matches!(result, Err(MediaError::StoreUnavailable(_))));
    }
}
