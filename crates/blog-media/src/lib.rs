//! Binary attachment storage for posts and avatars.
//!
//! [`MediaStore`] is the seam the mutation layer talks to; [`LocalMediaStore`]
//! keeps objects in a flat directory and hands out HMAC-signed, time-limited
//! URLs that the server's `/media/{key}` route verifies.

pub mod local;
pub mod signing;

use async_trait::async_trait;
use bytes::Bytes;

pub use local::LocalMediaStore;
pub use signing::{URL_TTL_SECS, UrlSigner};

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("media store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("no object stored under {0}")]
    NotFound(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, MediaError>;

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store `content` under `key` and return a time-limited access URL.
    async fn put(&self, key: &str, content: Bytes) -> Result<String>;

    /// Remove the object. A key that is already gone is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Fresh access URL for an existing key.
    fn access_url(&self, key: &str) -> String;
}

/// Build a unique object key from an uploaded file name.
///
/// The name is reduced to `[A-Za-z0-9._-]` so the key is safe as a single
/// path segment; an empty result falls back to `upload`.
pub fn object_key(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", ".");
    }
    let cleaned = cleaned.trim_matches('.');
    let name = if cleaned.is_empty() { "upload" } else { cleaned };
    format!("{}-{}", uuid::Uuid::new_v4(), name)
}

/// Reject keys that could escape the bucket directory.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains(['/', '\\']) || key.contains("..") {
        return Err(MediaError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_are_unique_and_flat() {
        let a = object_key("cover photo.png");
        let b = object_key("cover photo.png");
        assert_ne!(a, b);
        assert!(a.ends_with("-cover_photo.png"));
        assert!(validate_key(&a).is_ok());
    }

    #[test]
    fn hostile_file_names_are_neutralised() {
        for name in ["../../etc/passwd", "..", "", "a/../b", "C:\\evil\\..\\x.jpg"] {
            let key = object_key(name);
            assert!(validate_key(&key).is_ok(), "{name:?} produced {key:?}");
        }
        assert!(object_key("..").ends_with("-upload"));
    }

    #[test]
    fn validate_key_rejects_traversal() {
        for bad in ["", "a/b", "..", "x..y", "a\\b"] {
            assert!(matches!(validate_key(bad), Err(MediaError::InvalidKey(_))));
        }
    }
}
