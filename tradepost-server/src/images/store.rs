//! On-disk image store.
//!
//! Listing images live in a content-addressed cacache store under opaque
//! UUID keys; the database only ever sees the keys. Content types are not
//! stored, they are sniffed from magic bytes on the way out.

use std::path::PathBuf;

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ImageStoreError {
    #[error("image store error: {0}")]
    Store(#[from] cacache::Error),
}

#[derive(Debug, Clone)]
pub struct StoredImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store image bytes and return the fresh opaque key.
    pub async fn put(&self, bytes: Vec<u8>) -> Result<String, ImageStoreError> {
        let key = Uuid::new_v4().to_string();
        cacache::write(&self.root, &key, &bytes).await?;
        Ok(key)
    }

    pub async fn get(&self, key: &str) -> Result<Option<StoredImage>, ImageStoreError> {
        match cacache::read(&self.root, key).await {
            Ok(bytes) => {
                let content_type = sniff_content_type(&bytes);
                Ok(Some(StoredImage {
                    bytes,
                    content_type,
                }))
            }
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn remove(&self, key: &str) -> Result<(), ImageStoreError> {
        cacache::remove(&self.root, key).await?;
        Ok(())
    }
}

/// Content type from magic bytes, falling back to JPEG like the upstream
/// image pipeline does.
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "image/jpeg",
    }
}
