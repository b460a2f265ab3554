//! Filesystem blob backend: `root/bucket/key`.
//!
//! Keys are flat (`{card}_{file}`), so a key containing a path separator
//! or `..` is rejected rather than allowed to escape its bucket.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use umesao_core::error::{Error, Result};
use umesao_core::object_store::ObjectStore;

pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        for part in [bucket, key] {
            if part.is_empty() || part == ".." || part.contains(['/', '\\']) {
                return Err(Error::InvalidInput(format!(
                    "invalid object name '{}/{}'",
                    bucket, key
                )));
            }
        }
        Ok(self.root.join(bucket).join(key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        let path = self.path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::storage("object put", e))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| Error::storage("object put", e))?;
        debug!(path = %path.display(), "wrote blob");
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found("object", format!("{}/{}", bucket, key)))
            }
            Err(e) => Err(Error::storage("object get", e)),
        }
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let path = self.path(bucket, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage("object delete", e)),
        }
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        self.root.join(bucket).join(key).display().to_string()
    }
}
