//! In-memory [`ObjectStore`] for tests.
//!
//! Deletes can be made to fail for chosen buckets to exercise best-effort
//! cleanup paths.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::ObjectStore;

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<(String, String), Vec<u8>>>,
    failing_deletes: RwLock<BTreeSet<String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `delete` in `bucket` fail.
    pub fn fail_deletes_in(&self, bucket: &str) -> Result<()> {
        self.failing_deletes
            .write()
            .map_err(|e| Error::storage("memory object store", e))?
            .insert(bucket.to_string());
        Ok(())
    }

    /// Keys currently stored in `bucket`, sorted.
    pub fn keys(&self, bucket: &str) -> Result<Vec<String>> {
        let objects = self
            .objects
            .read()
            .map_err(|e| Error::storage("memory object store", e))?;
        Ok(objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        self.objects
            .write()
            .map_err(|e| Error::storage("object put", e))?
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .map_err(|e| Error::storage("object get", e))?
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| Error::not_found("object", format!("{}/{}", bucket, key)))
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let failing = self
            .failing_deletes
            .read()
            .map_err(|e| Error::storage("object delete", e))?
            .contains(bucket);
        if failing {
            return Err(Error::external(
                "object store",
                format!("delete {}/{} refused", bucket, key),
            ));
        }
        self.objects
            .write()
            .map_err(|e| Error::storage("object delete", e))?
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("memory://{}/{}", bucket, key)
    }
}
