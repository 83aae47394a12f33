//! An in-memory implementation of the [`Storage`][super::Storage] trait.
//! Not durable across restarts; useful for tests and ephemeral deployments.

use crate::error::Error;
use crate::zone::Storage;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryStorage {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

#[async_trait::async_trait]
impl Storage for InMemoryStorage {
    async fn load(&self, key: &str) -> Result<Vec<u8>, Error> {
        self.blobs
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), Error> {
        self.blobs.write().await.insert(key.to_string(), value);
        Ok(())
    }
}
