//! A file-backed implementation of the [`Storage`][super::Storage] trait.
//!
//! Each key maps to one file under the configured root directory; zonefiles
//! survive restarts, which keeps published DNS-01 challenge records available
//! while a certificate order is in flight.

use crate::error::Error;
use crate::zone::Storage;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are forward-slash separated; refuse traversal components.
        let mut path = self.root.clone();
        for part in key.split('/').filter(|p| !p.is_empty() && *p != "..") {
            path.push(part);
        }
        path
    }
}

#[async_trait::async_trait]
impl Storage for FileStorage {
    async fn load(&self, key: &str) -> Result<Vec<u8>, Error> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(value) => Ok(value),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(Error::KeyNotFound(key.to_string()))
            }
            Err(err) => Err(Error::Io(err)),
        }
    }

    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), Error> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, value).await?;
        Ok(())
    }
}

impl FileStorage {
    /// The directory backing this storage.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}
