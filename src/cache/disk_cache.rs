//! JSON-file cache: one `<sanitized key>.json` record per resolved entity.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{sanitize_key, CachePayload, EntityCache};
use crate::error::{RegnetError, Result};

/// Persistent cache rooted at a directory, created on first write
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record path for an entity ID
    pub fn record_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_key(key)))
    }

    async fn read_record(&self, path: &Path) -> Result<Option<CachePayload>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RegnetError::Io(e)),
        };

        let payload: CachePayload = serde_json::from_slice(&bytes)
            .map_err(|e| RegnetError::CacheCorruption(format!("{}: {}", path.display(), e)))?;

        if !payload.is_well_formed() {
            return Err(RegnetError::CacheCorruption(format!(
                "{}: malformed payload",
                path.display()
            )));
        }

        Ok(Some(payload))
    }

    async fn write_record(&self, path: &Path, payload: &CachePayload) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| RegnetError::Persistence(format!("{}: {}", self.root.display(), e)))?;

        let json = serde_json::to_vec(payload)?;

        // Write then rename so a crash never leaves a half-written record
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| RegnetError::Persistence(format!("{}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| RegnetError::Persistence(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }
}

#[async_trait]
impl EntityCache for DiskCache {
    async fn get(&self, key: &str) -> Option<CachePayload> {
        let path = self.record_path(key);
        match self.read_record(&path).await {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("Ignoring cache record for {}: {}", key, e);
                None
            }
        }
    }

    async fn put(&self, key: &str, payload: &CachePayload) {
        let path = self.record_path(key);
        if let Err(e) = self.write_record(&path, payload).await {
            log::warn!("Failed to cache {}: {}", key, e);
        } else {
            log::debug!("Cached {} at {}", key, path.display());
        }
    }
}
