//! Per-entity lookup cache.
//!
//! Caching is an optimisation: a miss, a corrupt record or a failed write only
//! costs a fresh remote fetch, never a pipeline error.

pub mod disk_cache;
pub mod memory_cache;

pub use disk_cache::DiskCache;
pub use memory_cache::MemoryCache;

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::prediction::SiteTable;

/// Stored result of one remote lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CachePayload {
    /// Deduplicated partner IDs (e.g. miRDB gene targets)
    Partners(Vec<String>),
    /// Raw tabular snapshot (e.g. CircInteractome site table)
    Table(SiteTable),
}

impl CachePayload {
    /// Structural validity check applied on every read
    pub fn is_well_formed(&self) -> bool {
        match self {
            CachePayload::Partners(ids) => ids.iter().all(|id| !id.trim().is_empty()),
            CachePayload::Table(table) => table.is_well_formed(),
        }
    }

    /// Partner IDs carried by the payload, sorted and deduplicated
    pub fn partner_ids(&self) -> std::collections::BTreeSet<String> {
        match self {
            CachePayload::Partners(ids) => ids.iter().cloned().collect(),
            CachePayload::Table(table) => table.partner_ids(),
        }
    }

    /// Sort and dedupe partner lists before they are stored
    pub fn normalized(self) -> Self {
        match self {
            CachePayload::Partners(ids) => {
                let unique: std::collections::BTreeSet<String> = ids.into_iter().collect();
                CachePayload::Partners(unique.into_iter().collect())
            }
            table => table,
        }
    }
}

/// Key/value store for resolved lookups
///
/// Implementations sanitize keys themselves; callers pass raw entity IDs.
#[async_trait]
pub trait EntityCache: Send + Sync {
    /// Return a stored, structurally valid payload. Corrupt records read as absent.
    async fn get(&self, key: &str) -> Option<CachePayload>;

    /// Best-effort write. Failures are logged and swallowed.
    async fn put(&self, key: &str, payload: &CachePayload);
}

fn unsafe_key_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).expect("Invalid regex pattern"))
}

/// Map an entity ID to a storage-safe key
///
/// Unsafe characters become `_`. If anything was substituted, an 8-hex-digit
/// SHA-256 prefix of the original ID is appended so `a/b` and `a_b` stay
/// distinct keys.
pub fn sanitize_key(entity_id: &str) -> String {
    if entity_id.is_empty() {
        return "_empty".to_string();
    }

    let mut key = unsafe_key_chars().replace_all(entity_id, "_").into_owned();
    if key.starts_with('.') {
        key.replace_range(0..1, "_");
    }

    if key == entity_id {
        return key;
    }

    let digest = Sha256::digest(entity_id.as_bytes());
    let suffix: String = digest[..4].iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}-{}", key, suffix)
}
