//! Cache-first remote lookups with bounded retries.
//!
//! A [`PartnerSource`] knows how to query one external database; the
//! [`RemoteResolver`] wraps it with the cache, the retry policy and the
//! outcome classification shared by every source.

pub mod circinteractome;
pub mod http;
pub mod mirdb;

pub use circinteractome::CircInteractomeSource;
pub use mirdb::MirdbSource;

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CachePayload, EntityCache};
use crate::config::ResolverConfig;
use crate::error::{RegnetError, Result};

/// Result of resolving one entity
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome<T> {
    /// Data found (possibly served from cache)
    Hit(T),
    /// The source answered but has nothing for this entity
    Empty,
    /// The source could not be reached within the retry budget
    Down,
}

impl<T> ResolutionOutcome<T> {
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ResolutionOutcome<U> {
        match self {
            ResolutionOutcome::Hit(value) => ResolutionOutcome::Hit(f(value)),
            ResolutionOutcome::Empty => ResolutionOutcome::Empty,
            ResolutionOutcome::Down => ResolutionOutcome::Down,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, ResolutionOutcome::Hit(_))
    }
}

/// One external database
///
/// `Ok(None)` means "no data" (4xx, no result table). Transport problems are
/// reported as [`RegnetError::TransientNetwork`], 5xx answers as
/// [`RegnetError::ServiceDown`].
#[async_trait]
pub trait PartnerSource: Send + Sync {
    fn name(&self) -> &str;

    async fn query(&self, entity: &str) -> Result<Option<CachePayload>>;
}

/// Cache-first resolver around a single [`PartnerSource`]
pub struct RemoteResolver {
    source: Arc<dyn PartnerSource>,
    cache: Arc<dyn EntityCache>,
    max_attempts: u32,
    retry_delay: Duration,
    retry_server_errors: bool,
}

impl RemoteResolver {
    pub fn new(
        source: Arc<dyn PartnerSource>,
        cache: Arc<dyn EntityCache>,
        config: &ResolverConfig,
    ) -> Self {
        Self {
            source,
            cache,
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay(),
            retry_server_errors: config.retry_server_errors,
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Partner IDs for `entity`
    pub async fn fetch(&self, entity: &str) -> ResolutionOutcome<BTreeSet<String>> {
        self.fetch_payload(entity).await.map(|p| p.partner_ids())
    }

    /// Full payload for `entity`; a `Hit` always carries at least one partner
    pub async fn fetch_payload(&self, entity: &str) -> ResolutionOutcome<CachePayload> {
        if let Some(payload) = self.cache.get(entity).await {
            log::debug!("{}: cache hit for {}", self.source.name(), entity);
            if payload.partner_ids().is_empty() {
                return ResolutionOutcome::Empty;
            }
            return ResolutionOutcome::Hit(payload);
        }

        let outcome = self.query_with_retry(entity).await;
        if let ResolutionOutcome::Hit(payload) = &outcome {
            self.cache.put(entity, payload).await;
        }
        outcome
    }

    fn should_retry(&self, error: &RegnetError) -> bool {
        match error {
            RegnetError::ServiceDown { .. } => self.retry_server_errors,
            other => other.is_transient(),
        }
    }

    async fn query_with_retry(&self, entity: &str) -> ResolutionOutcome<CachePayload> {
        let name = self.source.name();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.source.query(entity).await {
                Ok(Some(payload)) => {
                    let payload = payload.normalized();
                    if payload.partner_ids().is_empty() {
                        log::debug!("{}: no partners for {}", name, entity);
                        return ResolutionOutcome::Empty;
                    }
                    return ResolutionOutcome::Hit(payload);
                }
                Ok(None) => {
                    log::debug!("{}: no data for {}", name, entity);
                    return ResolutionOutcome::Empty;
                }
                Err(e) if self.should_retry(&e) => {
                    if attempt >= self.max_attempts {
                        log::warn!(
                            "{}: giving up on {} after {} attempts: {}",
                            name,
                            entity,
                            attempt,
                            e
                        );
                        return ResolutionOutcome::Down;
                    }
                    log::debug!(
                        "{}: attempt {}/{} for {} failed: {}",
                        name,
                        attempt,
                        self.max_attempts,
                        entity,
                        e
                    );
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
                Err(e @ RegnetError::ServiceDown { .. }) => {
                    log::warn!("{}: {} for {}", name, e, entity);
                    return ResolutionOutcome::Down;
                }
                Err(e) => {
                    log::warn!("{}: failed to resolve {}: {}", name, entity, e);
                    return ResolutionOutcome::Empty;
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted in-memory source
    ///
    /// Known entities return their partner list; `down` answers 5xx,
    /// `flaky` always times out, `boom` panics, anything else has no data.
    #[derive(Default)]
    pub(crate) struct StaticSource {
        partners: BTreeMap<String, Vec<String>>,
        calls: AtomicUsize,
    }

    impl StaticSource {
        pub(crate) fn new(items: &[(&str, &[&str])]) -> Self {
            Self {
                partners: items
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PartnerSource for StaticSource {
        fn name(&self) -> &str {
            "static"
        }

        async fn query(&self, entity: &str) -> Result<Option<CachePayload>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match entity {
                "down" => Err(RegnetError::ServiceDown {
                    source_name: "static".to_string(),
                    detail: "HTTP 503".to_string(),
                }),
                "flaky" => Err(RegnetError::TransientNetwork("timed out".to_string())),
                "garbled" => Err(RegnetError::Parse("unexpected markup".to_string())),
                "boom" => panic!("source blew up"),
                _ => Ok(self
                    .partners
                    .get(entity)
                    .map(|p| CachePayload::Partners(p.clone()))),
            }
        }
    }

    pub(crate) fn fast_config() -> ResolverConfig {
        ResolverConfig {
            retry_delay_ms: 1,
            ..ResolverConfig::default()
        }
    }
}
