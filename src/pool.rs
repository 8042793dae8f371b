//! Bounded concurrent resolution of an entity set.
//!
//! One task per entity on a `JoinSet`, throttled by a semaphore. Every task
//! returns its own result; the collecting loop is the only writer of the
//! aggregate, and `resolve_all` returns only once every task has finished.

use futures_util::FutureExt;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};

use crate::cache::CachePayload;
use crate::resolver::{RemoteResolver, ResolutionOutcome};

/// Aggregated outcome of resolving a set of entities
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolResult {
    /// Partner IDs per entity that resolved to a hit
    pub partners: BTreeMap<String, BTreeSet<String>>,
    pub empty: BTreeSet<String>,
    pub down: BTreeSet<String>,
    /// Entities whose task panicked
    pub failed: BTreeSet<String>,
}

impl PoolResult {
    fn record(&mut self, entity: String, outcome: Option<&ResolutionOutcome<CachePayload>>) {
        match outcome {
            Some(ResolutionOutcome::Hit(payload)) => {
                self.partners
                    .entry(entity)
                    .or_default()
                    .extend(payload.partner_ids());
            }
            Some(ResolutionOutcome::Empty) => {
                self.empty.insert(entity);
            }
            Some(ResolutionOutcome::Down) => {
                self.down.insert(entity);
            }
            None => {
                self.failed.insert(entity);
            }
        }
    }

    /// Union of two results; associative and commutative
    pub fn merge(mut self, other: PoolResult) -> PoolResult {
        for (entity, partners) in other.partners {
            self.partners.entry(entity).or_default().extend(partners);
        }
        self.empty.extend(other.empty);
        self.down.extend(other.down);
        self.failed.extend(other.failed);
        self
    }

    /// No entity produced partners
    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }

    pub fn entity_count(&self) -> usize {
        self.partners.len() + self.empty.len() + self.down.len() + self.failed.len()
    }

    pub fn partner_count(&self) -> usize {
        self.partners.values().map(BTreeSet::len).sum()
    }

    fn log_summary(&self, source: &str) {
        log::info!(
            "{}: {} resolved, {} empty, {} down, {} failed ({} partners)",
            source,
            self.partners.len(),
            self.empty.len(),
            self.down.len(),
            self.failed.len(),
            self.partner_count()
        );
        if !self.down.is_empty() {
            log::warn!(
                "{} was unreachable for {} entities; results are partial",
                source,
                self.down.len()
            );
        }
        if !self.failed.is_empty() {
            log::warn!("{}: {} lookups crashed", source, self.failed.len());
        }
    }
}

/// `None` outcome: the lookup panicked
type TaskOutput = (String, Option<ResolutionOutcome<CachePayload>>);

/// Drain `tasks`, recording every entity exactly once
///
/// A task that dies with a `JoinError` is looked up in `spawned` by task id
/// and counted as failed.
async fn collect_tasks(
    mut tasks: JoinSet<TaskOutput>,
    mut spawned: HashMap<Id, String>,
    source: &str,
) -> (PoolResult, BTreeMap<String, CachePayload>) {
    let mut result = PoolResult::default();
    let mut payloads = BTreeMap::new();

    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((id, (entity, outcome))) => {
                spawned.remove(&id);
                if outcome.is_none() {
                    log::error!("{}: lookup for {} panicked", source, entity);
                } else {
                    log::debug!("{}: finished {}", source, entity);
                }
                result.record(entity.clone(), outcome.as_ref());
                if let Some(ResolutionOutcome::Hit(payload)) = outcome {
                    payloads.insert(entity, payload);
                }
            }
            Err(e) => match spawned.remove(&e.id()) {
                Some(entity) => {
                    log::error!("{}: task for {} aborted: {}", source, entity, e);
                    result.record(entity, None);
                }
                None => log::error!("{}: resolution task aborted: {}", source, e),
            },
        }
    }

    (result, payloads)
}

/// Fan-out/fan-in over a [`RemoteResolver`]
#[derive(Clone)]
pub struct ResolutionPool {
    resolver: Arc<RemoteResolver>,
    concurrency: usize,
}

impl ResolutionPool {
    pub fn new(resolver: Arc<RemoteResolver>, concurrency: usize) -> Self {
        Self {
            resolver,
            concurrency: concurrency.max(1),
        }
    }

    pub fn resolver(&self) -> &RemoteResolver {
        &self.resolver
    }

    /// Resolve every entity's partner set
    pub async fn resolve_all(&self, entities: &BTreeSet<String>) -> PoolResult {
        self.resolve_payloads(entities).await.0
    }

    /// Resolve every entity, also returning the raw payload of each hit
    pub async fn resolve_payloads(
        &self,
        entities: &BTreeSet<String>,
    ) -> (PoolResult, BTreeMap<String, CachePayload>) {
        if entities.is_empty() {
            return Default::default();
        }

        let permits = self.concurrency.min(entities.len()).max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        let source = self.resolver.source_name().to_string();
        log::info!(
            "{}: resolving {} entities ({} workers)",
            source,
            entities.len(),
            permits
        );

        let mut tasks = JoinSet::new();
        let mut spawned = HashMap::with_capacity(entities.len());
        for entity in entities {
            let task_entity = entity.clone();
            let resolver = Arc::clone(&self.resolver);
            let semaphore = Arc::clone(&semaphore);

            let handle = tasks.spawn(async move {
                let entity = task_entity;
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (entity, None);
                };
                let outcome = AssertUnwindSafe(resolver.fetch_payload(&entity))
                    .catch_unwind()
                    .await
                    .ok();
                (entity, outcome)
            });
            spawned.insert(handle.id(), entity.clone());
        }

        let (result, payloads) = collect_tasks(tasks, spawned, &source).await;
        result.log_summary(&source);
        (result, payloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::resolver::testing::{fast_config, StaticSource};

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn pool(source: Arc<StaticSource>, concurrency: usize) -> ResolutionPool {
        let resolver = RemoteResolver::new(source, Arc::new(MemoryCache::default()), &fast_config());
        ResolutionPool::new(Arc::new(resolver), concurrency)
    }

    fn lookup() -> Arc<StaticSource> {
        Arc::new(StaticSource::new(&[
            ("m1", &["G1", "G2"]),
            ("m2", &["G3"]),
            ("m3", &["G1"]),
        ]))
    }

    #[tokio::test]
    async fn test_resolve_all_classifies_every_entity() {
        let result = pool(lookup(), 2)
            .resolve_all(&set(&["m1", "m2", "unknown", "down"]))
            .await;

        assert_eq!(result.partners["m1"], set(&["G1", "G2"]));
        assert_eq!(result.partners["m2"], set(&["G3"]));
        assert_eq!(result.empty, set(&["unknown"]));
        assert_eq!(result.down, set(&["down"]));
        assert!(result.failed.is_empty());
        assert_eq!(result.entity_count(), 4);
    }

    #[tokio::test]
    async fn test_merge_over_partition_matches_single_run() {
        let all = set(&["m1", "m2", "m3", "unknown"]);
        let whole = pool(lookup(), 8).resolve_all(&all).await;

        let left = pool(lookup(), 1).resolve_all(&set(&["m1", "unknown"])).await;
        let right = pool(lookup(), 3).resolve_all(&set(&["m2", "m3"])).await;

        assert_eq!(left.clone().merge(right.clone()), whole);
        assert_eq!(right.merge(left), whole);
    }

    #[tokio::test]
    async fn test_merge_is_associative() {
        let a = pool(lookup(), 2).resolve_all(&set(&["m1"])).await;
        let b = pool(lookup(), 2).resolve_all(&set(&["m2", "down"])).await;
        let c = pool(lookup(), 2).resolve_all(&set(&["m3", "unknown"])).await;

        assert_eq!(
            a.clone().merge(b.clone()).merge(c.clone()),
            a.merge(b.merge(c))
        );
    }

    #[tokio::test]
    async fn test_panicking_lookup_is_isolated() {
        let result = pool(lookup(), 4)
            .resolve_all(&set(&["m1", "boom", "m2"]))
            .await;

        assert_eq!(result.failed, set(&["boom"]));
        assert_eq!(result.partners.len(), 2);
    }

    #[tokio::test]
    async fn test_aborted_task_is_recorded_as_failed() {
        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
        let mut spawned = HashMap::new();

        let handle = tasks.spawn(async { ("m1".to_string(), Some(ResolutionOutcome::Empty)) });
        spawned.insert(handle.id(), "m1".to_string());

        let handle = tasks.spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            ("stuck".to_string(), Some(ResolutionOutcome::Empty))
        });
        spawned.insert(handle.id(), "stuck".to_string());
        handle.abort();

        let handle = tasks.spawn(async {
            if true {
                panic!("uncaught");
            }
            ("crash".to_string(), None)
        });
        spawned.insert(handle.id(), "crash".to_string());

        let (result, payloads) = collect_tasks(tasks, spawned, "test").await;
        assert_eq!(result.empty, set(&["m1"]));
        assert_eq!(result.failed, set(&["crash", "stuck"]));
        assert_eq!(result.entity_count(), 3);
        assert!(payloads.is_empty());
    }

    #[tokio::test]
    async fn test_empty_input() {
        let source = lookup();
        let result = pool(source.clone(), 4).resolve_all(&BTreeSet::new()).await;
        assert!(result.is_empty());
        assert_eq!(result.entity_count(), 0);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_resolve_payloads_returns_hits_only() {
        let (result, payloads) = pool(lookup(), 2)
            .resolve_payloads(&set(&["m2", "unknown"]))
            .await;
        assert_eq!(result.empty, set(&["unknown"]));
        assert_eq!(
            payloads.get("m2"),
            Some(&CachePayload::Partners(vec!["G3".to_string()]))
        );
        assert!(!payloads.contains_key("unknown"));
    }
}
