//! Stage orchestration: sites → predictions → target lookup → overlap →
//! network → hubs → report.
//!
//! Each stage runs only after the previous one returned. Missing inputs turn
//! into empty results plus a [`StageReport`] warning; output files are best
//! effort and never abort a run.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use crate::cache::{CachePayload, DiskCache, EntityCache};
use crate::config::Config;
use crate::error::Result;
use crate::network::{
    hubs, induced_hub_subgraph, write_hub_table, GraphAssembler, HubRecord, InteractionEdge, Layer,
    PpiGraph, RegulatoryGraph, StringDbClient,
};
use crate::overlap::{join, partner_pairs, write_overlap_table, OVERLAP_FILE};
use crate::pool::{PoolResult, ResolutionPool};
use crate::prediction::{
    classify_sites, match_table_path, prepare_sites, strong_matches, upstream_edges,
    write_match_table, write_site_rows, MatchRecord, SiteClassifier, SiteRow,
};
use crate::report::{
    gene_summaries, interaction_rows, write_gene_summaries, write_interaction_rows,
    write_overlapping_genes,
};
use crate::resolver::{CircInteractomeSource, MirdbSource, RemoteResolver};

pub const NETWORK_JSON: &str = "circrna_mirna_mrna_network.json";
pub const NETWORK_GRAPHML: &str = "circrna_mirna_mrna_network.graphml";
pub const HUB_FILE: &str = "hub_genes.csv";
pub const INTERACTIONS_FILE: &str = "comprehensive_interactions.csv";
pub const SUMMARY_FILE: &str = "gene_summary.csv";
pub const OVERLAPPING_GENES_FILE: &str = "overlapping_genes.csv";
pub const PPI_GRAPHML: &str = "ppi_network.graphml";
pub const PPI_HUB_GRAPHML: &str = "ppi_hub_network.graphml";

/// Counts and warnings from one stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageReport {
    pub stage: &'static str,
    pub counts: BTreeMap<&'static str, usize>,
    pub warnings: Vec<String>,
}

impl StageReport {
    fn new(stage: &'static str) -> Self {
        Self {
            stage,
            ..Default::default()
        }
    }

    fn count(&mut self, name: &'static str, value: usize) {
        self.counts.insert(name, value);
    }

    fn warn(&mut self, message: String) {
        log::warn!("[{}] {}", self.stage, message);
        self.warnings.push(message);
    }

    /// Record a best-effort output write
    fn output(&mut self, path: &Path, result: Result<()>) {
        match result {
            Ok(()) => log::info!("Saved: {}", path.display()),
            Err(e) => {
                log::error!("Failed to save {}: {}", path.display(), e);
                self.warnings.push(format!("could not write {}: {}", path.display(), e));
            }
        }
    }

    fn from_pool(stage: &'static str, pool: &PoolResult) -> Self {
        let mut report = Self::new(stage);
        report.count("resolved", pool.partners.len());
        report.count("empty", pool.empty.len());
        report.count("down", pool.down.len());
        report.count("failed", pool.failed.len());
        if !pool.down.is_empty() {
            report.warn(format!("source down for {} entities", pool.down.len()));
        }
        if !pool.failed.is_empty() {
            report.warn(format!("{} lookups crashed", pool.failed.len()));
        }
        report
    }
}

/// Prepared site rows per circRNA
#[derive(Debug, Clone, Default)]
pub struct SitesRun {
    pub pool: PoolResult,
    pub sites: BTreeMap<String, Vec<SiteRow>>,
    pub reports: Vec<StageReport>,
}

/// Strong/medium calls per circRNA and the upstream edges they imply
#[derive(Debug, Clone, Default)]
pub struct PredictionRun {
    pub matches: BTreeMap<String, Vec<MatchRecord>>,
    pub upstream: BTreeSet<InteractionEdge>,
    pub reports: Vec<StageReport>,
}

/// Everything produced from upstream edges onward
#[derive(Debug, Clone, Default)]
pub struct NetworkRun {
    pub pool: PoolResult,
    pub join_pairs: BTreeSet<(String, String)>,
    /// `None` when there was no downstream layer to attach
    pub graph: Option<RegulatoryGraph>,
    pub hubs: Vec<HubRecord>,
    pub reports: Vec<StageReport>,
}

#[derive(Debug, Clone, Default)]
pub struct PpiRun {
    pub graph: PpiGraph,
    pub hubs: Vec<HubRecord>,
    pub hub_graph: PpiGraph,
    pub reports: Vec<StageReport>,
}

pub struct Pipeline {
    config: Arc<Config>,
    site_pool: ResolutionPool,
    target_pool: ResolutionPool,
}

impl Pipeline {
    pub fn new(config: Arc<Config>, site_pool: ResolutionPool, target_pool: ResolutionPool) -> Self {
        Self {
            config,
            site_pool,
            target_pool,
        }
    }

    /// CircInteractome and miRDB pools over disk caches under `regnet.cache_dir`
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let concurrency = config.pool.concurrency;

        let site_cache: Arc<dyn EntityCache> =
            Arc::new(DiskCache::new(config.cache_dir().join("circinteractome")));
        let site_resolver = RemoteResolver::new(
            Arc::new(CircInteractomeSource::new(&config)?),
            site_cache,
            &config.resolver,
        );

        let target_cache: Arc<dyn EntityCache> =
            Arc::new(DiskCache::new(config.cache_dir().join("mirdb")));
        let target_resolver = RemoteResolver::new(
            Arc::new(MirdbSource::new(&config)?),
            target_cache,
            &config.resolver,
        );

        Ok(Self::new(
            config,
            ResolutionPool::new(Arc::new(site_resolver), concurrency),
            ResolutionPool::new(Arc::new(target_resolver), concurrency),
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn output_dir(&self, report: &mut StageReport) -> bool {
        let dir = self.config.output_dir();
        if let Err(e) = std::fs::create_dir_all(dir) {
            report.warn(format!("cannot create {}: {}", dir.display(), e));
            return false;
        }
        true
    }

    /// Fetch and prepare CircInteractome site tables
    pub async fn run_sites(&self, circs: &BTreeSet<String>) -> SitesRun {
        let (pool, payloads) = self.site_pool.resolve_payloads(circs).await;
        let mut reports = vec![StageReport::from_pool("sites", &pool)];
        let mut report = StageReport::new("prepare");
        let writable = self.output_dir(&mut report);

        let mut sites = BTreeMap::new();
        for (circ, payload) in payloads {
            let CachePayload::Table(table) = payload else {
                report.warn(format!("{}: cached record is not a site table", circ));
                continue;
            };
            let Some(rows) = prepare_sites(&table) else {
                report.warn(format!("{}: site table lacks the ID column", circ));
                continue;
            };
            log::debug!("{}: {} prepared sites", circ, rows.len());
            if writable {
                let path = self.config.output_dir().join(format!(
                    "{}_sites.csv",
                    crate::cache::sanitize_key(&circ)
                ));
                let result = write_site_rows(&path, &rows);
                report.output(&path, result);
            }
            sites.insert(circ, rows);
        }

        report.count("circRNAs", sites.len());
        report.count("sites", sites.values().map(Vec::len).sum());
        log::info!("Processed {} circRNAs", sites.len());
        reports.push(report);

        SitesRun {
            pool,
            sites,
            reports,
        }
    }

    /// Classify prepared sites and write per-circRNA match tables
    pub fn run_predictions(
        &self,
        sites: &BTreeMap<String, Vec<SiteRow>>,
        classifier: &dyn SiteClassifier,
        input_mirnas: Option<&BTreeSet<String>>,
    ) -> PredictionRun {
        let mut report = StageReport::new("predict");
        let writable = self.output_dir(&mut report);

        let mut matches = BTreeMap::new();
        for (circ, rows) in sites {
            let records = match classify_sites(rows, classifier) {
                Ok(records) => records,
                Err(e) => {
                    report.warn(format!("{}: classification failed: {}", circ, e));
                    continue;
                }
            };
            let strong = strong_matches(&records, input_mirnas);
            if strong.is_empty() {
                log::debug!("{}: no strong/medium sites", circ);
                continue;
            }
            if writable {
                let path = match_table_path(self.config.output_dir(), circ);
                let result = write_match_table(&path, &strong);
                report.output(&path, result);
            }
            matches.insert(circ.clone(), strong);
        }

        let all: Vec<MatchRecord> = matches.values().flatten().cloned().collect();
        let upstream = upstream_edges(&all);
        let mirnas: BTreeSet<&str> = upstream.iter().map(|e| e.target.as_str()).collect();
        log::info!(
            "{} circRNAs with {} total miRNAs",
            matches.len(),
            mirnas.len()
        );
        report.count("circRNAs", matches.len());
        report.count("miRNAs", mirnas.len());
        report.count("edges", upstream.len());

        PredictionRun {
            matches,
            upstream,
            reports: vec![report],
        }
    }

    /// Resolve targets of every mid-layer entity, then join, assemble and
    /// analyse the network
    pub async fn run_network(
        &self,
        upstream: &BTreeSet<InteractionEdge>,
        reference: &BTreeSet<String>,
    ) -> NetworkRun {
        let mids: BTreeSet<String> = upstream
            .iter()
            .filter(|e| e.layer == Layer::UpstreamToMid)
            .map(|e| e.target.clone())
            .collect();

        let pool = self.target_pool.resolve_all(&mids).await;
        let mut resolve = StageReport::from_pool("targets", &pool);
        if mids.is_empty() {
            resolve.warn("no miRNAs to look up".to_string());
        }
        let mut reports = vec![resolve];

        // Overlap
        let mut overlap = StageReport::new("overlap");
        let writable = self.output_dir(&mut overlap);
        let join_pairs = join(&partner_pairs(&pool.partners), reference);
        let genes: BTreeSet<&String> = join_pairs.iter().map(|(_, g)| g).collect();
        let has_targets = !pool.partners.is_empty();
        overlap.count("pairs", join_pairs.len());
        overlap.count("genes", genes.len());
        if !has_targets {
            overlap.warn("no targets resolved, overlap table not written".to_string());
        } else if join_pairs.is_empty() {
            overlap.warn("no overlap between targets and reference genes".to_string());
        }
        if writable && has_targets {
            let path = self.config.output_dir().join(OVERLAP_FILE);
            let result = write_overlap_table(&path, &join_pairs);
            overlap.output(&path, result);
            let path = self.config.output_dir().join(OVERLAPPING_GENES_FILE);
            let result = write_overlapping_genes(&path, &join_pairs);
            overlap.output(&path, result);
        }
        reports.push(overlap);

        // Network
        let mut network = StageReport::new("network");
        let downstream = has_targets.then_some(&join_pairs);
        let graph = GraphAssembler::new(self.config.network.allow_partial)
            .assemble(upstream, downstream);
        match &graph {
            Some(graph) => {
                network.count("nodes", graph.node_count());
                network.count("edges", graph.edge_count());
                if writable {
                    let path = self.config.output_dir().join(NETWORK_JSON);
                    network.output(&path, graph.write_json(&path));
                    let path = self.config.output_dir().join(NETWORK_GRAPHML);
                    network.output(&path, graph.write_graphml(&path));
                }
            }
            None => network.warn("no downstream layer, network not built".to_string()),
        }
        reports.push(network);

        // Hubs
        let mut hub_report = StageReport::new("hubs");
        let hub_list = graph.as_ref().map(hubs).unwrap_or_default();
        hub_report.count("hubs", hub_list.len());
        if graph.is_some() && writable {
            let path = self.config.output_dir().join(HUB_FILE);
            hub_report.output(&path, write_hub_table(&path, &hub_list));
        }
        reports.push(hub_report);

        // Report
        let mut summary = StageReport::new("report");
        let rows = interaction_rows(upstream, &join_pairs);
        let summaries = gene_summaries(&rows);
        summary.count("interactions", rows.len());
        summary.count("genes", summaries.len());
        if rows.is_empty() {
            summary.warn("no interactions to report".to_string());
        } else if writable {
            let path = self.config.output_dir().join(INTERACTIONS_FILE);
            summary.output(&path, write_interaction_rows(&path, &rows));
            let path = self.config.output_dir().join(SUMMARY_FILE);
            summary.output(&path, write_gene_summaries(&path, &summaries));
        }
        reports.push(summary);

        NetworkRun {
            pool,
            join_pairs,
            graph,
            hubs: hub_list,
            reports,
        }
    }

    /// STRING network among `genes`, its hubs and the hub neighbourhood
    pub async fn run_ppi(&self, client: &StringDbClient, genes: &[String]) -> PpiRun {
        let mut report = StageReport::new("ppi");
        let graph = client.fetch_network(genes).await;
        report.count("nodes", graph.node_count());
        report.count("edges", graph.edge_count());
        if graph.is_empty() {
            report.warn("no PPI network built".to_string());
            return PpiRun {
                graph,
                reports: vec![report],
                ..Default::default()
            };
        }

        let hub_list = hubs(&graph);
        let hub_graph = induced_hub_subgraph(&graph, &hub_list);
        report.count("hubs", hub_list.len());

        if self.output_dir(&mut report) {
            let dir = self.config.output_dir();
            let path = dir.join(PPI_GRAPHML);
            report.output(&path, graph.write_graphml(&path));
            let path = dir.join(HUB_FILE);
            report.output(&path, write_hub_table(&path, &hub_list));
            let path = dir.join(PPI_HUB_GRAPHML);
            report.output(&path, hub_graph.write_graphml(&path));
        }

        PpiRun {
            graph,
            hubs: hub_list,
            hub_graph,
            reports: vec![report],
        }
    }
}
