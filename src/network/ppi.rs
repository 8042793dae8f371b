//! Protein–protein interaction graph fetched from STRING.

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use super::export::GraphmlDocument;
use super::hubs::DegreeGraph;
use crate::config::Config;
use crate::error::{RegnetError, Result};
use crate::resolver::http::{build_client, check_status, relax_tls, transport_error, Trust};

const CALLER_IDENTITY: &str = "regnet";
const TRUST: Trust = Trust::Authoritative;

/// Undirected gene graph weighted by STRING combined score
#[derive(Debug, Clone, Default)]
pub struct PpiGraph {
    graph: UnGraph<String, f64>,
    index: HashMap<String, NodeIndex>,
}

#[derive(Debug, Deserialize)]
struct StringInteraction {
    #[serde(rename = "preferredName_A")]
    a: String,
    #[serde(rename = "preferredName_B")]
    b: String,
    score: f64,
}

impl PpiGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_graph(graph: UnGraph<String, f64>) -> Self {
        let index = graph
            .node_indices()
            .map(|idx| (graph[idx].clone(), idx))
            .collect();
        Self { graph, index }
    }

    fn node(&mut self, gene: &str) -> NodeIndex {
        if let Some(idx) = self.index.get(gene) {
            return *idx;
        }
        let idx = self.graph.add_node(gene.to_string());
        self.index.insert(gene.to_string(), idx);
        idx
    }

    /// Add or reweight the edge between two genes
    pub fn add_interaction(&mut self, a: &str, b: &str, score: f64) {
        let a = self.node(a);
        let b = self.node(b);
        match self.graph.find_edge(a, b) {
            Some(edge) => self.graph[edge] = score,
            None => {
                self.graph.add_edge(a, b, score);
            }
        }
    }

    /// Parse a STRING `tsv/network` body
    ///
    /// An empty body is an empty graph; a body without the expected columns
    /// is a parse error.
    pub fn from_tsv(body: &str) -> Result<Self> {
        let mut graph = PpiGraph::new();
        if body.trim().is_empty() {
            return Ok(graph);
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_reader(body.as_bytes());

        let headers = reader.headers()?.clone();
        for column in ["preferredName_A", "preferredName_B", "score"] {
            if !headers.iter().any(|h| h == column) {
                return Err(RegnetError::Parse(format!(
                    "STRING response lacks column {}",
                    column
                )));
            }
        }

        for row in reader.deserialize::<StringInteraction>() {
            let row = row?;
            graph.add_interaction(&row.a, &row.b, row.score);
        }
        Ok(graph)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains_node(&self, gene: &str) -> bool {
        self.index.contains_key(gene)
    }

    pub fn contains_edge(&self, a: &str, b: &str) -> bool {
        match (self.index.get(a), self.index.get(b)) {
            (Some(a), Some(b)) => self.graph.find_edge(*a, *b).is_some(),
            _ => false,
        }
    }

    pub fn weight(&self, a: &str, b: &str) -> Option<f64> {
        let (a, b) = (self.index.get(a)?, self.index.get(b)?);
        self.graph.find_edge(*a, *b).map(|e| self.graph[e])
    }

    pub fn to_graphml(&self) -> Result<String> {
        let mut doc = GraphmlDocument::new(false);
        doc.key("weight", "edge", "double");

        let mut genes: Vec<&String> = self.graph.node_weights().collect();
        genes.sort();
        doc.nodes = genes.into_iter().map(|g| (g.clone(), Vec::new())).collect();

        let mut edges: Vec<(String, String, f64)> = self
            .graph
            .edge_references()
            .map(|e| {
                let (a, b) = (&self.graph[e.source()], &self.graph[e.target()]);
                let (a, b) = if a <= b { (a, b) } else { (b, a) };
                (a.clone(), b.clone(), *e.weight())
            })
            .collect();
        edges.sort_by(|x, y| (&x.0, &x.1).cmp(&(&y.0, &y.1)));
        doc.edges = edges
            .into_iter()
            .map(|(a, b, w)| (a, b, vec![("weight", w.to_string())]))
            .collect();

        doc.render()
    }

    pub fn write_graphml(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_graphml()?)?;
        Ok(())
    }
}

impl DegreeGraph for PpiGraph {
    fn degrees(&self) -> BTreeMap<String, usize> {
        self.graph
            .node_indices()
            .map(|idx| (self.graph[idx].clone(), self.graph.edges(idx).count()))
            .collect()
    }

    fn neighbors(&self, node: &str) -> BTreeSet<String> {
        self.index
            .get(node)
            .map(|idx| {
                self.graph
                    .neighbors(*idx)
                    .map(|n| self.graph[n].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn induced_subgraph(&self, keep: &BTreeSet<String>) -> Self {
        let graph = self.graph.filter_map(
            |_, gene| keep.contains(gene).then(|| gene.clone()),
            |_, weight| Some(*weight),
        );
        Self::from_graph(graph)
    }
}

/// Client for the STRING `tsv/network` endpoint
pub struct StringDbClient {
    client: reqwest::Client,
    base_url: String,
    taxon_id: u32,
    min_confidence: u32,
    relaxed_tls: bool,
}

impl StringDbClient {
    /// STRING is an authoritative API, so `resolver.accept_invalid_certs` is ignored
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: build_client(&config.resolver, TRUST)?,
            relaxed_tls: relax_tls(&config.resolver, TRUST),
            base_url: config.sources.string_url.trim_end_matches('/').to_string(),
            taxon_id: config.sources.taxon_id,
            min_confidence: config.sources.min_confidence,
        })
    }

    pub fn relaxed_tls(&self) -> bool {
        self.relaxed_tls
    }

    async fn request(&self, genes: &[String]) -> Result<String> {
        let url = format!("{}/tsv/network", self.base_url);
        let form = [
            ("identifiers", genes.join("\r")),
            ("species", self.taxon_id.to_string()),
            ("required_score", self.min_confidence.to_string()),
            ("caller_identity", CALLER_IDENTITY.to_string()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| transport_error("STRING", e))?;

        if !check_status("STRING", response.status())? {
            return Ok(String::new());
        }
        response.text().await.map_err(|e| transport_error("STRING", e))
    }

    /// Fetch the interaction network among `genes`
    ///
    /// Network and parse failures are logged and yield an empty graph.
    pub async fn fetch_network(&self, genes: &[String]) -> PpiGraph {
        if genes.is_empty() {
            log::warn!("No genes given, PPI network is empty");
            return PpiGraph::new();
        }

        log::info!(
            "Building PPI network for {} genes (min confidence {})",
            genes.len(),
            self.min_confidence
        );

        let graph = match self.request(genes).await {
            Ok(body) => PpiGraph::from_tsv(&body).unwrap_or_else(|e| {
                log::error!("Unreadable STRING response: {}", e);
                PpiGraph::new()
            }),
            Err(e) => {
                log::error!("Error fetching STRING interactions: {}", e);
                PpiGraph::new()
            }
        };

        if graph.is_empty() {
            log::warn!("No interactions from STRING");
        } else {
            log::info!("PPI: {} nodes, {} edges", graph.node_count(), graph.edge_count());
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{hubs, induced_hub_subgraph};

    const BODY: &str = "stringId_A\tstringId_B\tpreferredName_A\tpreferredName_B\tncbiTaxonId\tscore\n\
9606.a\t9606.b\tTP53\tMDM2\t9606\t0.999\n\
9606.a\t9606.c\tTP53\tEP300\t9606\t0.95\n\
9606.a\t9606.d\tTP53\tATM\t9606\t0.9\n\
9606.b\t9606.a\tMDM2\tTP53\t9606\t0.998\n\
9606.e\t9606.f\tKRAS\tRAF1\t9606\t0.8\n";

    #[test]
    fn test_from_tsv_dedupes_undirected_edges() {
        let graph = PpiGraph::from_tsv(BODY).unwrap();
        assert_eq!(graph.node_count(), 6);
        assert_eq!(graph.edge_count(), 4);
        assert!(graph.contains_edge("MDM2", "TP53"));
        assert_eq!(graph.weight("TP53", "MDM2"), Some(0.998));
    }

    #[test]
    fn test_from_tsv_empty_and_malformed() {
        assert!(PpiGraph::from_tsv("").unwrap().is_empty());
        let err = PpiGraph::from_tsv("a\tb\nx\ty\n").unwrap_err();
        assert!(matches!(err, RegnetError::Parse(_)));
    }

    #[test]
    fn test_ppi_hubs_and_subgraph() {
        let graph = PpiGraph::from_tsv(BODY).unwrap();
        // degrees: TP53 3, others 1; mean 8/6
        let hub_list = hubs(&graph);
        assert_eq!(hub_list.len(), 1);
        assert_eq!(hub_list[0].gene, "TP53");

        let sub = induced_hub_subgraph(&graph, &hub_list);
        assert_eq!(sub.node_count(), 4);
        assert_eq!(sub.edge_count(), 3);
        assert!(!sub.contains_node("KRAS"));
    }

    #[test]
    fn test_graphml_is_undirected_and_weighted() {
        let xml = PpiGraph::from_tsv(BODY).unwrap().to_graphml().unwrap();
        assert!(xml.contains(r#"edgedefault="undirected""#));
        assert!(xml.contains(r#"attr.type="double""#));
        assert!(xml.contains(r#"<edge source="MDM2" target="TP53">"#));
    }

    #[test]
    fn test_string_client_always_verifies_certificates() {
        let mut config = Config::default();
        config.resolver.accept_invalid_certs = true;
        let client = StringDbClient::new(&config).unwrap();
        assert!(!client.relaxed_tls());
    }

    #[tokio::test]
    async fn test_fetch_network_unreachable_is_empty() {
        let mut config = Config::default();
        config.sources.string_url = "http://127.0.0.1:9".to_string();
        config.resolver.timeout_secs = 2;
        let client = StringDbClient::new(&config).unwrap();
        let graph = client.fetch_network(&["TP53".to_string()]).await;
        assert!(graph.is_empty());
    }
}
