//! Degree-based hub extraction.
//!
//! Hubs are nodes whose degree is strictly above the graph's mean degree.
//! Results are recomputed for every call and never cached.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::Result;

/// Graph view needed for hub analysis
pub trait DegreeGraph: Sized {
    /// Degree of every node (incident edges, both directions)
    fn degrees(&self) -> BTreeMap<String, usize>;

    /// Direct neighbours of `node`, either direction
    fn neighbors(&self, node: &str) -> BTreeSet<String>;

    /// `keep` plus every edge between two kept nodes
    fn induced_subgraph(&self, keep: &BTreeSet<String>) -> Self;
}

/// One hub node and its degree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubRecord {
    #[serde(rename = "Gene")]
    pub gene: String,
    #[serde(rename = "Degree")]
    pub degree: usize,
}

/// Arithmetic mean degree, 0 for an empty graph
pub fn mean_degree(degrees: &BTreeMap<String, usize>) -> f64 {
    if degrees.is_empty() {
        return 0.0;
    }
    degrees.values().sum::<usize>() as f64 / degrees.len() as f64
}

/// Hubs from a precomputed degree map, highest degree first
pub fn hubs_from_degrees(degrees: &BTreeMap<String, usize>) -> Vec<HubRecord> {
    let threshold = mean_degree(degrees);
    let mut hubs: Vec<HubRecord> = degrees
        .iter()
        .filter(|(_, &degree)| degree as f64 > threshold)
        .map(|(gene, &degree)| HubRecord {
            gene: gene.clone(),
            degree,
        })
        .collect();
    hubs.sort_by(|a, b| b.degree.cmp(&a.degree).then_with(|| a.gene.cmp(&b.gene)));
    hubs
}

/// Hub records for a graph
pub fn hubs<G: DegreeGraph>(graph: &G) -> Vec<HubRecord> {
    let degrees = graph.degrees();
    if degrees.is_empty() {
        log::warn!("Network is empty, no hub genes");
        return Vec::new();
    }
    let hubs = hubs_from_degrees(&degrees);
    log::info!(
        "{} hub genes (degree > mean {:.2})",
        hubs.len(),
        mean_degree(&degrees)
    );
    hubs
}

/// Hubs plus their direct neighbours, as an induced subgraph
pub fn induced_hub_subgraph<G: DegreeGraph>(graph: &G, hubs: &[HubRecord]) -> G {
    let mut keep: BTreeSet<String> = hubs.iter().map(|h| h.gene.clone()).collect();
    for hub in hubs {
        keep.extend(graph.neighbors(&hub.gene));
    }
    graph.induced_subgraph(&keep)
}

/// Write hubs as `Gene,Degree` CSV
pub fn write_hub_table(path: &Path, hubs: &[HubRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    if hubs.is_empty() {
        writer.write_record(["Gene", "Degree"])?;
    }
    for hub in hubs {
        writer.serialize(hub)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{InteractionEdge, Layer, RegulatoryGraph};
    use tempfile::TempDir;

    fn degree_map(items: &[(&str, usize)]) -> BTreeMap<String, usize> {
        items.iter().map(|(n, d)| (n.to_string(), *d)).collect()
    }

    #[test]
    fn test_hub_threshold_strictly_above_mean() {
        let degrees = degree_map(&[("A", 1), ("B", 1), ("C", 1), ("D", 5)]);
        assert_eq!(mean_degree(&degrees), 2.0);
        assert_eq!(
            hubs_from_degrees(&degrees),
            vec![HubRecord {
                gene: "D".to_string(),
                degree: 5
            }]
        );
    }

    #[test]
    fn test_uniform_degrees_have_no_hubs() {
        let degrees = degree_map(&[("A", 2), ("B", 2), ("C", 2)]);
        assert!(hubs_from_degrees(&degrees).is_empty());
    }

    #[test]
    fn test_empty_graph() {
        let graph = RegulatoryGraph::new();
        assert_eq!(mean_degree(&BTreeMap::new()), 0.0);
        assert!(hubs(&graph).is_empty());
        assert!(induced_hub_subgraph(&graph, &[]).is_empty());
    }

    #[test]
    fn test_hubs_sorted_by_degree_then_name() {
        let degrees = degree_map(&[("B", 4), ("A", 4), ("C", 6), ("D", 0), ("E", 0), ("F", 0)]);
        let names: Vec<String> = hubs_from_degrees(&degrees).into_iter().map(|h| h.gene).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_induced_subgraph_keeps_hub_neighbourhood() {
        // m1 is the hub: circA, circB → m1 → G1; m2 hangs off circC only
        let mut graph = RegulatoryGraph::new();
        for edge in [
            InteractionEdge::new("circA", "m1", Layer::UpstreamToMid),
            InteractionEdge::new("circB", "m1", Layer::UpstreamToMid),
            InteractionEdge::new("m1", "G1", Layer::MidToDownstream),
            InteractionEdge::new("circC", "m2", Layer::UpstreamToMid),
        ] {
            graph.add_edge(&edge).unwrap();
        }

        let hub_list = hubs(&graph);
        assert_eq!(hub_list.len(), 1);
        assert_eq!(hub_list[0].gene, "m1");
        assert_eq!(hub_list[0].degree, 3);

        let sub = induced_hub_subgraph(&graph, &hub_list);
        assert_eq!(sub.node_count(), 4);
        assert_eq!(sub.edge_count(), 3);
        assert!(!sub.contains_node("circC"));
        assert!(sub.contains_edge("circB", "m1", Layer::UpstreamToMid));
    }

    #[test]
    fn test_write_hub_table() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hub_genes.csv");
        write_hub_table(
            &path,
            &[HubRecord {
                gene: "TP53".to_string(),
                degree: 12,
            }],
        )
        .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Gene,Degree\nTP53,12\n");

        write_hub_table(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Gene,Degree\n");
    }
}
