//! Regulatory network: typed nodes, layered directed edges, assembly,
//! export and hub analysis.
//!
//! The graph is a petgraph `DiGraph` with a name index, rebuilt from scratch
//! on every run.

mod assemble;
mod export;
mod hubs;
mod ppi;

pub use assemble::GraphAssembler;
pub use export::{EdgeExport, GraphExport, NodeExport};
pub use hubs::{
    hubs, hubs_from_degrees, induced_hub_subgraph, mean_degree, write_hub_table,
    DegreeGraph, HubRecord,
};
pub use ppi::{PpiGraph, StringDbClient};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::error::{RegnetError, Result};

/// Layer a node belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "circRNA")]
    Upstream,
    #[serde(rename = "miRNA")]
    Mid,
    #[serde(rename = "mRNA")]
    Downstream,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Upstream => "circRNA",
            NodeKind::Mid => "miRNA",
            NodeKind::Downstream => "mRNA",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge layer; fixes the kinds of both endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Layer {
    #[serde(rename = "circRNA→miRNA")]
    UpstreamToMid,
    #[serde(rename = "miRNA→mRNA")]
    MidToDownstream,
}

impl Layer {
    pub fn source_kind(self) -> NodeKind {
        match self {
            Layer::UpstreamToMid => NodeKind::Upstream,
            Layer::MidToDownstream => NodeKind::Mid,
        }
    }

    pub fn target_kind(self) -> NodeKind {
        match self {
            Layer::UpstreamToMid => NodeKind::Mid,
            Layer::MidToDownstream => NodeKind::Downstream,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Layer::UpstreamToMid => "circRNA→miRNA",
            Layer::MidToDownstream => "miRNA→mRNA",
        }
    }
}

/// Directed, layer-typed interaction
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InteractionEdge {
    pub source: String,
    pub target: String,
    pub layer: Layer,
}

impl InteractionEdge {
    pub fn new(source: &str, target: &str, layer: Layer) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            layer,
        }
    }
}

/// Node payload stored in the petgraph graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
}

/// Typed directed multi-layer graph
#[derive(Debug, Clone, Default)]
pub struct RegulatoryGraph {
    graph: DiGraph<GraphNode, Layer>,
    index: HashMap<String, NodeIndex>,
}

impl RegulatoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_graph(graph: DiGraph<GraphNode, Layer>) -> Self {
        let index = graph
            .node_indices()
            .map(|idx| (graph[idx].id.clone(), idx))
            .collect();
        Self { graph, index }
    }

    fn check_kind(&self, id: &str, kind: NodeKind) -> Result<()> {
        match self.node_kind(id) {
            Some(existing) if existing != kind => Err(RegnetError::NodeTypeConflict {
                node: id.to_string(),
                existing: existing.to_string(),
                requested: kind.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Insert a node, or return the existing one when the kind matches
    pub fn add_node(&mut self, id: &str, kind: NodeKind) -> Result<NodeIndex> {
        self.check_kind(id, kind)?;
        if let Some(idx) = self.index.get(id) {
            return Ok(*idx);
        }
        let idx = self.graph.add_node(GraphNode {
            id: id.to_string(),
            kind,
        });
        self.index.insert(id.to_string(), idx);
        Ok(idx)
    }

    /// Insert an edge and its endpoints. Returns `false` if it already existed.
    ///
    /// Both endpoint kinds are checked before anything is inserted, so a
    /// conflicting edge leaves the graph untouched.
    pub fn add_edge(&mut self, edge: &InteractionEdge) -> Result<bool> {
        self.check_kind(&edge.source, edge.layer.source_kind())?;
        self.check_kind(&edge.target, edge.layer.target_kind())?;

        let source = self.add_node(&edge.source, edge.layer.source_kind())?;
        let target = self.add_node(&edge.target, edge.layer.target_kind())?;

        if self
            .graph
            .edges_connecting(source, target)
            .any(|e| *e.weight() == edge.layer)
        {
            return Ok(false);
        }
        self.graph.add_edge(source, target, edge.layer);
        Ok(true)
    }

    pub fn node_kind(&self, id: &str) -> Option<NodeKind> {
        self.index.get(id).map(|idx| self.graph[*idx].kind)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn contains_edge(&self, source: &str, target: &str, layer: Layer) -> bool {
        match (self.index.get(source), self.index.get(target)) {
            (Some(s), Some(t)) => self.graph.edges_connecting(*s, *t).any(|e| *e.weight() == layer),
            _ => false,
        }
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

    pub fn count_kind(&self, kind: NodeKind) -> usize {
        self.graph.node_weights().filter(|n| n.kind == kind).count()
    }

    /// All nodes, ordered by id
    pub fn nodes(&self) -> BTreeMap<String, NodeKind> {
        self.graph
            .node_weights()
            .map(|n| (n.id.clone(), n.kind))
            .collect()
    }

    /// All edges, ordered
    pub fn edges(&self) -> BTreeSet<InteractionEdge> {
        self.graph
            .edge_references()
            .map(|e| InteractionEdge {
                source: self.graph[e.source()].id.clone(),
                target: self.graph[e.target()].id.clone(),
                layer: *e.weight(),
            })
            .collect()
    }

    /// In-degree plus out-degree of a node
    pub fn degree(&self, id: &str) -> usize {
        self.index
            .get(id)
            .map(|idx| {
                self.graph.edges_directed(*idx, Direction::Outgoing).count()
                    + self.graph.edges_directed(*idx, Direction::Incoming).count()
            })
            .unwrap_or(0)
    }
}

impl DegreeGraph for RegulatoryGraph {
    fn degrees(&self) -> BTreeMap<String, usize> {
        self.graph
            .node_weights()
            .map(|n| (n.id.clone(), self.degree(&n.id)))
            .collect()
    }

    fn neighbors(&self, node: &str) -> BTreeSet<String> {
        self.index
            .get(node)
            .map(|idx| {
                self.graph
                    .neighbors_undirected(*idx)
                    .map(|n| self.graph[n].id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn induced_subgraph(&self, keep: &BTreeSet<String>) -> Self {
        let graph = self.graph.filter_map(
            |_, node| keep.contains(&node.id).then(|| node.clone()),
            |_, layer| Some(*layer),
        );
        Self::from_graph(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_edge_assigns_kinds() {
        let mut graph = RegulatoryGraph::new();
        assert!(graph
            .add_edge(&InteractionEdge::new("circA", "m1", Layer::UpstreamToMid))
            .unwrap());
        assert!(graph
            .add_edge(&InteractionEdge::new("m1", "G1", Layer::MidToDownstream))
            .unwrap());

        assert_eq!(graph.node_kind("circA"), Some(NodeKind::Upstream));
        assert_eq!(graph.node_kind("m1"), Some(NodeKind::Mid));
        assert_eq!(graph.node_kind("G1"), Some(NodeKind::Downstream));
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_duplicate_edge_collapses() {
        let mut graph = RegulatoryGraph::new();
        let edge = InteractionEdge::new("circA", "m1", Layer::UpstreamToMid);
        assert!(graph.add_edge(&edge).unwrap());
        assert!(!graph.add_edge(&edge).unwrap());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_kind_conflict_is_rejected_without_side_effects() {
        let mut graph = RegulatoryGraph::new();
        graph
            .add_edge(&InteractionEdge::new("circA", "m1", Layer::UpstreamToMid))
            .unwrap();

        // m1 is a miRNA; using it as a circRNA must fail, and G9 must not appear
        let err = graph
            .add_edge(&InteractionEdge::new("G9", "circA", Layer::MidToDownstream))
            .unwrap_err();
        assert!(matches!(err, RegnetError::NodeTypeConflict { .. }));
        assert!(!graph.contains_node("G9"));
        assert_eq!(graph.node_kind("circA"), Some(NodeKind::Upstream));
    }

    #[test]
    fn test_degree_counts_both_directions() {
        let mut graph = RegulatoryGraph::new();
        for edge in [
            InteractionEdge::new("circA", "m1", Layer::UpstreamToMid),
            InteractionEdge::new("circB", "m1", Layer::UpstreamToMid),
            InteractionEdge::new("m1", "G1", Layer::MidToDownstream),
        ] {
            graph.add_edge(&edge).unwrap();
        }
        assert_eq!(graph.degree("m1"), 3);
        assert_eq!(graph.degree("circA"), 1);
        assert_eq!(graph.degree("missing"), 0);
        assert_eq!(
            graph.neighbors("m1"),
            ["G1", "circA", "circB"].iter().map(|s| s.to_string()).collect()
        );
    }
}
