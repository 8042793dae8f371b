//! Multi-layer graph assembly from prediction edges and overlap pairs.

use std::collections::BTreeSet;

use super::{InteractionEdge, Layer, NodeKind, RegulatoryGraph};

static EMPTY: BTreeSet<(String, String)> = BTreeSet::new();

/// Builds a [`RegulatoryGraph`] from upstream edges and join pairs
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphAssembler {
    allow_partial: bool,
}

impl GraphAssembler {
    /// `allow_partial`: return an upstream-only graph when the join stage had no input
    pub fn new(allow_partial: bool) -> Self {
        Self { allow_partial }
    }

    /// Assemble the graph, or `None` when there is no downstream layer
    ///
    /// `join_pairs` is `None` when the join stage had no input at all (no
    /// targets were resolved). `Some` with zero pairs is a join that ran and
    /// matched nothing; the upstream edges still form a graph. `None` is
    /// distinct from a graph with zero edges. With zero upstream edges and
    /// zero join pairs the result is always `None`.
    pub fn assemble(
        &self,
        upstream_edges: &BTreeSet<InteractionEdge>,
        join_pairs: Option<&BTreeSet<(String, String)>>,
    ) -> Option<RegulatoryGraph> {
        let join_pairs = match join_pairs {
            Some(pairs) => {
                if pairs.is_empty() && upstream_edges.is_empty() {
                    log::warn!("No edges to assemble, skipping network construction");
                    return None;
                }
                if pairs.is_empty() {
                    log::warn!("No miRNA–mRNA pairs overlap the reference set");
                }
                pairs
            }
            None => {
                if !self.allow_partial || upstream_edges.is_empty() {
                    log::warn!("No miRNA–mRNA layer available, skipping network construction");
                    return None;
                }
                log::warn!("No miRNA–mRNA layer available, building upstream-only network");
                &EMPTY
            }
        };

        let mut graph = RegulatoryGraph::new();
        let mut skipped = 0usize;

        let downstream = join_pairs
            .iter()
            .map(|(mid, gene)| InteractionEdge::new(mid, gene, Layer::MidToDownstream));

        for edge in upstream_edges.iter().cloned().chain(downstream) {
            if let Err(e) = graph.add_edge(&edge) {
                log::warn!("Skipping edge {} → {}: {}", edge.source, edge.target, e);
                skipped += 1;
            }
        }

        log::info!(
            "Network: {} nodes, {} edges ({} circRNAs, {} miRNAs, {} mRNAs)",
            graph.node_count(),
            graph.edge_count(),
            graph.count_kind(NodeKind::Upstream),
            graph.count_kind(NodeKind::Mid),
            graph.count_kind(NodeKind::Downstream),
        );
        if skipped > 0 {
            log::warn!("{} edges skipped because of node type conflicts", skipped);
        }

        Some(graph)
    }
}
