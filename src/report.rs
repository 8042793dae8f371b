//! Gene-centric interaction report tables.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::Result;
use crate::network::{InteractionEdge, Layer};

const NO_CIRC: &str = "No circRNA interaction";
const FULL_CHAIN: &str = "circRNA→miRNA→mRNA";
const MIRNA_ONLY: &str = "miRNA→mRNA only";

/// One regulatory chain ending in a gene
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct InteractionRow {
    #[serde(rename = "Gene")]
    pub gene: String,
    #[serde(rename = "miRNA")]
    pub mirna: String,
    #[serde(rename = "circRNA")]
    pub circ: String,
    #[serde(rename = "Interaction_Type")]
    pub interaction_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneSummary {
    #[serde(rename = "Gene")]
    pub gene: String,
    #[serde(rename = "Interacting_miRNAs")]
    pub mirnas: String,
    #[serde(rename = "Interacting_circRNAs")]
    pub circs: String,
    #[serde(rename = "Total_miRNAs")]
    pub total_mirnas: usize,
    #[serde(rename = "Total_circRNAs")]
    pub total_circs: usize,
}

#[derive(Serialize)]
struct GeneRow<'a> {
    #[serde(rename = "Gene")]
    gene: &'a str,
}

/// Expand join pairs into circRNA→miRNA→mRNA chains
///
/// A pair whose miRNA has no upstream circRNA yields a single
/// `miRNA→mRNA only` row. Rows are sorted by gene, miRNA, circRNA.
pub fn interaction_rows(
    upstream: &BTreeSet<InteractionEdge>,
    join_pairs: &BTreeSet<(String, String)>,
) -> Vec<InteractionRow> {
    let mut circs_by_mirna: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for edge in upstream.iter().filter(|e| e.layer == Layer::UpstreamToMid) {
        circs_by_mirna
            .entry(edge.target.as_str())
            .or_default()
            .insert(edge.source.as_str());
    }

    let mut rows = Vec::new();
    for (mirna, gene) in join_pairs {
        match circs_by_mirna.get(mirna.as_str()) {
            Some(circs) => rows.extend(circs.iter().map(|circ| InteractionRow {
                gene: gene.clone(),
                mirna: mirna.clone(),
                circ: circ.to_string(),
                interaction_type: FULL_CHAIN.to_string(),
            })),
            None => rows.push(InteractionRow {
                gene: gene.clone(),
                mirna: mirna.clone(),
                circ: NO_CIRC.to_string(),
                interaction_type: MIRNA_ONLY.to_string(),
            }),
        }
    }
    rows.sort();
    rows
}

/// Per-gene aggregate of interaction rows, sorted by gene
pub fn gene_summaries(rows: &[InteractionRow]) -> Vec<GeneSummary> {
    let mut by_gene: BTreeMap<&str, (BTreeSet<&str>, BTreeSet<&str>)> = BTreeMap::new();
    for row in rows {
        let (mirnas, circs) = by_gene.entry(row.gene.as_str()).or_default();
        mirnas.insert(row.mirna.as_str());
        if row.circ != NO_CIRC {
            circs.insert(row.circ.as_str());
        }
    }

    by_gene
        .into_iter()
        .map(|(gene, (mirnas, circs))| GeneSummary {
            gene: gene.to_string(),
            mirnas: mirnas.iter().copied().collect::<Vec<_>>().join(", "),
            circs: if circs.is_empty() {
                "None".to_string()
            } else {
                circs.iter().copied().collect::<Vec<_>>().join(", ")
            },
            total_mirnas: mirnas.len(),
            total_circs: circs.len(),
        })
        .collect()
}

fn write_rows<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    if rows.is_empty() {
        writer.write_record(header)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_interaction_rows(path: &Path, rows: &[InteractionRow]) -> Result<()> {
    write_rows(path, &["Gene", "miRNA", "circRNA", "Interaction_Type"], rows)
}

pub fn write_gene_summaries(path: &Path, summaries: &[GeneSummary]) -> Result<()> {
    write_rows(
        path,
        &[
            "Gene",
            "Interacting_miRNAs",
            "Interacting_circRNAs",
            "Total_miRNAs",
            "Total_circRNAs",
        ],
        summaries,
    )
}

/// Distinct genes from the join, as a one-column `Gene` CSV
pub fn write_overlapping_genes(path: &Path, join_pairs: &BTreeSet<(String, String)>) -> Result<()> {
    let genes: BTreeSet<&str> = join_pairs.iter().map(|(_, g)| g.as_str()).collect();
    let rows: Vec<GeneRow> = genes.into_iter().map(|gene| GeneRow { gene }).collect();
    write_rows(path, &["Gene"], &rows)
}
