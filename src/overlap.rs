//! Intersection of resolved partners with the reference gene set.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::Result;

pub const OVERLAP_FILE: &str = "overlapping_mrnas.csv";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct OverlapRow {
    mirna: String,
    gene: String,
}

/// Flatten a partner map into `(entity, partner)` pairs
pub fn partner_pairs(partners: &BTreeMap<String, BTreeSet<String>>) -> BTreeSet<(String, String)> {
    partners
        .iter()
        .flat_map(|(entity, genes)| genes.iter().map(move |g| (entity.clone(), g.clone())))
        .collect()
}

/// Keep pairs whose partner is in `reference`, ignoring case
///
/// The output carries the entity unchanged and the partner uppercased.
pub fn join(
    pairs: &BTreeSet<(String, String)>,
    reference: &BTreeSet<String>,
) -> BTreeSet<(String, String)> {
    let reference: BTreeSet<String> = reference.iter().map(|g| g.to_uppercase()).collect();

    let joined: BTreeSet<(String, String)> = pairs
        .iter()
        .map(|(entity, partner)| (entity.clone(), partner.to_uppercase()))
        .filter(|(_, partner)| reference.contains(partner))
        .collect();

    let genes: BTreeSet<&String> = joined.iter().map(|(_, g)| g).collect();
    log::info!(
        "Overlaps found: {} pairs | {} unique genes",
        joined.len(),
        genes.len()
    );
    joined
}

/// Write pairs as `mirna,gene` CSV
pub fn write_overlap_table(path: &Path, pairs: &BTreeSet<(String, String)>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    if pairs.is_empty() {
        writer.write_record(["mirna", "gene"])?;
    }
    for (mirna, gene) in pairs {
        writer.serialize(OverlapRow {
            mirna: mirna.clone(),
            gene: gene.clone(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a `mirna,gene` table; `Ok(None)` when the file does not exist
pub fn read_overlap_table(path: &Path) -> Result<Option<BTreeSet<(String, String)>>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut pairs = BTreeSet::new();
    for row in reader.deserialize::<OverlapRow>() {
        let row = row?;
        pairs.insert((row.mirna, row.gene));
    }
    Ok(Some(pairs))
}
