//! Input ID lists: circRNAs, miRNAs, reference genes.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{RegnetError, Result};

fn read_lines(path: &Path) -> Result<BTreeSet<String>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        RegnetError::InvalidInput(format!("cannot read {}: {}", path.display(), e))
    })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// One ID per line, trimmed; blank lines skipped
///
/// `kind` only names the list in the error for an empty file.
pub fn load_id_set(path: &Path, kind: &str) -> Result<BTreeSet<String>> {
    let ids = read_lines(path)?;
    if ids.is_empty() {
        return Err(RegnetError::InvalidInput(format!(
            "no {} IDs in {}",
            kind,
            path.display()
        )));
    }
    log::info!("{} IDs loaded: {}", kind, ids.len());
    Ok(ids)
}

/// Reference gene set (DEGs), uppercased
pub fn load_reference_set(path: &Path) -> Result<BTreeSet<String>> {
    let genes: BTreeSet<String> = read_lines(path)?
        .into_iter()
        .map(|g| g.to_uppercase())
        .collect();
    if genes.is_empty() {
        return Err(RegnetError::InvalidInput(format!(
            "no reference genes in {}",
            path.display()
        )));
    }
    log::info!("Reference genes loaded: {}", genes.len());
    Ok(genes)
}

/// The `Gene` column of a CSV file, blanks dropped, order kept
pub fn load_gene_column(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)?;
    let column = reader
        .headers()?
        .iter()
        .position(|h| h.trim() == "Gene")
        .ok_or_else(|| {
            RegnetError::InvalidInput(format!("{} has no 'Gene' column", path.display()))
        })?;

    let mut seen = BTreeSet::new();
    let mut genes = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(gene) = record.get(column).map(str::trim) {
            if !gene.is_empty() && seen.insert(gene.to_string()) {
                genes.push(gene.to_string());
            }
        }
    }
    Ok(genes)
}
