//! CircInteractome site tables and their preparation for the site classifier.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Column holding "<circ id> ... <mirna id>" in each site row
pub const ID_COLUMN: &str = "TargetScan miRNA predictions_CircRNA Mirbase ID";
pub const SITE_TYPE_COLUMN: &str = "TargetScan miRNA predictions_Site Type";

const CIRC_START: &str = "TargetScan miRNA predictions_CircRNA Start";
const CIRC_END: &str = "TargetScan miRNA predictions_CircRNA End";
const THREE_PRIME_PAIRING: &str = "TargetScan miRNA predictions_3' pairing";
const LOCAL_AU: &str = "TargetScan miRNA predictions_local AU";
const POSITION: &str = "TargetScan miRNA predictions_position";
const TA: &str = "TargetScan miRNA predictions_TA";
const SPS: &str = "TargetScan miRNA predictions_SPS";
const CONTEXT_SCORE: &str = "TargetScan miRNA predictions_context+ score";
const CONTEXT_PERCENTILE: &str = "TargetScan miRNA predictions_context+ score percentile";

/// Raw tabular snapshot as scraped, flattened headers included
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SiteTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Columns present and every row as wide as the header
    pub fn is_well_formed(&self) -> bool {
        !self.columns.is_empty() && self.rows.iter().all(|r| r.len() == self.columns.len())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn cell(&self, row: &[String], column: Option<usize>) -> Option<String> {
        column.and_then(|idx| row.get(idx)).map(|s| s.trim().to_string())
    }

    /// Distinct miRNA IDs named in the ID column
    pub fn partner_ids(&self) -> BTreeSet<String> {
        let Some(idx) = self.column_index(ID_COLUMN) else {
            return BTreeSet::new();
        };

        self.rows
            .iter()
            .filter_map(|row| row.get(idx))
            .map(|text| split_site_id(text).1)
            .filter(|mirna| mirna != "none")
            .collect()
    }
}

/// Split an ID cell into (circ id, mirna id)
///
/// The circ id is the first token; the miRNA is the first token containing
/// `hsa-miR-`, or `none`.
pub fn split_site_id(text: &str) -> (String, String) {
    let text = text.replace('\u{a0}', " ");
    let mut pieces = text.split_whitespace();
    let circ = pieces.next().unwrap_or_default().to_string();
    let mirna = text
        .split_whitespace()
        .find(|p| p.contains("hsa-miR-"))
        .unwrap_or("none")
        .to_string();
    (circ, mirna)
}

/// One cleaned site row, the unit the classifier scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRow {
    pub circ_id: String,
    pub mirna_id: String,
    /// Site type as reported by TargetScan, if the column exists
    #[serde(default)]
    pub reported_site_type: Option<String>,
    pub circ_start: f64,
    pub circ_end: f64,
    pub three_prime_pairing: f64,
    pub local_au: f64,
    pub position: f64,
    pub ta: f64,
    pub sps: f64,
    pub context_score: f64,
    pub context_percentile: f64,
}

impl SiteRow {
    /// Feature vector in model column order: start, end, local AU, TA, context+ percentile
    pub fn model_inputs(&self) -> [f64; 5] {
        [
            self.circ_start,
            self.circ_end,
            self.local_au,
            self.ta,
            self.context_percentile,
        ]
    }
}

fn numeric(value: Option<String>) -> f64 {
    value
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Clean a scraped table into classifier-ready rows
///
/// Returns `None` when the table lacks the ID column. Missing or non-numeric
/// feature cells become 0.
pub fn prepare_sites(table: &SiteTable) -> Option<Vec<SiteRow>> {
    if table.is_empty() {
        return None;
    }
    let id_idx = table.column_index(ID_COLUMN)?;
    let col = |name: &str| table.column_index(name);
    let (start, end, pairing, au, pos, ta, sps, ctx, pct, site_type) = (
        col(CIRC_START),
        col(CIRC_END),
        col(THREE_PRIME_PAIRING),
        col(LOCAL_AU),
        col(POSITION),
        col(TA),
        col(SPS),
        col(CONTEXT_SCORE),
        col(CONTEXT_PERCENTILE),
        col(SITE_TYPE_COLUMN),
    );

    let rows = table
        .rows
        .iter()
        .map(|row| {
            let id_text = row.get(id_idx).map(String::as_str).unwrap_or("missing");
            let (circ_id, mirna_id) = split_site_id(id_text);
            SiteRow {
                circ_id,
                mirna_id,
                reported_site_type: table.cell(row, site_type).filter(|s| !s.is_empty()),
                circ_start: numeric(table.cell(row, start)),
                circ_end: numeric(table.cell(row, end)),
                three_prime_pairing: numeric(table.cell(row, pairing)),
                local_au: numeric(table.cell(row, au)),
                position: numeric(table.cell(row, pos)),
                ta: numeric(table.cell(row, ta)),
                sps: numeric(table.cell(row, sps)),
                context_score: numeric(table.cell(row, ctx)),
                context_percentile: numeric(table.cell(row, pct)),
            }
        })
        .collect();

    Some(rows)
}

#[cfg(test)]
pub(crate) fn sample_table() -> SiteTable {
    let columns = vec![
        ID_COLUMN.to_string(),
        SITE_TYPE_COLUMN.to_string(),
        CIRC_START.to_string(),
        CIRC_END.to_string(),
        LOCAL_AU.to_string(),
        CONTEXT_PERCENTILE.to_string(),
    ];
    let rows = vec![
        vec![
            "hsa_circ_0000284\u{a0}3'UTR hsa-miR-7-5p".to_string(),
            "8mer-1a".to_string(),
            "120".to_string(),
            "127".to_string(),
            "0.61".to_string(),
            "97".to_string(),
        ],
        vec![
            "hsa_circ_0000284 hsa-miR-21-5p".to_string(),
            "7mer-1a".to_string(),
            "300".to_string(),
            "n/a".to_string(),
            "".to_string(),
            "42".to_string(),
        ],
        vec![
            "hsa_circ_0000284 unknown".to_string(),
            "".to_string(),
            "1".to_string(),
            "2".to_string(),
            "0.1".to_string(),
            "3".to_string(),
        ],
    ];
    SiteTable::new(columns, rows)
}
