//! Site-type predictions: the seam to the external classifier and the
//! derivation of circRNA → miRNA edges from its strong/medium calls.

mod table;

pub use table::{prepare_sites, split_site_id, SiteRow, SiteTable, ID_COLUMN, SITE_TYPE_COLUMN};

#[cfg(test)]
pub(crate) use table::sample_table;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

use crate::error::{RegnetError, Result};
use crate::network::{InteractionEdge, Layer};

/// Suffix of per-circRNA match tables
pub const MATCH_FILE_SUFFIX: &str = "_strong_medium_matches.csv";

/// TargetScan site classes, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SiteType {
    #[serde(rename = "7mer-1a")]
    SevenMer1a,
    #[serde(rename = "7mer-m8")]
    SevenMerM8,
    #[serde(rename = "8mer-1a")]
    EightMer1a,
}

impl SiteType {
    /// Class order used for probability vectors
    pub const ALL: [SiteType; 3] = [SiteType::SevenMer1a, SiteType::SevenMerM8, SiteType::EightMer1a];

    /// Only 7mer-m8 and 8mer-1a sites enter the upstream layer
    pub fn is_strong(self) -> bool {
        matches!(self, SiteType::SevenMerM8 | SiteType::EightMer1a)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SiteType::SevenMer1a => "7mer-1a",
            SiteType::SevenMerM8 => "7mer-m8",
            SiteType::EightMer1a => "8mer-1a",
        }
    }
}

impl fmt::Display for SiteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteType {
    type Err = RegnetError;

    fn from_str(s: &str) -> Result<Self> {
        SiteType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| RegnetError::Parse(format!("unknown site type: {}", s)))
    }
}

/// Classifier output for one site
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: SiteType,
    /// Per-class probabilities in [`SiteType::ALL`] order
    pub probabilities: [f64; 3],
}

/// The pretrained site classifier, consumed as an opaque function
pub trait SiteClassifier: Send + Sync {
    fn predict(&self, site: &SiteRow) -> Result<Prediction>;
}

/// One classified circRNA–miRNA site, the row format of match tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub circ_id: String,
    pub mirna_id: String,
    pub predicted_site_type: SiteType,
    #[serde(rename = "prob_7mer-1a", default)]
    pub prob_7mer_1a: f64,
    #[serde(rename = "prob_7mer-m8", default)]
    pub prob_7mer_m8: f64,
    #[serde(rename = "prob_8mer-1a", default)]
    pub prob_8mer_1a: f64,
}

impl MatchRecord {
    pub fn new(site: &SiteRow, prediction: &Prediction) -> Self {
        let [p0, p1, p2] = prediction.probabilities;
        Self {
            circ_id: site.circ_id.clone(),
            mirna_id: site.mirna_id.clone(),
            predicted_site_type: prediction.label,
            prob_7mer_1a: p0,
            prob_7mer_m8: p1,
            prob_8mer_1a: p2,
        }
    }
}

/// Score every prepared row; rows without a miRNA are skipped
pub fn classify_sites(rows: &[SiteRow], classifier: &dyn SiteClassifier) -> Result<Vec<MatchRecord>> {
    rows.iter()
        .filter(|row| row.mirna_id != "none")
        .map(|row| classifier.predict(row).map(|p| MatchRecord::new(row, &p)))
        .collect()
}

/// Keep strong/medium calls, optionally restricted to an input miRNA set
pub fn strong_matches(
    records: &[MatchRecord],
    input_mirnas: Option<&BTreeSet<String>>,
) -> Vec<MatchRecord> {
    records
        .iter()
        .filter(|r| r.predicted_site_type.is_strong())
        .filter(|r| input_mirnas.map_or(true, |set| set.contains(&r.mirna_id)))
        .cloned()
        .collect()
}

/// circRNA → miRNA edges from strong/medium calls
pub fn upstream_edges(records: &[MatchRecord]) -> BTreeSet<InteractionEdge> {
    records
        .iter()
        .filter(|r| r.predicted_site_type.is_strong())
        .map(|r| InteractionEdge::new(&r.circ_id, &r.mirna_id, Layer::UpstreamToMid))
        .collect()
}

pub fn write_match_table(path: &Path, records: &[MatchRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_match_table(path: &Path) -> Result<Vec<MatchRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

/// Match table path for a circRNA inside `dir`
pub fn match_table_path(dir: &Path, circ_id: &str) -> PathBuf {
    dir.join(format!("{}{}", crate::cache::sanitize_key(circ_id), MATCH_FILE_SUFFIX))
}

/// Read every `*_strong_medium_matches.csv` directly inside `dir`, in file name order
pub fn read_match_dir(dir: &Path) -> Result<Vec<MatchRecord>> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_string_lossy().ends_with(MATCH_FILE_SUFFIX))
        .map(|e| e.into_path())
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(RegnetError::NoData(format!(
            "no *{} files in {}",
            MATCH_FILE_SUFFIX,
            dir.display()
        )));
    }

    let mut records = Vec::new();
    for file in &files {
        let rows = read_match_table(file)?;
        log::debug!("{}: {} match rows", file.display(), rows.len());
        records.extend(rows);
    }
    Ok(records)
}

/// Write prepared site rows for an external classifier run
pub fn write_site_rows(path: &Path, rows: &[SiteRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Labels by context+ percentile; stands in for the trained model
    struct PercentileClassifier;

    impl SiteClassifier for PercentileClassifier {
        fn predict(&self, site: &SiteRow) -> Result<Prediction> {
            let (label, probabilities) = if site.context_percentile >= 90.0 {
                (SiteType::EightMer1a, [0.05, 0.15, 0.8])
            } else if site.context_percentile >= 50.0 {
                (SiteType::SevenMerM8, [0.2, 0.6, 0.2])
            } else {
                (SiteType::SevenMer1a, [0.7, 0.2, 0.1])
            };
            Ok(Prediction { label, probabilities })
        }
    }

    fn record(circ: &str, mirna: &str, site: SiteType) -> MatchRecord {
        MatchRecord {
            circ_id: circ.to_string(),
            mirna_id: mirna.to_string(),
            predicted_site_type: site,
            prob_7mer_1a: 0.0,
            prob_7mer_m8: 0.0,
            prob_8mer_1a: 0.0,
        }
    }

    #[test]
    fn test_site_type_parse_and_strength() {
        assert_eq!("8mer-1a".parse::<SiteType>().unwrap(), SiteType::EightMer1a);
        assert!("9mer".parse::<SiteType>().is_err());
        assert!(SiteType::SevenMerM8.is_strong());
        assert!(!SiteType::SevenMer1a.is_strong());
    }

    #[test]
    fn test_classify_sites_skips_rows_without_mirna() {
        let rows = prepare_sites(&sample_table()).unwrap();
        let records = classify_sites(&rows, &PercentileClassifier).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].predicted_site_type, SiteType::EightMer1a);
        assert_eq!(records[0].prob_8mer_1a, 0.8);
        assert_eq!(records[1].predicted_site_type, SiteType::SevenMer1a);
    }

    #[test]
    fn test_strong_matches_filters_class_and_input_set() {
        let records = vec![
            record("circA", "m1", SiteType::EightMer1a),
            record("circA", "m2", SiteType::SevenMerM8),
            record("circA", "m3", SiteType::SevenMer1a),
        ];

        assert_eq!(strong_matches(&records, None).len(), 2);

        let inputs: BTreeSet<String> = ["m2".to_string()].into_iter().collect();
        let kept = strong_matches(&records, Some(&inputs));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].mirna_id, "m2");
    }

    #[test]
    fn test_upstream_edges_dedupe_and_exclude_weak() {
        let records = vec![
            record("circA", "m1", SiteType::EightMer1a),
            record("circA", "m1", SiteType::SevenMerM8),
            record("circB", "m1", SiteType::SevenMer1a),
        ];
        let edges = upstream_edges(&records);
        assert_eq!(edges.len(), 1);
        assert!(edges.contains(&InteractionEdge::new("circA", "m1", Layer::UpstreamToMid)));
    }

    #[test]
    fn test_match_dir_reads_only_match_files() {
        let temp = TempDir::new().unwrap();
        write_match_table(
            &match_table_path(temp.path(), "circA"),
            &[record("circA", "m1", SiteType::EightMer1a)],
        )
        .unwrap();
        write_match_table(
            &match_table_path(temp.path(), "circB"),
            &[record("circB", "m2", SiteType::SevenMerM8)],
        )
        .unwrap();
        std::fs::write(temp.path().join("notes.csv"), "circ_id\nx\n").unwrap();

        let records = read_match_dir(temp.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].circ_id, "circA");
        assert_eq!(records[1].mirna_id, "m2");
    }

    #[test]
    fn test_match_table_tolerates_extra_columns() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("x_strong_medium_matches.csv");
        std::fs::write(
            &path,
            "circ_id,mirna_id,TargetScan miRNA predictions_TA,predicted_site_type\ncircA,m1,3.1,7mer-m8\n",
        )
        .unwrap();

        let records = read_match_table(&path).unwrap();
        assert_eq!(records, vec![record("circA", "m1", SiteType::SevenMerM8)]);
    }

    #[test]
    fn test_empty_match_dir_is_no_data() {
        let temp = TempDir::new().unwrap();
        let err = read_match_dir(temp.path()).unwrap_err();
        assert!(matches!(err, RegnetError::NoData(_)));
    }
}
