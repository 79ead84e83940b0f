use crate::catalog::Sample;
use crate::segment::Segment;
use crate::selection::selector::{BestReference, SelectionResult};
use crate::selection::stats::MappingStats;
use crate::utils::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Persisted per-sample record of the reference selection: the winners plus
/// the complete ranked statistics for every candidate evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionLedger {
    pub sample: String,
    pub total_reads: u64,
    pub rarefied_reads: u64,
    pub best_references: BTreeMap<Segment, BestReference>,
    pub best_stats: BTreeMap<Segment, MappingStats>,
    pub segment_stats: BTreeMap<Segment, Vec<MappingStats>>,
}

impl SelectionLedger {
    pub fn new(
        sample: &Sample,
        rarefied_reads: u64,
        results: &BTreeMap<Segment, SelectionResult>,
    ) -> Self {
        let mut ledger = SelectionLedger {
            sample: sample.name.clone(),
            total_reads: sample.total_reads,
            rarefied_reads,
            best_references: BTreeMap::new(),
            best_stats: BTreeMap::new(),
            segment_stats: BTreeMap::new(),
        };
        for (&segment, result) in results {
            if let Some(best) = &result.best {
                ledger.best_references.insert(segment, best.clone());
            }
            if let Some(stats) = &result.best_stats {
                ledger.best_stats.insert(segment, stats.clone());
            }
            ledger.segment_stats.insert(segment, result.ranked.clone());
        }
        ledger
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_ledger() -> SelectionLedger {
        let stats = MappingStats {
            accession: "AB123".to_string(),
            description: "Lassa virus segment L".to_string(),
            mapped_reads: 350,
            coverage: 12.5,
            avg_identity: 97.3,
        };
        SelectionLedger {
            sample: "s1".to_string(),
            total_reads: 123456,
            rarefied_reads: 10000,
            best_references: BTreeMap::from([(
                Segment::L,
                BestReference {
                    file: "refs/L.fasta".to_string(),
                    accession: "AB123".to_string(),
                    description: "Lassa virus segment L".to_string(),
                },
            )]),
            best_stats: BTreeMap::from([(Segment::L, stats.clone())]),
            segment_stats: BTreeMap::from([
                (Segment::L, vec![stats]),
                (Segment::S, Vec::new()),
            ]),
        }
    }

    #[test]
    fn test_ledger_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let ledger = example_ledger();
        ledger.save(&path).unwrap();
        let loaded = SelectionLedger::load(&path).unwrap();
        assert_eq!(loaded, ledger);
        assert_eq!(
            loaded.best_references[&Segment::L].accession,
            loaded.best_stats[&Segment::L].accession
        );
    }

    #[test]
    fn test_ledger_json_shape() {
        let json = serde_json::to_value(example_ledger()).unwrap();
        assert_eq!(json["sample"], "s1");
        assert_eq!(json["rarefied_reads"], 10000);
        assert_eq!(json["best_references"]["L"]["accession"], "AB123");
        assert_eq!(json["segment_stats"]["S"], serde_json::json!([]));
    }
}
