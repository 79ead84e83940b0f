use crate::consensus::completeness::CompletenessReport;
use crate::consensus::pipeline::ConsensusArtifact;
use crate::segment::Segment;
use crate::utils::{Error, Result, RunContext};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

/// Appends finished consensus sequences into the segment-scoped collection
/// files and accumulates the run summary. All writes go through a single
/// owner (the aggregation thread), which serializes concurrent samples.
pub struct Aggregator {
    ctx: RunContext,
    summary: RunSummary,
}

#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub samples: BTreeMap<String, SampleSummary>,
}

#[derive(Debug, Default, Serialize)]
pub struct SampleSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub segments: BTreeMap<Segment, SegmentSummary>,
}

#[derive(Debug, Serialize)]
pub struct SegmentSummary {
    pub artifact: ConsensusArtifact,
    pub completeness: CompletenessReport,
}

impl Aggregator {
    pub fn new(ctx: RunContext) -> Result<Self> {
        ctx.ensure_aggregate_layout()?;
        Ok(Aggregator {
            ctx,
            summary: RunSummary::default(),
        })
    }

    /// Records one finished segment: copies the polished FASTA into the
    /// segment directory and appends it to the cumulative collection file.
    /// Appends are strictly order-of-arrival.
    pub fn record(
        &mut self,
        sample: &str,
        artifact: ConsensusArtifact,
        completeness: CompletenessReport,
    ) -> Result<()> {
        let segment = artifact.segment;
        let segment_dir = self.ctx.segment_aggregate_dir(segment);

        let file_name = artifact
            .polished
            .file_name()
            .ok_or_else(|| Error::MissingInput(artifact.polished.clone()))?;
        let copy_target = segment_dir.join(file_name);
        fs::copy(&artifact.polished, &copy_target)
            .map_err(|e| Error::io(&artifact.polished, e))?;

        append_fasta(&artifact.polished, &self.ctx.collection_file(segment))?;
        log::debug!(
            "{}: appended {} segment consensus to {}",
            sample,
            segment,
            self.ctx.collection_file(segment).display()
        );

        self.summary
            .samples
            .entry(sample.to_string())
            .or_default()
            .segments
            .insert(segment, SegmentSummary {
                artifact,
                completeness,
            });
        Ok(())
    }

    pub fn record_failure(&mut self, sample: &str, error: String) {
        self.summary
            .samples
            .entry(sample.to_string())
            .or_default()
            .error = Some(error);
    }

    /// Persists the run ledger and returns the summary.
    pub fn finish(self) -> Result<RunSummary> {
        let path = self.ctx.run_summary();
        let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
        serde_json::to_writer_pretty(file, &self.summary)?;
        log::info!("Wrote run summary to {}", path.display());
        Ok(self.summary)
    }
}

fn append_fasta(source: &Path, collection: &Path) -> Result<()> {
    let mut input = File::open(source).map_err(|e| Error::io(source, e))?;
    let mut output = OpenOptions::new()
        .create(true)
        .append(true)
        .open(collection)
        .map_err(|e| Error::io(collection, e))?;
    io::copy(&mut input, &mut output).map_err(|e| Error::io(collection, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::caller::CallerThresholds;
    use crate::utils::fasta;
    use std::path::PathBuf;

    fn artifact(segment: Segment, polished: PathBuf) -> ConsensusArtifact {
        ConsensusArtifact {
            segment,
            draft: polished.with_extension("draft.fasta"),
            polished,
            thresholds: CallerThresholds {
                min_depth: 50,
                min_quality: 30,
                majority_threshold: 0.7,
            },
        }
    }

    fn report() -> CompletenessReport {
        CompletenessReport {
            total_length: 4,
            n_count: 0,
            non_n_length: 4,
            reference_length: 4,
            completeness_vs_reference: Some(1.0),
            completeness_vs_canonical: Some(1.0),
        }
    }

    fn write_consensus(dir: &Path, name: &str, accession: &str) -> PathBuf {
        let path = dir.join(name);
        fasta::write_record(
            &path,
            &fasta::FastaRecord {
                accession: accession.to_string(),
                description: String::new(),
                sequence: "ACGT".to_string(),
            },
        )
        .unwrap();
        path
    }

    #[test]
    fn test_appends_are_order_of_arrival() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new(PathBuf::from("/in"), dir.path().to_path_buf(), 1);
        let mut aggregator = Aggregator::new(ctx.clone()).unwrap();

        let first = write_consensus(dir.path(), "s1_L_consensus_polished.fasta", "s1");
        let second = write_consensus(dir.path(), "s2_L_consensus_polished.fasta", "s2");
        aggregator.record("s1", artifact(Segment::L, first), report()).unwrap();
        aggregator.record("s2", artifact(Segment::L, second), report()).unwrap();

        let collection = fasta::read_records(&ctx.collection_file(Segment::L)).unwrap();
        let order: Vec<&str> = collection.iter().map(|r| r.accession.as_str()).collect();
        assert_eq!(order, vec!["s1", "s2"]);

        // Per-sample copies land next to the collection file.
        assert!(ctx
            .segment_aggregate_dir(Segment::L)
            .join("s1_L_consensus_polished.fasta")
            .exists());
    }

    #[test]
    fn test_failure_does_not_disturb_recorded_samples() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new(PathBuf::from("/in"), dir.path().to_path_buf(), 1);
        let mut aggregator = Aggregator::new(ctx.clone()).unwrap();

        let ok = write_consensus(dir.path(), "s1_S_consensus_polished.fasta", "s1");
        aggregator.record("s1", artifact(Segment::S, ok), report()).unwrap();
        aggregator.record_failure("s2", "ivar failed: exit status: 1".to_string());

        let summary = aggregator.finish().unwrap();
        assert!(summary.samples["s1"].error.is_none());
        assert_eq!(summary.samples["s1"].segments.len(), 1);
        assert!(summary.samples["s2"].error.is_some());

        let collection = fasta::read_records(&ctx.collection_file(Segment::S)).unwrap();
        assert_eq!(collection.len(), 1);
    }
}
