use crate::consensus::completeness::{self, CompletenessReport};
use crate::segment::Segment;
use crate::tools::aligner::Aligner;
use crate::tools::caller::{CallerThresholds, ConsensusCaller};
use crate::tools::polisher::Polisher;
use crate::tools::samtools;
use crate::utils::{create_dir_all, fasta, remove_dir_all_logged, Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Final per-segment consensus artifact with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusArtifact {
    pub segment: Segment,
    pub draft: PathBuf,
    pub polished: PathBuf,
    pub thresholds: CallerThresholds,
}

// Stage outputs are newtypes so a stage can only consume its predecessor's
// result: the caller never sees an unsorted alignment, the polisher never
// sees anything but the caller's draft.
struct SortedAlignment(PathBuf);
struct DraftConsensus(PathBuf);
struct PolishedConsensus(PathBuf);

pub struct ConsensusPipeline<'a> {
    pub aligner: &'a Aligner,
    pub caller: &'a ConsensusCaller,
    pub polisher: &'a Polisher,
}

impl ConsensusPipeline<'_> {
    /// Builds the polished consensus for one segment of one sample. Any
    /// external-tool failure propagates: the caller treats it as fatal for
    /// the whole sample.
    pub fn build(
        &self,
        sample_dir: &Path,
        sample: &str,
        segment: Segment,
        reads: &Path,
        reference: &Path,
    ) -> Result<(ConsensusArtifact, CompletenessReport)> {
        let sorted = self.align(sample_dir, sample, segment, reads, reference)?;
        let draft = self.call(sample_dir, sample, segment, &sorted, reference)?;
        let polished = self.polish(sample_dir, sample, segment, reads, &draft)?;

        // Alignment artifacts are no longer needed once the polished
        // sequence exists.
        remove_file_logged(&sorted.0);
        remove_file_logged(&bai_path(&sorted.0));

        let report = self.score(sample, segment, &polished, reference)?;

        Ok((
            ConsensusArtifact {
                segment,
                draft: draft.0,
                polished: polished.0,
                thresholds: self.caller.thresholds,
            },
            report,
        ))
    }

    /// Stage A: full-read alignment, sorted and indexed.
    fn align(
        &self,
        sample_dir: &Path,
        sample: &str,
        segment: Segment,
        reads: &Path,
        reference: &Path,
    ) -> Result<SortedAlignment> {
        log::info!("{}: mapping reads to {} segment reference", sample, segment);
        let bam = sample_dir.join(format!("{}_{}.bam", sample, segment));
        let sorted = sample_dir.join(format!("{}_{}.sorted.bam", sample, segment));

        self.aligner.align_to_bam(reads, reference, &bam)?;
        samtools::sort(&bam, &sorted, self.aligner.timeout)?;
        samtools::index(&sorted, self.aligner.timeout)?;
        remove_file_logged(&bam);

        Ok(SortedAlignment(sorted))
    }

    /// Stage B: consensus call from the pileup of the sorted alignment.
    fn call(
        &self,
        sample_dir: &Path,
        sample: &str,
        segment: Segment,
        sorted: &SortedAlignment,
        reference: &Path,
    ) -> Result<DraftConsensus> {
        log::info!("{}: calling {} segment consensus", sample, segment);
        let prefix = sample_dir.join(format!("{}_{}", sample, segment));
        let call = self.caller.call(&sorted.0, reference, &prefix)?;

        let draft = sample_dir.join(format!("{}_{}_consensus.fasta", sample, segment));
        let quality = sample_dir.join(format!("{}_{}_quality.txt", sample, segment));
        rename(&call.consensus, &draft)?;
        rename(&call.quality, &quality)?;

        Ok(DraftConsensus(draft))
    }

    /// Stage C: polish the draft against the full reads. The polisher's
    /// working directory is removed once the result is extracted.
    fn polish(
        &self,
        sample_dir: &Path,
        sample: &str,
        segment: Segment,
        reads: &Path,
        draft: &DraftConsensus,
    ) -> Result<PolishedConsensus> {
        log::info!("{}: polishing {} segment consensus", sample, segment);
        let work_dir = sample_dir.join(format!("polish_{}", segment));
        create_dir_all(&work_dir)?;

        let result = self.polisher.polish(reads, &draft.0, &work_dir);
        let polished = match result {
            Ok(raw) => {
                let polished =
                    sample_dir.join(format!("{}_{}_consensus_polished.fasta", sample, segment));
                rename(&raw, &polished).map(|_| PolishedConsensus(polished))
            }
            Err(e) => Err(e),
        };
        remove_dir_all_logged(&work_dir);
        polished
    }

    fn score(
        &self,
        sample: &str,
        segment: Segment,
        polished: &PolishedConsensus,
        reference: &Path,
    ) -> Result<CompletenessReport> {
        let consensus = fasta::read_bases(&polished.0)?;
        let reference_len = fasta::read_bases(reference)?.len();
        let report = completeness::score(&consensus, reference_len, segment.canonical_len());

        log::info!(
            "{}: {} segment consensus: {} bp, {} N, {} non-N ({} vs reference, {} vs RefSeq)",
            sample,
            segment,
            report.total_length,
            report.n_count,
            report.non_n_length,
            format_fraction(report.completeness_vs_reference),
            format_fraction(report.completeness_vs_canonical),
        );
        Ok(report)
    }
}

fn format_fraction(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v * 100.0),
        None => "undefined".to_string(),
    }
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).map_err(|e| Error::io(from, e))
}

fn bai_path(bam: &Path) -> PathBuf {
    let mut name = bam.as_os_str().to_owned();
    name.push(".bai");
    PathBuf::from(name)
}

fn remove_file_logged(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            log::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bai_path() {
        assert_eq!(
            bai_path(Path::new("/x/s_L.sorted.bam")),
            PathBuf::from("/x/s_L.sorted.bam.bai")
        );
    }

    #[test]
    fn test_format_fraction() {
        assert_eq!(format_fraction(Some(0.9972)), "99.72%");
        assert_eq!(format_fraction(None), "undefined");
    }
}
