use crate::segment::Segment;
use crate::utils::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Run-wide context passed explicitly through every stage: input/output
/// locations and the worker pool size. All persisted paths are derived here
/// so stages never agree on layout through string conventions.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub threads: usize,
}

impl RunContext {
    pub fn new(input_dir: PathBuf, output_dir: PathBuf, threads: usize) -> Self {
        RunContext {
            input_dir,
            output_dir,
            threads,
        }
    }

    pub fn raw_reads(&self, sample: &str) -> PathBuf {
        self.input_dir.join(format!("{}.fastq.gz", sample))
    }

    pub fn references_dir(&self) -> PathBuf {
        self.output_dir.join("references")
    }

    /// Retrieved catalog location for one segment.
    pub fn catalog_dir(&self, segment: Segment) -> PathBuf {
        self.references_dir().join("FASTA").join(segment.dir_name())
    }

    pub fn selection_dir(&self) -> PathBuf {
        self.references_dir().join("selection_best_references")
    }

    pub fn sample_selection_dir(&self, sample: &str) -> PathBuf {
        self.selection_dir().join(sample)
    }

    pub fn subsampled_reads(&self, sample: &str) -> PathBuf {
        self.sample_selection_dir(sample)
            .join(format!("{}_rarefied.fastq.gz", sample))
    }

    pub fn selection_ledger(&self, sample: &str) -> PathBuf {
        self.sample_selection_dir(sample)
            .join(format!("{}_reference_selection.json", sample))
    }

    pub fn best_reference(&self, sample: &str, segment: Segment) -> PathBuf {
        self.sample_selection_dir(sample)
            .join(format!("{}_{}_best_reference.fasta", sample, segment))
    }

    pub fn consensus_dir(&self) -> PathBuf {
        self.output_dir.join("consensus")
    }

    pub fn sample_consensus_dir(&self, sample: &str) -> PathBuf {
        self.consensus_dir().join(sample)
    }

    pub fn aggregate_dir(&self) -> PathBuf {
        self.output_dir.join("AllConsensus")
    }

    pub fn segment_aggregate_dir(&self, segment: Segment) -> PathBuf {
        self.aggregate_dir().join(segment.dir_name())
    }

    pub fn collection_file(&self, segment: Segment) -> PathBuf {
        self.segment_aggregate_dir(segment)
            .join(format!("all_{}_consensus.fasta", segment))
    }

    pub fn run_summary(&self) -> PathBuf {
        self.output_dir.join("run_summary.json")
    }

    pub fn ensure_selection_layout(&self) -> Result<()> {
        create_dir_all(&self.references_dir())?;
        create_dir_all(&self.selection_dir())
    }

    pub fn ensure_aggregate_layout(&self) -> Result<()> {
        for segment in Segment::ALL {
            create_dir_all(&self.segment_aggregate_dir(segment))?;
        }
        Ok(())
    }
}

pub fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::io(path, e))
}

/// Best-effort removal of a temp directory tree.
pub fn remove_dir_all_logged(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_dir_all(path) {
            log::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let ctx = RunContext::new(PathBuf::from("/in"), PathBuf::from("/out"), 4);
        assert_eq!(
            ctx.subsampled_reads("s1"),
            PathBuf::from("/out/references/selection_best_references/s1/s1_rarefied.fastq.gz")
        );
        assert_eq!(
            ctx.best_reference("s1", Segment::L),
            PathBuf::from("/out/references/selection_best_references/s1/s1_L_best_reference.fasta")
        );
        assert_eq!(
            ctx.collection_file(Segment::S),
            PathBuf::from("/out/AllConsensus/S_segment/all_S_consensus.fasta")
        );
        assert_eq!(
            ctx.catalog_dir(Segment::L),
            PathBuf::from("/out/references/FASTA/L_segment")
        );
    }
}
