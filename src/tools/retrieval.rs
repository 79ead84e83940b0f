use super::{run_checked, StageTimeout};
use crate::utils::Result;
use std::path::Path;
use std::process::Command;

const TOOL: &str = "lassaseq";

/// Filter parameters for the reference retrieval service.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalFilters {
    /// 1 = complete genomes only, 2 = partial (honors `min_completeness`),
    /// 3 = no filter.
    pub genome: u8,
    /// Minimum sequence completeness percent, applied only when `genome` is 2.
    pub min_completeness: u8,
    /// 1 = human, 2 = rodent, 3 = both, 4 = no filter.
    pub host: u8,
    /// 1 = known location, 2 = known date, 3 = both, 4 = no filter.
    pub metadata: u8,
}

pub struct ReferenceRetrieval {
    pub filters: RetrievalFilters,
    pub timeout: StageTimeout,
}

impl ReferenceRetrieval {
    /// Retrieves per-segment reference catalogs into `out_dir/FASTA/`.
    pub fn fetch(&self, out_dir: &Path) -> Result<()> {
        let filters = &self.filters;
        let mut cmd = Command::new(TOOL);
        cmd.arg("-o")
            .arg(out_dir)
            .arg("--genome")
            .arg(filters.genome.to_string())
            .arg("--host")
            .arg(filters.host.to_string())
            .arg("--metadata")
            .arg(filters.metadata.to_string());
        if filters.genome == 2 {
            cmd.arg("--completeness")
                .arg(filters.min_completeness.to_string());
        }
        run_checked(cmd, TOOL, self.timeout)
    }
}
