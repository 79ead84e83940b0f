use super::{run_checked, run_piped, StageTimeout};
use crate::utils::{Error, Result};
use std::fs::File;
use std::path::Path;
use std::process::Command;

const TOOL: &str = "minimap2";

// Nanopore preset used for both selection and full-read alignment.
const PRESET: &str = "map-ont";

pub struct Aligner {
    pub threads: usize,
    pub timeout: StageTimeout,
}

impl Aligner {
    /// Aligns reads against a reference and writes SAM records to `out_sam`.
    /// Used during reference selection, one invocation per candidate.
    pub fn align_to_sam(&self, reads: &Path, reference: &Path, out_sam: &Path) -> Result<()> {
        let out = File::create(out_sam).map_err(|e| Error::io(out_sam, e))?;
        let mut cmd = Command::new(TOOL);
        cmd.arg("-ax")
            .arg(PRESET)
            .arg("-t")
            .arg(self.threads.to_string())
            .arg(reference)
            .arg(reads)
            .stdout(out);
        run_checked(cmd, TOOL, self.timeout)
    }

    /// Aligns the full read set against the selected reference and converts
    /// the stream straight to BAM. `-Y` keeps soft-clipped bases, `-L` emits
    /// long CIGARs.
    pub fn align_to_bam(&self, reads: &Path, reference: &Path, out_bam: &Path) -> Result<()> {
        let mut minimap = Command::new(TOOL);
        minimap
            .arg("-ax")
            .arg(PRESET)
            .arg("-Y")
            .arg("-L")
            .arg("-t")
            .arg(self.threads.to_string())
            .arg(reference)
            .arg(reads);

        let mut view = Command::new("samtools");
        view.arg("view").arg("-b").arg("-o").arg(out_bam);

        run_piped(minimap, view, TOOL, self.timeout)
    }
}
