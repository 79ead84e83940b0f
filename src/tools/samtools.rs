use super::{run_checked, StageTimeout};
use crate::utils::Result;
use std::path::Path;
use std::process::Command;

const TOOL: &str = "samtools";

pub fn sort(bam: &Path, out_bam: &Path, timeout: StageTimeout) -> Result<()> {
    let mut cmd = Command::new(TOOL);
    cmd.arg("sort").arg("-o").arg(out_bam).arg(bam);
    run_checked(cmd, TOOL, timeout)
}

pub fn index(bam: &Path, timeout: StageTimeout) -> Result<()> {
    let mut cmd = Command::new(TOOL);
    cmd.arg("index").arg(bam);
    run_checked(cmd, TOOL, timeout)
}

/// Per-position pileup over the sorted alignment with no pre-filtering:
/// all positions (`-aa`), no depth cap, no base quality floor. Filtering is
/// the consensus caller's job.
pub fn mpileup_command(reference: &Path, sorted_bam: &Path) -> Command {
    let mut cmd = Command::new(TOOL);
    cmd.arg("mpileup")
        .arg("-aa")
        .arg("-d")
        .arg("0")
        .arg("-Q")
        .arg("0")
        .arg("-f")
        .arg(reference)
        .arg(sorted_bam);
    cmd
}
