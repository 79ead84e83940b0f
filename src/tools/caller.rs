use super::{run_piped, samtools, StageTimeout};
use crate::utils::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

const TOOL: &str = "ivar";

/// Thresholds forwarded to the consensus caller; recorded as provenance on
/// the resulting artifact.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CallerThresholds {
    pub min_depth: u32,
    pub min_quality: u32,
    pub majority_threshold: f64,
}

/// Caller outputs resolved to explicit paths.
pub struct ConsensusCall {
    pub consensus: PathBuf,
    pub quality: PathBuf,
}

pub struct ConsensusCaller {
    pub thresholds: CallerThresholds,
    pub timeout: StageTimeout,
}

impl ConsensusCaller {
    /// Pipes a pileup of the sorted, indexed alignment into the caller.
    /// Positions below `min_depth` are masked as `N` by the caller (`-k` is
    /// not used; `-m` masking keeps the sequence coordinate-complete).
    pub fn call(
        &self,
        sorted_bam: &Path,
        reference: &Path,
        out_prefix: &Path,
    ) -> Result<ConsensusCall> {
        let mpileup = samtools::mpileup_command(reference, sorted_bam);

        let mut ivar = Command::new(TOOL);
        ivar.arg("consensus")
            .arg("-p")
            .arg(out_prefix)
            .arg("-m")
            .arg(self.thresholds.min_depth.to_string())
            .arg("-q")
            .arg(self.thresholds.min_quality.to_string())
            .arg("-t")
            .arg(self.thresholds.majority_threshold.to_string());

        run_piped(mpileup, ivar, TOOL, self.timeout)?;

        // ivar names its outputs <prefix>.fa and <prefix>.qual.txt.
        let consensus = path_with_suffix(out_prefix, ".fa");
        let quality = path_with_suffix(out_prefix, ".qual.txt");
        for path in [&consensus, &quality] {
            if !path.exists() {
                return Err(Error::tool(
                    TOOL,
                    format!("expected output not found: {}", path.display()),
                ));
            }
        }

        Ok(ConsensusCall { consensus, quality })
    }
}

fn path_with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_with_suffix() {
        let prefix = Path::new("/tmp/sample_L");
        assert_eq!(path_with_suffix(prefix, ".fa"), PathBuf::from("/tmp/sample_L.fa"));
        assert_eq!(
            path_with_suffix(prefix, ".qual.txt"),
            PathBuf::from("/tmp/sample_L.qual.txt")
        );
    }
}
