use super::{run_checked, StageTimeout};
use crate::utils::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

const TOOL: &str = "medaka_consensus";

pub struct Polisher {
    pub threads: usize,
    pub timeout: StageTimeout,
}

impl Polisher {
    /// Polishes a draft consensus against the full read set. The polisher
    /// writes into `work_dir`; the caller owns moving the result out and
    /// removing the directory.
    pub fn polish(&self, reads: &Path, draft: &Path, work_dir: &Path) -> Result<PathBuf> {
        let mut cmd = Command::new(TOOL);
        cmd.arg("-i")
            .arg(reads)
            .arg("-d")
            .arg(draft)
            .arg("-o")
            .arg(work_dir)
            .arg("-t")
            .arg(self.threads.to_string());
        run_checked(cmd, TOOL, self.timeout)?;

        let polished = work_dir.join("consensus.fasta");
        if !polished.exists() {
            return Err(Error::tool(
                TOOL,
                format!("expected output not found: {}", polished.display()),
            ));
        }
        Ok(polished)
    }
}
