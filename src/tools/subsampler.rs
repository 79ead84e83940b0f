use super::{drain_stderr, finish, wait_with_timeout, StageTimeout};
use crate::utils::{Error, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

const TOOL: &str = "seqtk";

/// Seed shared by every sample in a run so that subsamples are comparable
/// across samples and reproducible across runs.
pub const SUBSAMPLE_SEED: u64 = 42;

pub struct Subsampler {
    pub seed: u64,
    pub target_reads: u64,
    pub timeout: StageTimeout,
}

impl Subsampler {
    /// Draws a seeded random subsample of `target_reads` reads and writes it
    /// gzip-compressed to `out_fastq_gz`.
    pub fn subsample(&self, reads: &Path, out_fastq_gz: &Path) -> Result<()> {
        let mut cmd = Command::new(TOOL);
        cmd.arg("sample")
            .arg(format!("-s{}", self.seed))
            .arg(reads)
            .arg(self.target_reads.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        log::debug!("Running {:?}", cmd);

        let mut child = cmd.spawn().map_err(|e| Error::tool(TOOL, e))?;
        let drain = drain_stderr(&mut child);
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::tool(TOOL, "failed to open pipe"))?;

        // Compress on a separate thread; killing the child on timeout closes
        // the pipe and unblocks the copy.
        let out_path = out_fastq_gz.to_path_buf();
        let writer = thread::spawn(move || -> std::result::Result<(), io::Error> {
            let out = File::create(&out_path)?;
            let mut encoder = GzEncoder::new(out, Compression::default());
            let mut stdout = stdout;
            io::copy(&mut stdout, &mut encoder)?;
            encoder.finish()?;
            Ok(())
        });

        let status = wait_with_timeout(&mut child, TOOL, self.timeout);
        let copy_result = writer
            .join()
            .map_err(|_| Error::tool(TOOL, "output writer panicked"))?;
        let stderr = drain
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        finish(status?, stderr, TOOL)?;
        copy_result.map_err(|e| Error::io(out_fastq_gz, e))
    }
}
