use crate::tools::subsampler::Subsampler;
use crate::utils::{create_dir_all, fastq, Error, Result, RunContext};
use std::fs;
use std::path::{Path, PathBuf};

/// One sequencing sample: raw reads plus the fixed-size subsample used for
/// reference selection.
#[derive(Debug, Clone)]
pub struct Sample {
    pub name: String,
    pub raw_reads: PathBuf,
    pub total_reads: u64,
    pub subsampled_reads: PathBuf,
}

/// Discovers samples in the input directory: one per distinct `*.fastq.gz`
/// base filename (stem before the first dot), sorted for a stable processing
/// order.
pub fn find_samples(input_dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(input_dir).map_err(|e| Error::io(input_dir, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(input_dir, e))?;
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if let Some(base) = file_name.strip_suffix(".fastq.gz") {
            let name = base.split('.').next().unwrap_or(base);
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    names.dedup();
    Ok(names)
}

/// Counts reads and draws the fixed-size subsample for one sample. The
/// subsampler's seed and target are identical across all samples in a run so
/// the candidate comparison stays fair.
pub fn prepare_sample(ctx: &RunContext, name: &str, subsampler: &Subsampler) -> Result<Sample> {
    let raw_reads = ctx.raw_reads(name);
    if !raw_reads.exists() {
        return Err(Error::MissingInput(raw_reads));
    }
    let total_reads = fastq::count_reads(&raw_reads)?;
    log::info!("{}: {} total reads", name, total_reads);

    create_dir_all(&ctx.sample_selection_dir(name))?;
    let subsampled_reads = ctx.subsampled_reads(name);
    subsampler.subsample(&raw_reads, &subsampled_reads)?;
    log::debug!("{}: wrote subsample to {}", name, subsampled_reads.display());

    Ok(Sample {
        name: name.to_string(),
        raw_reads,
        total_reads,
        subsampled_reads,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_samples_strips_extensions() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_sample.fastq.gz", "a_sample.fastq.gz", "notes.txt", "x.fasta"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let samples = find_samples(dir.path()).unwrap();
        assert_eq!(samples, vec!["a_sample", "b_sample"]);
    }

    #[test]
    fn test_find_samples_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_samples(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_find_samples_missing_dir() {
        assert!(find_samples(Path::new("/nonexistent/input")).is_err());
    }
}
