use crate::catalog::{self, references, ReferenceCandidate};
use crate::cli::{SelectArgs, SelectionOpts};
use crate::segment::Segment;
use crate::selection::{select_for_sample, SelectionLedger};
use crate::tools::aligner::Aligner;
use crate::tools::retrieval::ReferenceRetrieval;
use crate::tools::subsampler::{Subsampler, SUBSAMPLE_SEED};
use crate::tools::StageTimeout;
use crate::utils::{create_dir_all, Error, Result, RunContext};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub fn select(args: SelectArgs) -> Result<()> {
    let ctx = args.io.context();
    run_stage(
        &ctx,
        &args.selection,
        StageTimeout::from_secs(args.io.stage_timeout),
    )
}

/// Reference selection stage: subsample every sample, retrieve the candidate
/// catalog once, pick a winner per sample and segment, and stage the
/// consensus working directories.
pub fn run_stage(ctx: &RunContext, opts: &SelectionOpts, timeout: StageTimeout) -> Result<()> {
    ctx.ensure_selection_layout()?;

    let names = catalog::find_samples(&ctx.input_dir)?;
    if names.is_empty() {
        return Err(Error::Pipeline(format!(
            "no .fastq.gz samples found in {}",
            ctx.input_dir.display()
        )));
    }
    log::info!("Found {} sample(s) to process", names.len());

    let retrieval = ReferenceRetrieval {
        filters: opts.filters(),
        timeout,
    };
    references::fetch_catalog(ctx, &retrieval)?;
    let candidates = references::load_candidates(ctx)?;
    if candidates.values().all(|c| c.is_empty()) {
        return Err(Error::Pipeline(
            "reference catalog is empty for every segment".to_string(),
        ));
    }

    let subsampler = Subsampler {
        seed: SUBSAMPLE_SEED,
        target_reads: opts.subsample_size,
        timeout,
    };
    // One thread per candidate alignment; parallelism comes from the
    // per-candidate fan-out inside select_for_sample.
    let aligner = Aligner {
        threads: 1,
        timeout,
    };

    let pool = build_pool(ctx.threads)?;
    let mut n_failed = 0;
    for name in &names {
        match process_sample(ctx, name, &candidates, &subsampler, &aligner, &pool) {
            Ok(()) => {}
            Err(err) => {
                log::error!("{}: reference selection failed, skipping sample: {}", name, err);
                n_failed += 1;
            }
        }
    }

    if n_failed > 0 {
        return Err(Error::Pipeline(format!(
            "{} of {} sample(s) failed reference selection",
            n_failed,
            names.len()
        )));
    }
    log::info!("Reference selection complete");
    Ok(())
}

fn process_sample(
    ctx: &RunContext,
    name: &str,
    candidates: &BTreeMap<Segment, Vec<ReferenceCandidate>>,
    subsampler: &Subsampler,
    aligner: &Aligner,
    pool: &rayon::ThreadPool,
) -> Result<()> {
    let sample = catalog::prepare_sample(ctx, name, subsampler)?;

    let results = pool.install(|| select_for_sample(ctx, &sample, candidates, aligner))?;

    let ledger = SelectionLedger::new(&sample, subsampler.target_reads, &results);
    ledger.save(&ctx.selection_ledger(name))?;
    log::info!(
        "{}: saved selection ledger to {}",
        name,
        ctx.selection_ledger(name).display()
    );

    stage_consensus_dir(ctx, &sample.raw_reads, name)
}

/// Copies the winning references and the raw reads into the sample's
/// consensus working directory. A segment with no winner simply has no
/// reference file there; the consensus stage skips it.
fn stage_consensus_dir(ctx: &RunContext, raw_reads: &Path, name: &str) -> Result<()> {
    let sample_dir = ctx.sample_consensus_dir(name);
    create_dir_all(&sample_dir)?;

    for segment in Segment::ALL {
        let best = ctx.best_reference(name, segment);
        if best.exists() {
            let target = sample_dir.join(format!("{}_{}_reference.fasta", name, segment));
            fs::copy(&best, &target).map_err(|e| Error::io(&best, e))?;
        }
    }

    let reads_target = sample_dir.join(format!("{}.fastq.gz", name));
    fs::copy(raw_reads, &reads_target).map_err(|e| Error::io(raw_reads, e))?;
    Ok(())
}

fn build_pool(threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("lassensus-{}", i))
        .build()
        .map_err(|e| Error::Pipeline(format!("failed to initialize thread pool: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_stage_consensus_dir_omits_missing_segment() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new(PathBuf::from("/in"), dir.path().to_path_buf(), 1);

        // Only the L segment has a selection winner.
        create_dir_all(&ctx.sample_selection_dir("s1")).unwrap();
        fs::write(ctx.best_reference("s1", Segment::L), ">ref\nACGT\n").unwrap();
        let raw = dir.path().join("s1.fastq.gz");
        fs::write(&raw, b"reads").unwrap();

        stage_consensus_dir(&ctx, &raw, "s1").unwrap();

        let sample_dir = ctx.sample_consensus_dir("s1");
        assert!(sample_dir.join("s1_L_reference.fasta").exists());
        assert!(!sample_dir.join("s1_S_reference.fasta").exists());
        assert!(sample_dir.join("s1.fastq.gz").exists());
    }
}
