use crate::cli::{ConsensusArgs, ConsensusOpts};
use crate::consensus::aggregate::Aggregator;
use crate::consensus::{CompletenessReport, ConsensusArtifact, ConsensusPipeline, RunSummary};
use crate::segment::Segment;
use crate::tools::aligner::Aligner;
use crate::tools::caller::ConsensusCaller;
use crate::tools::polisher::Polisher;
use crate::tools::StageTimeout;
use crate::utils::{Error, Result, RunContext};
use crossbeam_channel::{bounded, Sender};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

const CHANNEL_BUFFER_SIZE: usize = 64;

enum Message {
    Finished {
        sample: String,
        results: Vec<(ConsensusArtifact, CompletenessReport)>,
    },
    Failed {
        sample: String,
        error: String,
    },
}

pub fn consensus(args: ConsensusArgs) -> Result<()> {
    let ctx = args.io.context();
    run_stage(
        &ctx,
        &args.consensus,
        StageTimeout::from_secs(args.io.stage_timeout),
    )
}

/// Consensus stage: per-sample fan-out over the worker pool, results funneled
/// through a channel to a single aggregation thread that owns the shared
/// collection files and the run summary.
pub fn run_stage(ctx: &RunContext, opts: &ConsensusOpts, timeout: StageTimeout) -> Result<()> {
    let samples = find_sample_dirs(ctx)?;
    if samples.is_empty() {
        return Err(Error::Pipeline(format!(
            "no samples found in {}",
            ctx.consensus_dir().display()
        )));
    }
    log::info!("Found {} sample(s) with staged consensus inputs", samples.len());

    // Samples fan out across the pool, so each sample's external tools get
    // an equal share of the worker threads rather than the full pool.
    let tool_threads = tool_threads(ctx.threads, samples.len());
    let aligner = Aligner {
        threads: tool_threads,
        timeout,
    };
    let caller = ConsensusCaller {
        thresholds: opts.thresholds(),
        timeout,
    };
    let polisher = Polisher {
        threads: tool_threads,
        timeout,
    };
    let pipeline = ConsensusPipeline {
        aligner: &aligner,
        caller: &caller,
        polisher: &polisher,
    };

    let aggregator = Aggregator::new(ctx.clone())?;
    let (sender, receiver) = bounded::<Message>(CHANNEL_BUFFER_SIZE);
    let writer_thread = thread::spawn(move || -> Result<RunSummary> {
        let mut aggregator = aggregator;
        for message in receiver {
            match message {
                Message::Finished { sample, results } => {
                    for (artifact, completeness) in results {
                        aggregator.record(&sample, artifact, completeness)?;
                    }
                }
                Message::Failed { sample, error } => aggregator.record_failure(&sample, error),
            }
        }
        aggregator.finish()
    });

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(ctx.threads)
        .thread_name(|i| format!("lassensus-{}", i))
        .build()
        .map_err(|e| Error::Pipeline(format!("failed to initialize thread pool: {}", e)))?;

    let n_failed: usize = pool.install(|| {
        samples
            .par_iter()
            .map(|sample| match process_sample(ctx, sample, &pipeline, &sender) {
                Ok(()) => 0,
                Err(err) => {
                    log::error!("{}: consensus generation failed: {}", sample, err);
                    let _ = sender.send(Message::Failed {
                        sample: sample.clone(),
                        error: err.to_string(),
                    });
                    1
                }
            })
            .sum()
    });

    drop(sender);
    writer_thread.join().expect("aggregation thread panicked")?;

    if n_failed > 0 {
        return Err(Error::Pipeline(format!(
            "{} of {} sample(s) failed consensus generation",
            n_failed,
            samples.len()
        )));
    }
    log::info!("Consensus generation complete");
    Ok(())
}

/// Builds every available segment for one sample. Results are published only
/// after all present segments succeed, so a failed sample never contributes
/// a partial consensus to the aggregated collections.
fn process_sample(
    ctx: &RunContext,
    sample: &str,
    pipeline: &ConsensusPipeline<'_>,
    sender: &Sender<Message>,
) -> Result<()> {
    let sample_dir = ctx.sample_consensus_dir(sample);
    let reads = sample_dir.join(format!("{}.fastq.gz", sample));
    if !reads.exists() {
        return Err(Error::MissingInput(reads));
    }

    let mut results = Vec::new();
    for (segment, reference) in segments_with_reference(&sample_dir, sample) {
        let built = pipeline.build(&sample_dir, sample, segment, &reads, &reference)?;
        results.push(built);
    }

    sender
        .send(Message::Finished {
            sample: sample.to_string(),
            results,
        })
        .map_err(|e| Error::Pipeline(format!("aggregation channel closed: {}", e)))
}

/// Segments whose reference file was staged for this sample. A segment with
/// no selection winner has no reference file and is skipped here.
fn segments_with_reference(sample_dir: &Path, sample: &str) -> Vec<(Segment, PathBuf)> {
    Segment::ALL
        .into_iter()
        .filter_map(|segment| {
            let reference = sample_dir.join(format!("{}_{}_reference.fasta", sample, segment));
            if reference.exists() {
                Some((segment, reference))
            } else {
                log::info!(
                    "{}: no selected reference for segment {}, skipping",
                    sample,
                    segment
                );
                None
            }
        })
        .collect()
}

fn tool_threads(pool_threads: usize, n_samples: usize) -> usize {
    let fan_out = pool_threads.min(n_samples.max(1));
    (pool_threads / fan_out).max(1)
}

fn find_sample_dirs(ctx: &RunContext) -> Result<Vec<String>> {
    let consensus_dir = ctx.consensus_dir();
    if !consensus_dir.is_dir() {
        return Err(Error::MissingInput(consensus_dir));
    }
    let entries = fs::read_dir(&consensus_dir).map_err(|e| Error::io(&consensus_dir, e))?;

    let mut samples = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(&consensus_dir, e))?;
        if entry.path().is_dir() {
            samples.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    samples.sort();
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_staged_segments_are_built() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("s1_L_reference.fasta"), ">ref\nACGT\n").unwrap();

        let segments = segments_with_reference(dir.path(), "s1");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].0, Segment::L);
        assert!(segments[0].1.ends_with("s1_L_reference.fasta"));
    }

    #[test]
    fn test_tool_threads_divided_by_fan_out() {
        assert_eq!(tool_threads(8, 3), 2);
        assert_eq!(tool_threads(8, 1), 8);
        assert_eq!(tool_threads(4, 8), 1);
        assert_eq!(tool_threads(1, 5), 1);
        assert_eq!(tool_threads(4, 0), 4);
    }
}
