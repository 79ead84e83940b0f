use crate::catalog::{ReferenceCandidate, Sample};
use crate::segment::Segment;
use crate::selection::stats::{stats_from_sam, MappingStats};
use crate::tools::aligner::Aligner;
use crate::utils::{create_dir_all, fasta, remove_dir_all_logged, Result, RunContext};
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// The winning candidate for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestReference {
    pub file: String,
    pub accession: String,
    pub description: String,
}

/// Per-segment selection outcome: the winner (if any candidate mapped) and
/// the full ranked statistics list kept as an audit trail.
#[derive(Debug, Clone, Default)]
pub struct SelectionResult {
    pub best: Option<BestReference>,
    pub best_stats: Option<MappingStats>,
    pub ranked: Vec<MappingStats>,
}

/// Orders candidate statistics by descending mapped-read count. The sort is
/// stable over enumeration order, so ties always resolve to the
/// first-enumerated candidate. This tie-break is deterministic but
/// arbitrary; no product requirement pins it down.
pub fn rank(stats: Vec<MappingStats>) -> Vec<MappingStats> {
    stats
        .into_iter()
        .sorted_by(|a, b| b.mapped_reads.cmp(&a.mapped_reads))
        .collect()
}

fn to_result(ranked: Vec<MappingStats>, candidates: &[ReferenceCandidate]) -> SelectionResult {
    let best_stats = ranked.first().cloned();
    let best = best_stats.as_ref().and_then(|stats| {
        candidates
            .iter()
            .find(|c| c.accession == stats.accession)
            .map(|c| BestReference {
                file: c.source_file.display().to_string(),
                accession: c.accession.clone(),
                description: c.description.clone(),
            })
    });
    SelectionResult {
        best,
        best_stats,
        ranked,
    }
}

/// Selects the best-matching reference for every segment of one sample by
/// aligning its subsampled reads against each candidate and comparing
/// mapped-read counts.
pub fn select_for_sample(
    ctx: &RunContext,
    sample: &Sample,
    catalog: &BTreeMap<Segment, Vec<ReferenceCandidate>>,
    aligner: &Aligner,
) -> Result<BTreeMap<Segment, SelectionResult>> {
    let temp_dir = ctx.sample_selection_dir(&sample.name).join("temp");
    create_dir_all(&temp_dir)?;

    let outcome = select_in_temp_dir(ctx, sample, catalog, aligner, &temp_dir);

    // The temp directory never outlives selection, success or not.
    remove_dir_all_logged(&temp_dir);
    outcome
}

fn select_in_temp_dir(
    ctx: &RunContext,
    sample: &Sample,
    catalog: &BTreeMap<Segment, Vec<ReferenceCandidate>>,
    aligner: &Aligner,
    temp_dir: &Path,
) -> Result<BTreeMap<Segment, SelectionResult>> {
    let mut results = BTreeMap::new();
    for segment in Segment::ALL {
        let candidates = catalog.get(&segment).map_or(&[][..], |c| c.as_slice());
        log::info!(
            "{}: comparing {} candidate references for segment {}",
            sample.name,
            candidates.len(),
            segment
        );

        // Per-candidate alignments are independent; fan them out and merge
        // deterministically by enumeration index.
        let mut evaluated: Vec<(usize, MappingStats)> = candidates
            .par_iter()
            .enumerate()
            .filter_map(|(index, candidate)| {
                match evaluate_candidate(sample, candidate, aligner, temp_dir) {
                    Ok(stats) => Some((index, stats)),
                    Err(err) => {
                        log::warn!(
                            "{}: alignment against {} failed, skipping candidate: {}",
                            sample.name,
                            candidate.accession,
                            err
                        );
                        None
                    }
                }
            })
            .collect();
        evaluated.sort_by_key(|(index, _)| *index);

        let ranked = rank(evaluated.into_iter().map(|(_, stats)| stats).collect());
        let result = to_result(ranked, candidates);

        match &result.best {
            Some(best) => log::info!(
                "{}: best {} segment reference is {} ({} mapped reads)",
                sample.name,
                segment,
                best.accession,
                result.best_stats.as_ref().map_or(0, |s| s.mapped_reads)
            ),
            None => log::warn!(
                "{}: no usable reference for segment {}; downstream stages will skip it",
                sample.name,
                segment
            ),
        }

        if let Some(best) = &result.best {
            materialize_winner(ctx, &sample.name, segment, best, candidates)?;
        }
        results.insert(segment, result);
    }
    Ok(results)
}

/// Writes the candidate to a single-sequence FASTA, aligns the subsample
/// against it and extracts statistics. Both intermediate files are deleted
/// before returning, on success and on failure.
fn evaluate_candidate(
    sample: &Sample,
    candidate: &ReferenceCandidate,
    aligner: &Aligner,
    temp_dir: &Path,
) -> Result<MappingStats> {
    let ref_fasta = temp_dir.join(format!(
        "temp_{}_{}.fasta",
        candidate.segment, candidate.accession
    ));
    let out_sam = temp_dir.join(format!(
        "{}_{}_{}.sam",
        sample.name, candidate.segment, candidate.accession
    ));

    fasta::write_record(
        &ref_fasta,
        &fasta::FastaRecord {
            accession: candidate.accession.clone(),
            description: candidate.description.clone(),
            sequence: candidate.sequence.clone(),
        },
    )?;

    let stats = aligner
        .align_to_sam(&sample.subsampled_reads, &ref_fasta, &out_sam)
        .and_then(|_| stats_from_sam(&out_sam, &candidate.accession, &candidate.description));

    for path in [&ref_fasta, &out_sam] {
        if path.exists() {
            if let Err(e) = fs::remove_file(path) {
                log::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
    stats
}

/// Writes the winning sequence to the per-sample selection directory for the
/// consensus stage to pick up.
fn materialize_winner(
    ctx: &RunContext,
    sample: &str,
    segment: Segment,
    best: &BestReference,
    candidates: &[ReferenceCandidate],
) -> Result<()> {
    let winner = candidates
        .iter()
        .find(|c| c.accession == best.accession)
        .expect("winner comes from the candidate list");
    fasta::write_record(
        &ctx.best_reference(sample, segment),
        &fasta::FastaRecord {
            accession: winner.accession.clone(),
            description: winner.description.clone(),
            sequence: winner.sequence.clone(),
        },
    )
}
