use serde::{Deserialize, Serialize};

/// Completeness of a consensus sequence: how much of it is made of
/// unambiguous bases, relative to the selected reference and to the
/// canonical RefSeq length. Fractions, not percentages; `None` when the
/// corresponding denominator is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessReport {
    pub total_length: usize,
    pub n_count: usize,
    pub non_n_length: usize,
    pub reference_length: usize,
    pub completeness_vs_reference: Option<f64>,
    pub completeness_vs_canonical: Option<f64>,
}

pub fn score(consensus: &str, reference_length: usize, canonical_length: usize) -> CompletenessReport {
    let total_length = consensus.len();
    let n_count = consensus.bytes().filter(|&b| b == b'N' || b == b'n').count();
    let non_n_length = total_length - n_count;

    CompletenessReport {
        total_length,
        n_count,
        non_n_length,
        reference_length,
        completeness_vs_reference: fraction(non_n_length, reference_length),
        completeness_vs_canonical: fraction(non_n_length, canonical_length),
    }
}

fn fraction(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}
