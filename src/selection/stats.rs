use crate::utils::{Error, Result};
use rust_htslib::bam::record::Aux;
use rust_htslib::bam::{self, Read};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Alignment statistics for one candidate reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingStats {
    pub accession: String,
    pub description: String,
    pub mapped_reads: u64,
    /// Aligned bases / 1000, an approximate coverage proxy.
    pub coverage: f64,
    /// Percent identity over all aligned bases, from the edit-distance tag.
    pub avg_identity: f64,
}

/// Derives mapping statistics from the aligner's SAM output. Unmapped
/// records are excluded; aligned length is the sum of the CIGAR operator
/// run-lengths; the optional `NM` edit-distance tag defaults to 0. Records
/// that fail to parse are skipped and counted, like malformed FASTA lines;
/// only a file that cannot be opened as SAM fails the candidate.
pub fn stats_from_sam(sam_path: &Path, accession: &str, description: &str) -> Result<MappingStats> {
    let mut reader = bam::Reader::from_path(sam_path).map_err(|e| Error::MalformedRecord {
        path: sam_path.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut record = bam::Record::new();

    let mut mapped_reads: u64 = 0;
    let mut aligned_len: u64 = 0;
    let mut match_len: u64 = 0;
    let mut n_malformed: u64 = 0;

    while let Some(result) = reader.read(&mut record) {
        if result.is_err() {
            n_malformed += 1;
            continue;
        }
        if record.is_unmapped() {
            continue;
        }
        mapped_reads += 1;

        let record_len: u64 = record.cigar().iter().map(|op| op.len() as u64).sum();
        aligned_len += record_len;
        match_len += record_len.saturating_sub(edit_distance(&record));
    }

    if n_malformed > 0 {
        log::warn!(
            "{}: skipped {} malformed record(s)",
            sam_path.display(),
            n_malformed
        );
    }

    Ok(MappingStats {
        accession: accession.to_string(),
        description: description.to_string(),
        mapped_reads,
        coverage: aligned_len as f64 / 1000.0,
        avg_identity: if aligned_len > 0 {
            match_len as f64 / aligned_len as f64 * 100.0
        } else {
            0.0
        },
    })
}

fn edit_distance(record: &bam::Record) -> u64 {
    match record.aux(b"NM") {
        Ok(Aux::U8(nm)) => nm as u64,
        Ok(Aux::U16(nm)) => nm as u64,
        Ok(Aux::U32(nm)) => nm as u64,
        Ok(Aux::I8(nm)) => nm.max(0) as u64,
        Ok(Aux::I16(nm)) => nm.max(0) as u64,
        Ok(Aux::I32(nm)) => nm.max(0) as u64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "@HD\tVN:1.6\tSO:unsorted\n@SQ\tSN:REF1\tLN:1000\n";

    fn write_sam(records: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".sam").tempfile().unwrap();
        write!(file, "{}", HEADER).unwrap();
        for rec in records {
            writeln!(file, "{}", rec).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_unmapped_records_excluded() {
        let file = write_sam(&[
            "r1\t0\tREF1\t1\t60\t100M\t*\t0\t0\t*\t*\tNM:i:5",
            "r2\t4\t*\t0\t0\t*\t*\t0\t0\t*\t*",
        ]);
        let stats = stats_from_sam(file.path(), "REF1", "").unwrap();
        assert_eq!(stats.mapped_reads, 1);
        assert_eq!(stats.coverage, 0.1);
        assert!((stats.avg_identity - 95.0).abs() < 1e-9);
    }

    #[test]
    fn test_cigar_run_lengths_summed() {
        // 50M + 10I + 20D + 5S = 85 aligned bases
        let file = write_sam(&["r1\t0\tREF1\t1\t60\t50M10I20D5S\t*\t0\t0\t*\t*\tNM:i:0"]);
        let stats = stats_from_sam(file.path(), "REF1", "").unwrap();
        assert_eq!(stats.coverage, 0.085);
        assert_eq!(stats.avg_identity, 100.0);
    }

    #[test]
    fn test_missing_nm_defaults_to_zero() {
        let file = write_sam(&["r1\t0\tREF1\t1\t60\t100M\t*\t0\t0\t*\t*"]);
        let stats = stats_from_sam(file.path(), "REF1", "").unwrap();
        assert_eq!(stats.avg_identity, 100.0);
    }

    #[test]
    fn test_malformed_record_skipped_and_counted() {
        // The broken line is skipped; the valid records around it still count.
        let file = write_sam(&[
            "r1\t0\tREF1\t1\t60\t100M\t*\t0\t0\t*\t*\tNM:i:0",
            "r2\tnot_a_flag\tREF1",
            "r3\t0\tREF1\t1\t60\t50M\t*\t0\t0\t*\t*\tNM:i:0",
        ]);
        let stats = stats_from_sam(file.path(), "REF1", "").unwrap();
        assert_eq!(stats.mapped_reads, 2);
        assert_eq!(stats.coverage, 0.15);
    }

    #[test]
    fn test_unreadable_file_is_malformed_record_error() {
        let err = stats_from_sam(Path::new("/nonexistent/reads.sam"), "REF1", "").unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { .. }));
    }

    #[test]
    fn test_no_mapped_reads() {
        let file = write_sam(&["r1\t4\t*\t0\t0\t*\t*\t0\t0\t*\t*"]);
        let stats = stats_from_sam(file.path(), "REF1", "").unwrap();
        assert_eq!(stats.mapped_reads, 0);
        assert_eq!(stats.avg_identity, 0.0);
    }
}
