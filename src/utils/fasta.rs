use crate::utils::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct FastaRecord {
    pub accession: String,
    pub description: String,
    pub sequence: String,
}

impl FastaRecord {
    pub fn header(&self) -> String {
        if self.description.is_empty() {
            format!(">{}", self.accession)
        } else {
            format!(">{} {}", self.accession, self.description)
        }
    }
}

/// Reads all records from a FASTA file. Sequence lines that appear before
/// any header are malformed; they are skipped and counted rather than
/// failing the whole file.
pub fn read_records(path: &Path) -> Result<Vec<FastaRecord>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    let mut current: Option<FastaRecord> = None;
    let mut n_malformed = 0;

    for line in reader.lines() {
        let line = line.map_err(|e| Error::io(path, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('>') {
            if let Some(rec) = current.take() {
                records.push(rec);
            }
            let mut fields = header.splitn(2, char::is_whitespace);
            let accession = fields.next().unwrap_or_default().to_string();
            if accession.is_empty() {
                n_malformed += 1;
                continue;
            }
            current = Some(FastaRecord {
                accession,
                description: fields.next().unwrap_or_default().trim().to_string(),
                sequence: String::new(),
            });
        } else if let Some(rec) = current.as_mut() {
            rec.sequence.push_str(line);
        } else {
            n_malformed += 1;
        }
    }
    if let Some(rec) = current.take() {
        records.push(rec);
    }

    if n_malformed > 0 {
        log::warn!(
            "{}: skipped {} malformed record line(s)",
            path.display(),
            n_malformed
        );
    }

    Ok(records)
}

/// Concatenates the sequence lines of a FASTA file, ignoring headers.
/// Matches how consensus files are scored: one sequence per file.
pub fn read_bases(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let reader = BufReader::new(file);

    let mut bases = String::new();
    for line in reader.lines() {
        let line = line.map_err(|e| Error::io(path, e))?;
        let line = line.trim();
        if !line.starts_with('>') {
            bases.push_str(line);
        }
    }
    Ok(bases)
}

/// Writes a single record with the sequence on one line.
pub fn write_record(path: &Path, record: &FastaRecord) -> Result<()> {
    let mut file = File::create(path).map_err(|e| Error::io(path, e))?;
    writeln!(file, "{}", record.header()).map_err(|e| Error::io(path, e))?;
    writeln!(file, "{}", record.sequence).map_err(|e| Error::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_multiline_records() {
        let file = write_temp(">AB123 Lassa virus L segment\nACGT\nACGT\n>CD456\nTTTT\n");
        let records = read_records(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].accession, "AB123");
        assert_eq!(records[0].description, "Lassa virus L segment");
        assert_eq!(records[0].sequence, "ACGTACGT");
        assert_eq!(records[1].accession, "CD456");
        assert_eq!(records[1].description, "");
        assert_eq!(records[1].sequence, "TTTT");
    }

    #[test]
    fn test_skips_sequence_before_header() {
        let file = write_temp("ACGT\n>AB123 desc\nACGT\n");
        let records = read_records(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sequence, "ACGT");
    }

    #[test]
    fn test_read_bases_ignores_headers() {
        let file = write_temp(">x\nACGT\nNNNN\n");
        assert_eq!(read_bases(file.path()).unwrap(), "ACGTNNNN");
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ref.fasta");
        let record = FastaRecord {
            accession: "AB123".to_string(),
            description: "segment S".to_string(),
            sequence: "ACGTACGT".to_string(),
        };
        write_record(&path, &record).unwrap();
        let records = read_records(&path).unwrap();
        assert_eq!(records, vec![record]);
    }
}
