use crate::utils::{Error, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Counts reads in a FASTQ file (gzipped or plain). Four lines per read.
pub fn count_reads(path: &Path) -> Result<u64> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut n_lines: u64 = 0;
    for line in BufReader::new(reader).lines() {
        line.map_err(|e| Error::io(path, e))?;
        n_lines += 1;
    }
    Ok(n_lines / 4)
}
