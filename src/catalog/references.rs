use crate::segment::Segment;
use crate::tools::retrieval::ReferenceRetrieval;
use crate::utils::{fasta, Result, RunContext};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// A candidate reference sequence from the retrieved catalog.
#[derive(Debug, Clone)]
pub struct ReferenceCandidate {
    pub accession: String,
    pub segment: Segment,
    pub description: String,
    pub sequence: String,
    pub source_file: PathBuf,
}

/// Triggers the external retrieval service, populating
/// `references/FASTA/{L_segment,S_segment}/`.
pub fn fetch_catalog(ctx: &RunContext, retrieval: &ReferenceRetrieval) -> Result<()> {
    let filters = &retrieval.filters;
    log::info!(
        "Retrieving reference catalog (genome={}, completeness={}%, host={}, metadata={})",
        filters.genome,
        filters.min_completeness,
        filters.host,
        filters.metadata
    );
    retrieval.fetch(&ctx.references_dir())
}

/// Loads the retrieved catalog into per-segment candidate sets, one record
/// per accession. Files are visited in sorted order and records in file
/// order; this enumeration order is the selection tie-break order.
pub fn load_candidates(ctx: &RunContext) -> Result<BTreeMap<Segment, Vec<ReferenceCandidate>>> {
    let mut catalog = BTreeMap::new();
    for segment in Segment::ALL {
        let mut candidates = Vec::new();
        let segment_dir = ctx.catalog_dir(segment);
        if segment_dir.exists() {
            for path in fasta_files(&segment_dir)? {
                for record in fasta::read_records(&path)? {
                    candidates.push(ReferenceCandidate {
                        accession: record.accession,
                        segment,
                        description: record.description,
                        sequence: record.sequence,
                        source_file: path.clone(),
                    });
                }
            }
        }
        log::info!("{} segment: {} candidate references", segment, candidates.len());
        catalog.insert(segment, candidates);
    }
    Ok(catalog)
}

fn fasta_files(dir: &PathBuf) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| crate::utils::Error::io(dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| crate::utils::Error::io(dir, e))?;
        let path = entry.path();
        let is_fasta = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "fasta" || ext == "fa");
        if is_fasta {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_candidates_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new(PathBuf::from("/in"), dir.path().to_path_buf(), 1);

        let l_dir = ctx.catalog_dir(Segment::L);
        fs::create_dir_all(&l_dir).unwrap();
        fs::write(l_dir.join("b.fasta"), ">B2 second file\nGGGG\n").unwrap();
        fs::write(l_dir.join("a.fasta"), ">A1 first file\nACGT\n>A2\nTTTT\n").unwrap();

        let catalog = load_candidates(&ctx).unwrap();
        let l_candidates = &catalog[&Segment::L];
        let accessions: Vec<&str> = l_candidates.iter().map(|c| c.accession.as_str()).collect();
        assert_eq!(accessions, vec!["A1", "A2", "B2"]);
        assert!(catalog[&Segment::S].is_empty());
    }
}
