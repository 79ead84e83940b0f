pub mod references;
pub mod samples;

pub use references::{load_candidates, ReferenceCandidate};
pub use samples::{find_samples, prepare_sample, Sample};
