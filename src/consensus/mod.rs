pub mod aggregate;
pub mod completeness;
pub mod pipeline;

pub use aggregate::{Aggregator, RunSummary};
pub use completeness::CompletenessReport;
pub use pipeline::{ConsensusArtifact, ConsensusPipeline};
