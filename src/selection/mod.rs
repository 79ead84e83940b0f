pub mod ledger;
pub mod selector;
pub mod stats;

pub use ledger::SelectionLedger;
pub use selector::{select_for_sample, BestReference, SelectionResult};
pub use stats::MappingStats;
