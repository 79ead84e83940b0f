mod context;
mod error;
pub mod fasta;
pub mod fastq;

pub use context::{create_dir_all, remove_dir_all_logged, RunContext};
pub use error::{handle_error_and_exit, Error, Result};
