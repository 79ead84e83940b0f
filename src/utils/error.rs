use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline error taxonomy. Selection absorbs `ExternalTool` errors per
/// candidate; the consensus stage treats any of them as fatal for the whole
/// sample; catalog-level failures abort the run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Missing input: {0}")]
    MissingInput(PathBuf),

    #[error("{tool} failed: {message}")]
    ExternalTool { tool: String, message: String },

    #[error("Malformed record in {path}: {message}")]
    MalformedRecord { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Run-level aborts: no samples, empty candidate catalog, failed samples.
    #[error("{0}")]
    Pipeline(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn tool(tool: &str, message: impl ToString) -> Self {
        Error::ExternalTool {
            tool: tool.to_string(),
            message: message.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub fn handle_error_and_exit(err: Error) -> ! {
    log::error!("{}", err);
    std::process::exit(1);
}
