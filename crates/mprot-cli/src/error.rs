//! CLI error types

use mprot_analyzer::AnalysisError;
use mprot_loader::LoaderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Application or plan description could not be loaded
    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// The plan is misused (not merely invalid)
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
