//! Loader error types

use mprot_types::{InstanceId, ManagementError};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("Cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid model: {0}")]
    Model(#[from] ManagementError),

    #[error("Setup step #{index} ({element}) failed: {source}")]
    Setup {
        index: usize,
        element: String,
        #[source]
        source: ManagementError,
    },

    #[error("Constraint refers to unknown element '{0}'")]
    UnknownElementId(String),

    #[error("Element '{element_id}' uses undeclared node '{node}'")]
    UnknownNode { element_id: String, node: String },

    #[error("Element '{element_id}' refers to instance {instance}, which neither exists nor is created by the plan")]
    UnknownInstance {
        element_id: String,
        instance: InstanceId,
    },
}

/// Result type alias for loading
pub type LoaderResult<T> = Result<T, LoaderError>;
