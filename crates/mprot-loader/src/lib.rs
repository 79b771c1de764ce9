//! Config Loader for mprot
//!
//! Reads JSON descriptions of an application (node types, protocols and an
//! optional setup sequence) and of a plan to check against it.
//!
//! # Key Concepts
//!
//! - [`ApplicationDocument`]: node types plus the `setup` steps that bring
//!   the application to the snapshot a plan starts from
//! - [`PlanWrapper`]: labelled elements and constraints, either an unordered
//!   plan or a sequence

#![deny(unsafe_code)]

mod application;
mod error;
mod plan;

pub use application::*;
pub use error::*;
pub use plan::*;

use mprot_application::Application;
use std::path::Path;
use tracing::info;

fn read(path: &Path) -> LoaderResult<String> {
    std::fs::read_to_string(path).map_err(|source| LoaderError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse and build an application description
pub fn parse_application(text: &str) -> LoaderResult<Application> {
    let document: ApplicationDocument = serde_json::from_str(text)?;
    document.build()
}

pub fn load_application(path: impl AsRef<Path>) -> LoaderResult<Application> {
    let path = path.as_ref();
    let app = parse_application(&read(path)?)?;
    info!(path = %path.display(), instances = app.instance_count(), "Application loaded");
    Ok(app)
}

/// Parse a plan description
pub fn parse_plan(text: &str) -> LoaderResult<PlanWrapper> {
    let document: PlanDocument = serde_json::from_str(text)?;
    PlanWrapper::from_document(document)
}

pub fn load_plan(path: impl AsRef<Path>) -> LoaderResult<PlanWrapper> {
    let path = path.as_ref();
    let plan = parse_plan(&read(path)?)?;
    info!(path = %path.display(), kind = %plan.kind(), elements = plan.len(), "Plan loaded");
    Ok(plan)
}
