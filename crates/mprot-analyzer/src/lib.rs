//! Plan Analyzer for mprot
//!
//! Decides whether a plan (management actions plus ordering constraints) can
//! run against an [`Application`](mprot_application::Application) snapshot.
//!
//! # Key Concepts
//!
//! - **Strict validity**: every ordering allowed by the constraints succeeds
//! - **Weak validity**: at least one allowed ordering succeeds
//! - **Misuse**: structurally wrong plans (empty fields, constraints on
//!   elements outside the plan, cycles, an `OpEnd` with nothing to end) are
//!   rejected with an [`AnalysisError`] before any ordering is tried
//!
//! Orderings are explored depth-first in element order, each branch on its
//! own clone of the application, stopping as soon as the verdict is known.

#![deny(unsafe_code)]

mod analyzer;
mod config;
mod error;
mod plan;
mod report;
mod search;

pub use analyzer::*;
pub use config::*;
pub use error::*;
pub use plan::PreparedPlan;
pub use report::*;
