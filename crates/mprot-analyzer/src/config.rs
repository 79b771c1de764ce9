//! Analyzer configuration

use serde::{Deserialize, Serialize};

/// Limits applied to the ordering search
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Maximum number of orderings (complete or cut short by a failure) to
    /// explore; `None` means unbounded
    pub max_orderings: Option<usize>,
}

impl AnalyzerConfig {
    pub fn with_max_orderings(mut self, max: usize) -> Self {
        self.max_orderings = Some(max);
        self
    }
}
