//! Plan misuse errors

use mprot_types::PlanError;

/// A plan that cannot be analyzed at all
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Malformed element #{index}: {source}")]
    MalformedElement {
        index: usize,
        #[source]
        source: PlanError,
    },

    #[error("Constraint {constraint} names an element that is not in the plan")]
    ConstraintOutsidePlan { constraint: String },

    #[error("Constraints are cyclic between: {}", elements.join(", "))]
    CyclicConstraints { elements: Vec<String> },

    #[error("{element} has no matching opStart in the plan and the instance is not performing it")]
    UnmatchedOpEnd { element: String },

    #[error("Search budget of {limit} orderings exhausted before a verdict")]
    SearchBudgetExhausted { limit: usize },
}

/// Result type alias for analysis
pub type AnalysisResult<T> = Result<T, AnalysisError>;
