//! Verdicts and failure reports

use mprot_application::BrokenCause;
use mprot_types::{ExecutableElement, InstanceId, ManagementError};
use serde::{Deserialize, Serialize, Serializer};

/// Which validity notion a plan is checked against
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    /// Every allowed ordering must succeed
    #[default]
    Strict,
    /// One allowed ordering succeeding is enough
    Weak,
}

impl std::fmt::Display for Validity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Validity::Strict => write!(f, "strict"),
            Validity::Weak => write!(f, "weak"),
        }
    }
}

/// How an ordering failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FailType {
    /// The element itself raised
    Operation,
    /// A step succeeded but left an instance broken by a fault its state
    /// has no handler for
    BrokenInstance,
    /// A step succeeded but a handled fault could neither rebind nor
    /// recover, leaving the instance broken
    Fault,
}

impl std::fmt::Display for FailType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailType::Operation => write!(f, "OPERATION"),
            FailType::BrokenInstance => write!(f, "BROKENINSTANCE"),
            FailType::Fault => write!(f, "FAULT"),
        }
    }
}

/// An instance left broken with no way out
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FatalFault {
    pub instance: InstanceId,
    pub cause: BrokenCause,
}

impl std::fmt::Display for FatalFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} is broken ({})", self.instance, self.cause)
    }
}

/// Why one ordering failed.
///
/// Exactly one of `failed_element`, `failed_broken_instance_id` and
/// `fatal_fault` is set, matching `fail_type`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnalysisFailReport {
    pub fail_type: FailType,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<ManagementError>,
    pub failed_element: Option<ExecutableElement>,
    pub failed_broken_instance_id: Option<InstanceId>,
    pub fatal_fault: Option<FatalFault>,
    /// The ordering tried, up to and including the failing element
    pub sequence: Vec<ExecutableElement>,
}

impl AnalysisFailReport {
    pub fn operation(
        element: ExecutableElement,
        error: ManagementError,
        sequence: Vec<ExecutableElement>,
    ) -> Self {
        Self {
            fail_type: FailType::Operation,
            error: Some(error),
            failed_element: Some(element),
            failed_broken_instance_id: None,
            fatal_fault: None,
            sequence,
        }
    }

    pub fn broken_instance(instance: InstanceId, sequence: Vec<ExecutableElement>) -> Self {
        Self {
            fail_type: FailType::BrokenInstance,
            error: None,
            failed_element: None,
            failed_broken_instance_id: Some(instance),
            fatal_fault: None,
            sequence,
        }
    }

    pub fn fault(fault: FatalFault, sequence: Vec<ExecutableElement>) -> Self {
        Self {
            fail_type: FailType::Fault,
            error: None,
            failed_element: None,
            failed_broken_instance_id: None,
            fatal_fault: Some(fault),
            sequence,
        }
    }

    /// The element the ordering stopped at
    pub fn last_element(&self) -> Option<&ExecutableElement> {
        self.sequence.last()
    }
}

impl std::fmt::Display for AnalysisFailReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.fail_type)?;
        if let Some(element) = &self.failed_element {
            write!(f, " at {}", element)?;
        }
        if let Some(instance) = &self.failed_broken_instance_id {
            write!(f, " on broken instance {}", instance)?;
        }
        if let Some(fault) = &self.fatal_fault {
            write!(f, ": {}", fault)?;
        }
        if let Some(error) = &self.error {
            write!(f, ": {}", error)?;
        }
        Ok(())
    }
}

fn serialize_error<S: Serializer>(
    error: &Option<ManagementError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Outcome of checking one plan
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlanVerdict {
    pub validity: Validity,
    pub valid: bool,
    /// A successful ordering, when one was found
    pub witness: Option<Vec<ExecutableElement>>,
    /// The first failing ordering explored, when one was found
    pub failure: Option<AnalysisFailReport>,
    /// Orderings explored, counting those cut short by a failure
    pub orderings_explored: usize,
}
