//! Faults and broken instances

use mprot_types::{FaultKind, InstanceId, TransitionId};
use serde::Serialize;

/// A requirement of `instance` that lost its provider
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Fault {
    pub instance: InstanceId,
    pub capability: String,
    pub lost_provider: InstanceId,
    pub kind: FaultKind,
    /// A φ handler of the state covered `kind`, but neither rebinding nor
    /// recovery worked
    pub handled: bool,
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} on {}: requirement '{}' lost provider {}",
            self.kind, self.instance, self.capability, self.lost_provider
        )?;
        if self.handled {
            write!(f, " (handler failed)")?;
        }
        Ok(())
    }
}

/// Why an instance is broken
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum BrokenCause {
    /// A fault the current state did not handle, or whose handler failed
    Fault(Fault),
    /// `op_end` could not satisfy the target state's requirements
    FailedOperation {
        transition: TransitionId,
        capability: String,
    },
}

impl BrokenCause {
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Fault(fault) => Some(fault),
            Self::FailedOperation { .. } => None,
        }
    }
}

impl std::fmt::Display for BrokenCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fault(fault) => write!(f, "fault {}", fault),
            Self::FailedOperation {
                transition,
                capability,
            } => write!(
                f,
                "failed operation {}: requirement '{}' unsatisfiable",
                transition, capability
            ),
        }
    }
}
