//! Binding resolution policies
//!
//! The application filters live providers (offering the capability, spare
//! capacity, not broken, not the dependent itself); a resolver only decides
//! which of those candidates to bind.

use mprot_types::{InstanceId, Requirement};
use serde::{Deserialize, Serialize};

/// Binding-resolution policy of an application
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PiVersion {
    /// First eligible providers in registration order, no backtracking
    #[default]
    #[serde(rename = "greedy", alias = "GREEDYPI")]
    GreedyPi,
}

impl PiVersion {
    pub fn resolver(&self) -> &'static dyn BindingResolver {
        match self {
            PiVersion::GreedyPi => &GreedyResolver,
        }
    }
}

impl std::fmt::Display for PiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PiVersion::GreedyPi => write!(f, "GREEDYPI"),
        }
    }
}

/// An eligible provider, in registration order
#[derive(Clone, Copy, Debug)]
pub struct Candidate<'a> {
    pub id: &'a InstanceId,
    /// Named explicitly by the action (e.g. the container of a scale-out)
    pub preferred: bool,
}

/// Chooses providers for one requirement
pub trait BindingResolver: Send + Sync {
    /// Pick exactly `needed` distinct providers among `candidates`, or `None`
    fn choose(
        &self,
        requirement: &Requirement,
        needed: usize,
        candidates: &[Candidate<'_>],
    ) -> Option<Vec<InstanceId>>;

    fn name(&self) -> &str;
}

/// Preferred candidates first, then registration order; commits immediately
#[derive(Clone, Copy, Debug, Default)]
pub struct GreedyResolver;

impl BindingResolver for GreedyResolver {
    fn choose(
        &self,
        _requirement: &Requirement,
        needed: usize,
        candidates: &[Candidate<'_>],
    ) -> Option<Vec<InstanceId>> {
        if candidates.len() < needed {
            return None;
        }
        let chosen: Vec<InstanceId> = candidates
            .iter()
            .filter(|c| c.preferred)
            .chain(candidates.iter().filter(|c| !c.preferred))
            .take(needed)
            .map(|c| c.id.clone())
            .collect();
        Some(chosen)
    }

    fn name(&self) -> &str {
        "greedy"
    }
}
