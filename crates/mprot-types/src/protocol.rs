//! Management protocols: the finite-state lifecycle of a node type
//!
//! A protocol is built once (states, operations, transitions, then the
//! ρ/γ/φ tables) and only read afterwards. Every stable state and every
//! pending state (one per transition) owns exactly one entry in each table;
//! entries start empty and `add_*_entry` replaces them.

use crate::{ManagementError, ManagementResult, TransitionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Protocol State ───────────────────────────────────────────────────

/// A state an instance can be in: a declared stable state, or the pending
/// state of a transition whose operation has started but not ended.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ProtocolState {
    Stable(String),
    Pending(TransitionId),
}

impl ProtocolState {
    pub fn stable(name: impl Into<String>) -> Self {
        Self::Stable(name.into())
    }

    pub fn pending(transition: TransitionId) -> Self {
        Self::Pending(transition)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Name of the stable state, `None` while pending
    pub fn stable_name(&self) -> Option<&str> {
        match self {
            Self::Stable(name) => Some(name),
            Self::Pending(_) => None,
        }
    }

    pub fn pending_transition(&self) -> Option<&TransitionId> {
        match self {
            Self::Stable(_) => None,
            Self::Pending(id) => Some(id),
        }
    }

    /// The state name; for pending states this is the transition identifier
    pub fn name(&self) -> &str {
        match self {
            Self::Stable(name) => name,
            Self::Pending(id) => id.as_str(),
        }
    }
}

impl std::fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stable(name) => write!(f, "{}", name),
            Self::Pending(id) => write!(f, "pending({})", id),
        }
    }
}

// ── Transition ───────────────────────────────────────────────────────

/// One `source --operation--> target` step of a protocol
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transition {
    id: TransitionId,
    source: String,
    operation: String,
    target: String,
}

impl Transition {
    pub fn new(
        source: impl Into<String>,
        operation: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let operation = operation.into();
        let target = target.into();
        Self {
            id: TransitionId::of(&source, &operation, &target),
            source,
            operation,
            target,
        }
    }

    pub fn id(&self) -> &TransitionId {
        &self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// The pending state an instance occupies while this transition runs
    pub fn pending_state(&self) -> ProtocolState {
        ProtocolState::Pending(self.id.clone())
    }
}

// ── ρ / γ / φ entries ────────────────────────────────────────────────

/// A capability a state needs from other live instances
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    pub capability: String,
    /// Number of distinct providers needed
    #[serde(default = "default_multiplicity")]
    pub multiplicity: u32,
}

fn default_multiplicity() -> u32 {
    1
}

impl Requirement {
    pub fn new(capability: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            multiplicity: 1,
        }
    }

    pub fn with_multiplicity(mut self, multiplicity: u32) -> Self {
        self.multiplicity = multiplicity;
        self
    }
}

impl From<&str> for Requirement {
    fn from(capability: &str) -> Self {
        Self::new(capability)
    }
}

/// A capability a state provides to dependents
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Offer {
    pub capability: String,
    /// Maximum number of requirement bindings served at once; unbounded if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

impl Offer {
    pub fn new(capability: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            capacity: None,
        }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

impl From<&str> for Offer {
    fn from(capability: &str) -> Self {
        Self::new(capability)
    }
}

/// Kinds of fault an instance can suffer when a provider goes away
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// A provider bound to one of the instance's requirements was removed,
    /// stopped offering the capability, or broke
    DependencyLost,
    /// Same as `DependencyLost`, but the lost provider is the instance's container
    ContainerLost,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DependencyLost => write!(f, "dependency_lost"),
            Self::ContainerLost => write!(f, "container_lost"),
        }
    }
}

/// A fault a state tolerates.
///
/// The instance first tries to rebind the lost requirement; failing that it
/// falls back to `recovery`, when one is declared.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaultHandler {
    pub fault: FaultKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery: Option<String>,
}

impl FaultHandler {
    pub fn new(fault: FaultKind) -> Self {
        Self {
            fault,
            recovery: None,
        }
    }

    pub fn with_recovery(mut self, state: impl Into<String>) -> Self {
        self.recovery = Some(state.into());
        self
    }
}

impl From<FaultKind> for FaultHandler {
    fn from(fault: FaultKind) -> Self {
        Self::new(fault)
    }
}

// ── Management Protocol ──────────────────────────────────────────────

/// The finite-state machine of one node type
#[derive(Clone, Debug, Default)]
pub struct ManagementProtocol {
    /// Declared stable states, in declaration order
    states: Vec<String>,
    /// Declared operations, in declaration order
    operations: Vec<String>,
    /// Transitions, in declaration order
    transitions: Vec<Transition>,
    rho: HashMap<ProtocolState, Vec<Requirement>>,
    gamma: HashMap<ProtocolState, Vec<Offer>>,
    phi: HashMap<ProtocolState, Vec<FaultHandler>>,
}

impl ManagementProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a stable state. Declaring the same state twice is a no-op.
    pub fn add_state(&mut self, name: impl Into<String>) -> ManagementResult<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(ManagementError::rule("state name must not be empty"));
        }
        if !self.has_state(&name) {
            self.init_tables(ProtocolState::Stable(name.clone()));
            self.states.push(name);
        }
        Ok(())
    }

    /// Declare an operation. Declaring the same operation twice is a no-op.
    pub fn add_operation(&mut self, name: impl Into<String>) -> ManagementResult<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(ManagementError::rule("operation name must not be empty"));
        }
        if !self.has_operation(&name) {
            self.operations.push(name);
        }
        Ok(())
    }

    /// Declare `source --operation--> target`.
    ///
    /// Both states and the operation must already be declared, and at most
    /// one transition may leave a state through a given operation.
    pub fn add_transition(
        &mut self,
        source: &str,
        operation: &str,
        target: &str,
    ) -> ManagementResult<TransitionId> {
        if !self.has_state(source) {
            return Err(ManagementError::rule(format!(
                "transition source state '{}' is not declared",
                source
            )));
        }
        if !self.has_state(target) {
            return Err(ManagementError::rule(format!(
                "transition target state '{}' is not declared",
                target
            )));
        }
        if !self.has_operation(operation) {
            return Err(ManagementError::rule(format!(
                "transition operation '{}' is not declared",
                operation
            )));
        }

        let transition = Transition::new(source, operation, target);
        if let Some(existing) = self.transition_by_op(source, operation) {
            return Err(ManagementError::rule(format!(
                "state '{}' already leaves through '{}' (transition {})",
                source,
                operation,
                existing.id()
            )));
        }
        if self.transition(transition.id()).is_some() {
            return Err(ManagementError::rule(format!(
                "transition identifier {} is already taken",
                transition.id()
            )));
        }

        let id = transition.id().clone();
        self.init_tables(transition.pending_state());
        self.transitions.push(transition);
        Ok(id)
    }

    /// Set ρ(state)
    pub fn add_rho_entry(
        &mut self,
        state: &ProtocolState,
        requirements: Vec<Requirement>,
    ) -> ManagementResult<()> {
        self.ensure_known(state)?;
        for (i, requirement) in requirements.iter().enumerate() {
            if requirements[..i]
                .iter()
                .any(|r| r.capability == requirement.capability)
            {
                return Err(ManagementError::rule(format!(
                    "{} requires '{}' twice",
                    state, requirement.capability
                )));
            }
            if requirement.capability.is_empty() {
                return Err(ManagementError::rule(format!(
                    "requirement of {} has an empty capability",
                    state
                )));
            }
            if requirement.multiplicity == 0 {
                return Err(ManagementError::rule(format!(
                    "requirement '{}' of {} has multiplicity 0",
                    requirement.capability, state
                )));
            }
        }
        self.rho.insert(state.clone(), requirements);
        Ok(())
    }

    /// Set γ(state)
    pub fn add_gamma_entry(
        &mut self,
        state: &ProtocolState,
        offers: Vec<Offer>,
    ) -> ManagementResult<()> {
        self.ensure_known(state)?;
        for (i, offer) in offers.iter().enumerate() {
            if offers[..i].iter().any(|o| o.capability == offer.capability) {
                return Err(ManagementError::rule(format!(
                    "{} offers '{}' twice",
                    state, offer.capability
                )));
            }
            if offer.capability.is_empty() {
                return Err(ManagementError::rule(format!(
                    "offer of {} has an empty capability",
                    state
                )));
            }
            if offer.capacity == Some(0) {
                return Err(ManagementError::rule(format!(
                    "offer '{}' of {} has capacity 0",
                    offer.capability, state
                )));
            }
        }
        self.gamma.insert(state.clone(), offers);
        Ok(())
    }

    /// Set φ(state)
    pub fn add_phi_entry(
        &mut self,
        state: &ProtocolState,
        handlers: Vec<FaultHandler>,
    ) -> ManagementResult<()> {
        self.ensure_known(state)?;
        for handler in &handlers {
            if let Some(recovery) = &handler.recovery {
                if !self.has_state(recovery) {
                    return Err(ManagementError::rule(format!(
                        "fault handler of {} recovers to undeclared state '{}'",
                        state, recovery
                    )));
                }
            }
        }
        self.phi.insert(state.clone(), handlers);
        Ok(())
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn states(&self) -> &[String] {
        &self.states
    }

    pub fn operations(&self) -> &[String] {
        &self.operations
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.states.iter().any(|s| s == name)
    }

    pub fn has_operation(&self, name: &str) -> bool {
        self.operations.iter().any(|o| o == name)
    }

    /// Whether `state` is a declared stable state or the pending state of a declared transition
    pub fn knows(&self, state: &ProtocolState) -> bool {
        match state {
            ProtocolState::Stable(name) => self.has_state(name),
            ProtocolState::Pending(id) => self.transition(id).is_some(),
        }
    }

    pub fn transition(&self, id: &TransitionId) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.id() == id)
    }

    /// Transitions leaving the stable state `state`, in declaration order
    pub fn transitions_from(&self, state: &str) -> Vec<&Transition> {
        self.transitions
            .iter()
            .filter(|t| t.source() == state)
            .collect()
    }

    /// The transition leaving `state` through `operation`, if any
    pub fn transition_by_op(&self, state: &str, operation: &str) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|t| t.source() == state && t.operation() == operation)
    }

    pub fn requirements_of(&self, state: &ProtocolState) -> &[Requirement] {
        self.rho.get(state).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn offers_of(&self, state: &ProtocolState) -> &[Offer] {
        self.gamma.get(state).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn fault_handlers_of(&self, state: &ProtocolState) -> &[FaultHandler] {
        self.phi.get(state).map(Vec::as_slice).unwrap_or_default()
    }

    /// The first handler of `state` covering `fault`
    pub fn handler_for(&self, state: &ProtocolState, fault: FaultKind) -> Option<&FaultHandler> {
        self.fault_handlers_of(state)
            .iter()
            .find(|h| h.fault == fault)
    }

    /// The offer of `capability` in `state`, if the state offers it
    pub fn offer_in(&self, state: &ProtocolState, capability: &str) -> Option<&Offer> {
        self.offers_of(state)
            .iter()
            .find(|o| o.capability == capability)
    }

    // ── Internal helpers ─────────────────────────────────────────────

    fn init_tables(&mut self, state: ProtocolState) {
        self.rho.entry(state.clone()).or_default();
        self.gamma.entry(state.clone()).or_default();
        self.phi.entry(state).or_default();
    }

    fn ensure_known(&self, state: &ProtocolState) -> ManagementResult<()> {
        if self.knows(state) {
            Ok(())
        } else {
            Err(ManagementError::rule(format!("state {} is not declared", state)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_state_protocol() -> ManagementProtocol {
        let mut protocol = ManagementProtocol::new();
        for state in ["state1", "state2", "state3"] {
            protocol.add_state(state).unwrap();
        }
        for op in ["goToState2", "goToState3", "goToState3Bis"] {
            protocol.add_operation(op).unwrap();
        }
        protocol
            .add_transition("state1", "goToState3", "state3")
            .unwrap();
        protocol
            .add_transition("state1", "goToState3Bis", "state3")
            .unwrap();
        protocol
            .add_transition("state3", "goToState2", "state2")
            .unwrap();
        protocol
    }

    #[test]
    fn test_transition_ids_are_concatenations() {
        let protocol = three_state_protocol();
        let ids: Vec<&str> = protocol
            .transitions()
            .iter()
            .map(|t| t.id().as_str())
            .collect();
        assert_eq!(
            ids,
            vec![
                "state1goToState3state3",
                "state1goToState3Bisstate3",
                "state3goToState2state2"
            ]
        );
    }

    #[test]
    fn test_transition_requires_declared_states_and_operation() {
        let mut protocol = three_state_protocol();

        let err = protocol
            .add_transition("state9", "goToState2", "state2")
            .unwrap_err();
        assert!(matches!(err, ManagementError::RuleNotApplicable(_)));

        let err = protocol
            .add_transition("state1", "goToState2", "nowhere")
            .unwrap_err();
        assert!(matches!(err, ManagementError::RuleNotApplicable(_)));

        let err = protocol
            .add_transition("state1", "explode", "state2")
            .unwrap_err();
        assert!(matches!(err, ManagementError::RuleNotApplicable(_)));
    }

    #[test]
    fn test_one_transition_per_state_and_operation() {
        let mut protocol = three_state_protocol();
        let err = protocol
            .add_transition("state1", "goToState3", "state2")
            .unwrap_err();
        assert!(matches!(err, ManagementError::RuleNotApplicable(_)));
    }

    #[test]
    fn test_lookups_by_state_and_operation() {
        let protocol = three_state_protocol();

        assert_eq!(protocol.transitions_from("state1").len(), 2);
        assert_eq!(protocol.transitions_from("state2").len(), 0);

        let t = protocol.transition_by_op("state3", "goToState2").unwrap();
        assert_eq!(t.target(), "state2");
        assert!(protocol.transition_by_op("state2", "goToState3").is_none());
    }

    #[test]
    fn test_tables_default_to_empty_for_stable_and_pending_states() {
        let protocol = three_state_protocol();
        let stable = ProtocolState::stable("state1");
        let pending = protocol.transitions()[0].pending_state();

        assert!(protocol.requirements_of(&stable).is_empty());
        assert!(protocol.offers_of(&pending).is_empty());
        assert!(protocol.fault_handlers_of(&pending).is_empty());
    }

    #[test]
    fn test_tables_reject_unknown_states() {
        let mut protocol = three_state_protocol();
        let err = protocol
            .add_rho_entry(&ProtocolState::stable("ghost"), vec!["db".into()])
            .unwrap_err();
        assert!(matches!(err, ManagementError::RuleNotApplicable(_)));

        let bogus = ProtocolState::pending(TransitionId::of("state2", "goToState3", "state3"));
        assert!(protocol.add_gamma_entry(&bogus, vec!["db".into()]).is_err());
    }

    #[test]
    fn test_pending_state_tables() {
        let mut protocol = three_state_protocol();
        let pending = protocol.transitions()[2].pending_state();
        protocol
            .add_rho_entry(&pending, vec![Requirement::new("db").with_multiplicity(2)])
            .unwrap();
        protocol
            .add_gamma_entry(&pending, vec![Offer::new("http").with_capacity(3)])
            .unwrap();

        assert_eq!(protocol.requirements_of(&pending)[0].multiplicity, 2);
        assert_eq!(
            protocol.offer_in(&pending, "http").unwrap().capacity,
            Some(3)
        );
    }

    #[test]
    fn test_entry_validation() {
        let mut protocol = three_state_protocol();
        let state = ProtocolState::stable("state1");

        assert!(protocol
            .add_rho_entry(&state, vec![Requirement::new("db").with_multiplicity(0)])
            .is_err());
        assert!(protocol
            .add_gamma_entry(&state, vec![Offer::new("db").with_capacity(0)])
            .is_err());
        assert!(protocol
            .add_rho_entry(&state, vec!["db".into(), "db".into()])
            .is_err());
        assert!(protocol
            .add_gamma_entry(&state, vec!["db".into(), Offer::new("db").with_capacity(2)])
            .is_err());
        assert!(protocol
            .add_phi_entry(
                &state,
                vec![FaultHandler::new(FaultKind::DependencyLost).with_recovery("ghost")]
            )
            .is_err());
    }

    #[test]
    fn test_handler_lookup_by_fault_kind() {
        let mut protocol = three_state_protocol();
        let state = ProtocolState::stable("state3");
        protocol
            .add_phi_entry(
                &state,
                vec![FaultHandler::new(FaultKind::DependencyLost).with_recovery("state1")],
            )
            .unwrap();

        let handler = protocol
            .handler_for(&state, FaultKind::DependencyLost)
            .unwrap();
        assert_eq!(handler.recovery.as_deref(), Some("state1"));
        assert!(protocol
            .handler_for(&state, FaultKind::ContainerLost)
            .is_none());
    }

    #[test]
    fn test_protocol_state_serde_shape() {
        let json = serde_json::to_value(ProtocolState::stable("running")).unwrap();
        assert_eq!(json["kind"], "stable");
        assert_eq!(json["name"], "running");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use std::collections::HashSet;

        proptest! {
            /// Identifiers are `source‖op‖target` and never collide inside a protocol.
            #[test]
            fn transition_ids_are_concatenations_and_unique(
                states in prop::collection::btree_set("[a-z]{1,6}", 1..6),
                ops in prop::collection::btree_set("[A-Z][a-z]{0,5}", 1..4),
                picks in prop::collection::vec(
                    (
                        any::<prop::sample::Index>(),
                        any::<prop::sample::Index>(),
                        any::<prop::sample::Index>(),
                    ),
                    0..12,
                ),
            ) {
                let states: Vec<String> = states.into_iter().collect();
                let ops: Vec<String> = ops.into_iter().collect();
                let mut protocol = ManagementProtocol::new();
                for s in &states {
                    protocol.add_state(s.as_str()).unwrap();
                }
                for o in &ops {
                    protocol.add_operation(o.as_str()).unwrap();
                }
                for (s, o, t) in picks {
                    // Rejected duplicates are fine; accepted ones are checked below.
                    let _ = protocol.add_transition(s.get::<String>(&states), o.get::<String>(&ops), t.get::<String>(&states));
                }

                let mut seen = HashSet::new();
                for t in protocol.transitions() {
                    let expected = format!("{}{}{}", t.source(), t.operation(), t.target());
                    prop_assert_eq!(t.id().as_str(), expected.as_str());
                    prop_assert!(seen.insert(t.id().clone()));
                }
            }
        }
    }
}
