//! Node instances: the per-instance lifecycle state machine
//!
//! An instance starts in its node's initial state and moves in two phases:
//! `op_start` enters the pending state of a transition, `op_end` commits to
//! the transition's target. Requirement bindings live in the application's
//! [`BindingGraph`](crate::BindingGraph); the instance only knows its state.

use crate::BrokenCause;
use mprot_types::{
    FaultHandler, InstanceId, ManagementError, ManagementResult, Node, Offer, ProtocolState,
    Requirement, Transition,
};
use std::sync::Arc;

/// A live component
#[derive(Clone, Debug)]
pub struct NodeInstance {
    id: InstanceId,
    node: Arc<Node>,
    state: ProtocolState,
    /// Instance this one was scaled out into, while still bound to it
    container: Option<InstanceId>,
    broken: Option<BrokenCause>,
}

impl NodeInstance {
    pub(crate) fn new(id: InstanceId, node: Arc<Node>) -> Self {
        let state = node.initial_state();
        Self {
            id,
            node,
            state,
            container: None,
            broken: None,
        }
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn node_name(&self) -> &str {
        self.node.name()
    }

    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    pub fn container(&self) -> Option<&InstanceId> {
        self.container.as_ref()
    }

    pub fn broken_cause(&self) -> Option<&BrokenCause> {
        self.broken.as_ref()
    }

    pub fn is_broken(&self) -> bool {
        self.broken.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.state.is_pending()
    }

    /// Transitions leaving the current stable state; empty while pending
    pub fn possible_transitions(&self) -> Vec<&Transition> {
        match self.state.stable_name() {
            Some(state) => self.node.protocol().transitions_from(state),
            None => Vec::new(),
        }
    }

    /// The transition leaving the current stable state through `op`.
    ///
    /// `Ok(None)` when `op` is undefined there (or the instance is pending);
    /// an empty `op` is a usage error.
    pub fn transition_by_op(&self, op: &str) -> ManagementResult<Option<&Transition>> {
        if op.is_empty() {
            return Err(ManagementError::RuleNotApplicable(
                "operation name must not be empty".into(),
            ));
        }
        Ok(self
            .state
            .stable_name()
            .and_then(|state| self.node.protocol().transition_by_op(state, op)))
    }

    /// The transition currently in flight
    pub fn pending_transition(&self) -> Option<&Transition> {
        self.state
            .pending_transition()
            .and_then(|id| self.node.protocol().transition(id))
    }

    /// ρ of the current state
    pub fn requirements(&self) -> &[Requirement] {
        self.node.protocol().requirements_of(&self.state)
    }

    /// γ of the current state; a broken instance offers nothing
    pub fn offers(&self) -> &[Offer] {
        if self.is_broken() {
            &[]
        } else {
            self.node.protocol().offers_of(&self.state)
        }
    }

    /// φ of the current state
    pub fn fault_handlers(&self) -> &[FaultHandler] {
        self.node.protocol().fault_handlers_of(&self.state)
    }

    pub fn offer(&self, capability: &str) -> Option<&Offer> {
        self.offers().iter().find(|o| o.capability == capability)
    }

    // ── Two-phase checks ─────────────────────────────────────────────

    /// The transition `op_start(op)` would enter, if the instance may start it
    pub(crate) fn startable_transition(&self, op: &str) -> ManagementResult<Transition> {
        if self.is_broken() {
            return Err(ManagementError::RuleNotApplicable(format!(
                "instance {} is broken and cannot start '{}'",
                self.id, op
            )));
        }
        if let Some(pending) = self.pending_transition() {
            return Err(ManagementError::RuleNotApplicable(format!(
                "instance {} is still performing '{}'",
                self.id,
                pending.operation()
            )));
        }
        self.transition_by_op(op)?
            .cloned()
            .ok_or_else(|| ManagementError::OperationNotAvailable {
                instance: self.id.clone(),
                operation: op.to_string(),
                state: self.state.to_string(),
            })
    }

    /// The transition `op_end(op)` would commit, if the instance is pending it
    pub(crate) fn endable_transition(&self, op: &str) -> ManagementResult<Transition> {
        if op.is_empty() {
            return Err(ManagementError::RuleNotApplicable(
                "operation name must not be empty".into(),
            ));
        }
        if self.is_broken() {
            return Err(ManagementError::RuleNotApplicable(format!(
                "instance {} is broken and cannot end '{}'",
                self.id, op
            )));
        }
        match self.pending_transition() {
            Some(t) if t.operation() == op => Ok(t.clone()),
            Some(t) => Err(ManagementError::RuleNotApplicable(format!(
                "instance {} is performing '{}', not '{}'",
                self.id,
                t.operation(),
                op
            ))),
            None => Err(ManagementError::RuleNotApplicable(format!(
                "instance {} has not started '{}'",
                self.id, op
            ))),
        }
    }

    // ── Mutation (application only) ──────────────────────────────────

    pub(crate) fn enter(&mut self, state: ProtocolState) {
        self.state = state;
    }

    pub(crate) fn set_container(&mut self, container: Option<InstanceId>) {
        self.container = container;
    }

    pub(crate) fn mark_broken(&mut self, cause: BrokenCause) {
        self.broken = Some(cause);
    }

    pub(crate) fn clear_broken(&mut self) {
        self.broken = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mprot_types::ManagementProtocol;

    fn node_a() -> Arc<Node> {
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
        Arc::new(Node::new("nodeA", "state1", protocol).unwrap())
    }

    #[test]
    fn test_starts_in_initial_state() {
        let instance = NodeInstance::new(InstanceId::new("instanceOfA"), node_a());
        assert_eq!(instance.state(), &ProtocolState::stable("state1"));
        assert_eq!(instance.possible_transitions().len(), 2);
    }

    #[test]
    fn test_transition_by_op() {
        let instance = NodeInstance::new(InstanceId::new("instanceOfA"), node_a());

        let t = instance.transition_by_op("goToState3").unwrap().unwrap();
        assert_eq!(t.id().as_str(), "state1goToState3state3");
        assert!(instance.transition_by_op("goToState2").unwrap().is_none());
        assert!(instance.transition_by_op("").is_err());
    }

    #[test]
    fn test_pending_instance_has_no_possible_transitions() {
        let mut instance = NodeInstance::new(InstanceId::new("instanceOfA"), node_a());
        let before = instance.possible_transitions().len();

        let t = instance.startable_transition("goToState3").unwrap();
        instance.enter(t.pending_state());

        assert!(instance.is_pending());
        assert!(instance.possible_transitions().is_empty());
        assert_ne!(before, instance.possible_transitions().len());
        assert!(instance.transition_by_op("goToState3").unwrap().is_none());
        assert_eq!(
            instance.pending_transition().unwrap().operation(),
            "goToState3"
        );
    }

    #[test]
    fn test_start_checks() {
        let mut instance = NodeInstance::new(InstanceId::new("instanceOfA"), node_a());

        let err = instance.startable_transition("goToState2").unwrap_err();
        assert!(matches!(err, ManagementError::OperationNotAvailable { .. }));

        let t = instance.startable_transition("goToState3").unwrap();
        instance.enter(t.pending_state());
        let err = instance.startable_transition("goToState3Bis").unwrap_err();
        assert!(matches!(err, ManagementError::RuleNotApplicable(_)));
    }

    #[test]
    fn test_end_checks() {
        let mut instance = NodeInstance::new(InstanceId::new("instanceOfA"), node_a());
        assert!(instance.endable_transition("goToState3").is_err());

        let t = instance.startable_transition("goToState3").unwrap();
        instance.enter(t.pending_state());

        assert!(instance.endable_transition("goToState3Bis").is_err());
        let t = instance.endable_transition("goToState3").unwrap();
        assert_eq!(t.target(), "state3");
    }
}
