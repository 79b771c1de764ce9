//! Node types: a named component type with its management protocol

use crate::{ManagementError, ManagementProtocol, ManagementResult, ProtocolState};

/// A component type. Immutable once built.
#[derive(Clone, Debug)]
pub struct Node {
    name: String,
    initial_state: String,
    protocol: ManagementProtocol,
}

impl Node {
    /// Create a node type. `initial_state` must be a state of `protocol`.
    pub fn new(
        name: impl Into<String>,
        initial_state: impl Into<String>,
        protocol: ManagementProtocol,
    ) -> ManagementResult<Self> {
        let name = name.into();
        let initial_state = initial_state.into();

        if name.is_empty() {
            return Err(ManagementError::RuleNotApplicable(
                "node name must not be empty".into(),
            ));
        }
        if !protocol.has_state(&initial_state) {
            return Err(ManagementError::RuleNotApplicable(format!(
                "initial state '{}' of node '{}' is not declared",
                initial_state, name
            )));
        }

        Ok(Self {
            name,
            initial_state,
            protocol,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial_state(&self) -> ProtocolState {
        ProtocolState::stable(self.initial_state.as_str())
    }

    pub fn protocol(&self) -> &ManagementProtocol {
        &self.protocol
    }
}
