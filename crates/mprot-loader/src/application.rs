//! Application descriptions
//!
//! ```json
//! {
//!   "pi": "greedy",
//!   "nodes": [{
//!     "name": "db",
//!     "initial_state": "stopped",
//!     "states": [
//!       {"name": "stopped", "requires": ["host"]},
//!       {"name": "running", "requires": ["host"], "offers": [{"capability": "db", "capacity": 5}],
//!        "handles": [{"fault": "dependency_lost", "recovery": "stopped"}]}
//!     ],
//!     "operations": ["start"],
//!     "transitions": [{"from": "stopped", "op": "start", "to": "running", "requires": ["host"]}]
//!   }],
//!   "setup": [{"type": "scale_out1", "node": "vm", "id": "vm1"}]
//! }
//! ```
//!
//! Requirements, offers and handlers accept a bare string as shorthand.
//! Tables on a transition apply to its pending state.

use crate::{LoaderError, LoaderResult};
use mprot_application::{Application, PiVersion};
use mprot_types::{
    ExecutableElement, FaultHandler, FaultKind, ManagementProtocol, ManagementResult, Node,
    Offer, ProtocolState, Requirement,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationDocument {
    #[serde(default)]
    pub pi: PiVersion,
    pub nodes: Vec<NodeDocument>,
    /// Elements enacted in order to reach the snapshot plans start from
    #[serde(default)]
    pub setup: Vec<ExecutableElement>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeDocument {
    pub name: String,
    pub initial_state: String,
    pub states: Vec<StateDocument>,
    #[serde(default)]
    pub operations: Vec<String>,
    #[serde(default)]
    pub transitions: Vec<TransitionDocument>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateDocument {
    pub name: String,
    #[serde(default)]
    pub requires: Vec<RequirementSpec>,
    #[serde(default)]
    pub offers: Vec<OfferSpec>,
    #[serde(default)]
    pub handles: Vec<HandlerSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionDocument {
    pub from: String,
    pub op: String,
    pub to: String,
    #[serde(default)]
    pub requires: Vec<RequirementSpec>,
    #[serde(default)]
    pub offers: Vec<OfferSpec>,
    #[serde(default)]
    pub handles: Vec<HandlerSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequirementSpec {
    Capability(String),
    Detailed {
        capability: String,
        #[serde(default = "one")]
        multiplicity: u32,
    },
}

fn one() -> u32 {
    1
}

impl From<RequirementSpec> for Requirement {
    fn from(spec: RequirementSpec) -> Self {
        match spec {
            RequirementSpec::Capability(capability) => Requirement::new(capability),
            RequirementSpec::Detailed {
                capability,
                multiplicity,
            } => Requirement::new(capability).with_multiplicity(multiplicity),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OfferSpec {
    Capability(String),
    Detailed {
        capability: String,
        #[serde(default)]
        capacity: Option<u32>,
    },
}

impl From<OfferSpec> for Offer {
    fn from(spec: OfferSpec) -> Self {
        match spec {
            OfferSpec::Capability(capability) => Offer::new(capability),
            OfferSpec::Detailed {
                capability,
                capacity: Some(capacity),
            } => Offer::new(capability).with_capacity(capacity),
            OfferSpec::Detailed { capability, .. } => Offer::new(capability),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HandlerSpec {
    Fault(FaultKind),
    Detailed {
        fault: FaultKind,
        #[serde(default)]
        recovery: Option<String>,
    },
}

impl From<HandlerSpec> for FaultHandler {
    fn from(spec: HandlerSpec) -> Self {
        match spec {
            HandlerSpec::Fault(fault) => FaultHandler::new(fault),
            HandlerSpec::Detailed {
                fault,
                recovery: Some(state),
            } => FaultHandler::new(fault).with_recovery(state),
            HandlerSpec::Detailed { fault, .. } => FaultHandler::new(fault),
        }
    }
}

fn set_tables(
    protocol: &mut ManagementProtocol,
    state: &ProtocolState,
    requires: Vec<RequirementSpec>,
    offers: Vec<OfferSpec>,
    handles: Vec<HandlerSpec>,
) -> ManagementResult<()> {
    protocol.add_rho_entry(state, requires.into_iter().map(Into::into).collect())?;
    protocol.add_gamma_entry(state, offers.into_iter().map(Into::into).collect())?;
    protocol.add_phi_entry(state, handles.into_iter().map(Into::into).collect())
}

impl NodeDocument {
    /// Build the node type; declaration errors surface as `RuleNotApplicable`
    pub fn build(self) -> ManagementResult<Node> {
        let mut protocol = ManagementProtocol::new();
        for state in &self.states {
            protocol.add_state(state.name.as_str())?;
        }
        for op in self.operations {
            protocol.add_operation(op)?;
        }

        let mut pending = Vec::with_capacity(self.transitions.len());
        for t in self.transitions {
            let id = protocol.add_transition(&t.from, &t.op, &t.to)?;
            pending.push((ProtocolState::pending(id), t.requires, t.offers, t.handles));
        }

        // handlers may recover to any declared state, so tables come last
        for state in self.states {
            set_tables(
                &mut protocol,
                &ProtocolState::stable(state.name),
                state.requires,
                state.offers,
                state.handles,
            )?;
        }
        for (state, requires, offers, handles) in pending {
            set_tables(&mut protocol, &state, requires, offers, handles)?;
        }

        Node::new(self.name, self.initial_state, protocol)
    }
}

impl ApplicationDocument {
    /// Build the application and enact `setup`
    pub fn build(self) -> LoaderResult<Application> {
        let mut app = Application::new(self.pi);
        for node in self.nodes {
            app.add_node(node.build()?)?;
        }

        for (index, element) in self.setup.iter().enumerate() {
            app.apply(element).map_err(|source| LoaderError::Setup {
                index,
                element: element.to_string(),
                source,
            })?;
        }

        debug!(
            nodes = app.nodes().count(),
            instances = app.instance_count(),
            pi = %app.pi_version(),
            "Application built"
        );
        Ok(app)
    }
}
