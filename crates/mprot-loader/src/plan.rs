//! Plan descriptions
//!
//! ```json
//! {
//!   "kind": "plan",
//!   "elements": {
//!     "deploy": {"type": "scale_out2", "node": "db", "id": "db1", "container": "vm1"},
//!     "start":  {"type": "op_start", "instance": "db1", "op": "start"}
//!   },
//!   "constraints": [{"before": "deploy", "after": "start"}]
//! }
//! ```
//!
//! For a `sequence` the element order of the document is the execution
//! order and constraints are not used.

use crate::{LoaderError, LoaderResult};
use indexmap::IndexMap;
use mprot_application::Application;
use mprot_types::{Constraint, ExecutableElement, InstanceId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    /// Unordered elements plus constraints
    #[default]
    Plan,
    /// Totally ordered elements
    Sequence,
}

impl std::fmt::Display for PlanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanKind::Plan => write!(f, "plan"),
            PlanKind::Sequence => write!(f, "sequence"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanDocument {
    #[serde(default)]
    pub kind: PlanKind,
    pub elements: IndexMap<String, ExecutableElement>,
    #[serde(default)]
    pub constraints: Vec<ConstraintDocument>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstraintDocument {
    pub before: String,
    pub after: String,
}

/// A loaded plan: labelled elements, resolved constraints and their labels
#[derive(Clone, Debug)]
pub struct PlanWrapper {
    kind: PlanKind,
    elements: IndexMap<String, ExecutableElement>,
    constraints: Vec<Constraint>,
    /// `(before, after)` element labels, parallel to `constraints`
    labels: Vec<(String, String)>,
}

impl PlanWrapper {
    pub fn from_document(document: PlanDocument) -> LoaderResult<Self> {
        if document.kind == PlanKind::Sequence && !document.constraints.is_empty() {
            warn!(
                constraints = document.constraints.len(),
                "Constraints of a sequence are ignored"
            );
        }

        let mut constraints = Vec::new();
        let mut labels = Vec::new();
        if document.kind == PlanKind::Plan {
            for c in document.constraints {
                let lookup = |label: &str| {
                    document
                        .elements
                        .get(label)
                        .cloned()
                        .ok_or_else(|| LoaderError::UnknownElementId(label.to_string()))
                };
                constraints.push(Constraint::new(lookup(&c.before)?, lookup(&c.after)?));
                labels.push((c.before, c.after));
            }
        }

        Ok(Self {
            kind: document.kind,
            elements: document.elements,
            constraints,
            labels,
        })
    }

    pub fn kind(&self) -> PlanKind {
        self.kind
    }

    pub fn is_sequence(&self) -> bool {
        self.kind == PlanKind::Sequence
    }

    /// Elements in document order
    pub fn elements(&self) -> Vec<ExecutableElement> {
        self.elements.values().cloned().collect()
    }

    pub fn element(&self, label: &str) -> Option<&ExecutableElement> {
        self.elements.get(label)
    }

    /// Element labels in document order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.elements.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn constraint_labels(&self) -> &[(String, String)] {
        &self.labels
    }

    /// Label of the first element equal to `element`
    pub fn label_of(&self, element: &ExecutableElement) -> Option<&str> {
        self.elements
            .iter()
            .find(|(_, e)| *e == element)
            .map(|(label, _)| label.as_str())
    }

    /// Every node a scale-out uses is declared, and every instance an
    /// element refers to either exists in `app` or is created by the plan
    pub fn check_references(&self, app: &Application) -> LoaderResult<()> {
        let created: HashSet<&InstanceId> = self
            .elements
            .values()
            .filter_map(|e| match e {
                ExecutableElement::ScaleOut1 { id_to_assign, .. }
                | ExecutableElement::ScaleOut2 { id_to_assign, .. } => Some(id_to_assign),
                _ => None,
            })
            .collect();

        for (label, element) in &self.elements {
            if let ExecutableElement::ScaleOut1 { node_name, .. }
            | ExecutableElement::ScaleOut2 { node_name, .. } = element
            {
                if app.node(node_name).is_none() {
                    return Err(LoaderError::UnknownNode {
                        element_id: label.clone(),
                        node: node_name.clone(),
                    });
                }
            }

            let referenced = match element {
                ExecutableElement::ScaleOut1 { .. } => Vec::new(),
                ExecutableElement::ScaleOut2 { container_id, .. } => vec![container_id],
                ExecutableElement::ScaleIn { instance_id }
                | ExecutableElement::OpStart { instance_id, .. }
                | ExecutableElement::OpEnd { instance_id, .. } => vec![instance_id],
            };
            if let Some(missing) = referenced
                .into_iter()
                .find(|id| !app.contains_instance(id) && !created.contains(id))
            {
                return Err(LoaderError::UnknownInstance {
                    element_id: label.clone(),
                    instance: missing.clone(),
                });
            }
        }
        Ok(())
    }
}
