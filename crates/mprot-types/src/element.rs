//! Plan vocabulary: executable elements and ordering constraints

use crate::{InstanceId, PlanError, PlanResult};
use serde::{Deserialize, Serialize};

// ── Executable Element ───────────────────────────────────────────────

/// One step of a management plan.
///
/// Build elements through the checked constructors (or deserialize them);
/// both refuse empty fields. Equality is structural over variant and fields.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ElementRepr", into = "ElementRepr")]
pub enum ExecutableElement {
    /// Create an instance with no bindings
    ScaleOut1 {
        node_name: String,
        id_to_assign: InstanceId,
    },
    /// Create an instance hosted by `container_id`
    ScaleOut2 {
        node_name: String,
        id_to_assign: InstanceId,
        container_id: InstanceId,
    },
    /// Remove an instance
    ScaleIn { instance_id: InstanceId },
    /// Start an operation on an instance
    OpStart { instance_id: InstanceId, op: String },
    /// Complete a started operation
    OpEnd { instance_id: InstanceId, op: String },
}

/// Variant tag of an [`ExecutableElement`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    ScaleOut1,
    ScaleOut2,
    ScaleIn,
    OpStart,
    OpEnd,
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ScaleOut1 => "scaleOut1",
            Self::ScaleOut2 => "scaleOut2",
            Self::ScaleIn => "scaleIn",
            Self::OpStart => "opStart",
            Self::OpEnd => "opEnd",
        };
        write!(f, "{}", name)
    }
}

impl ExecutableElement {
    pub fn scale_out1(
        node_name: impl Into<String>,
        id_to_assign: impl Into<InstanceId>,
    ) -> PlanResult<Self> {
        Self::checked(Self::ScaleOut1 {
            node_name: node_name.into(),
            id_to_assign: id_to_assign.into(),
        })
    }

    pub fn scale_out2(
        node_name: impl Into<String>,
        id_to_assign: impl Into<InstanceId>,
        container_id: impl Into<InstanceId>,
    ) -> PlanResult<Self> {
        Self::checked(Self::ScaleOut2 {
            node_name: node_name.into(),
            id_to_assign: id_to_assign.into(),
            container_id: container_id.into(),
        })
    }

    pub fn scale_in(instance_id: impl Into<InstanceId>) -> PlanResult<Self> {
        Self::checked(Self::ScaleIn {
            instance_id: instance_id.into(),
        })
    }

    pub fn op_start(instance_id: impl Into<InstanceId>, op: impl Into<String>) -> PlanResult<Self> {
        Self::checked(Self::OpStart {
            instance_id: instance_id.into(),
            op: op.into(),
        })
    }

    pub fn op_end(instance_id: impl Into<InstanceId>, op: impl Into<String>) -> PlanResult<Self> {
        Self::checked(Self::OpEnd {
            instance_id: instance_id.into(),
            op: op.into(),
        })
    }

    fn checked(element: Self) -> PlanResult<Self> {
        element.validate()?;
        Ok(element)
    }

    /// Check that every variant-specific field is non-empty
    pub fn validate(&self) -> PlanResult<()> {
        let variant = self.variant_name();
        let empty = |field: &'static str| Err(PlanError::EmptyField { variant, field });

        match self {
            Self::ScaleOut1 {
                node_name,
                id_to_assign,
            } => {
                if node_name.is_empty() {
                    return empty("node_name");
                }
                if id_to_assign.is_empty() {
                    return empty("id_to_assign");
                }
            }
            Self::ScaleOut2 {
                node_name,
                id_to_assign,
                container_id,
            } => {
                if node_name.is_empty() {
                    return empty("node_name");
                }
                if id_to_assign.is_empty() {
                    return empty("id_to_assign");
                }
                if container_id.is_empty() {
                    return empty("container_id");
                }
            }
            Self::ScaleIn { instance_id } => {
                if instance_id.is_empty() {
                    return empty("instance_id");
                }
            }
            Self::OpStart { instance_id, op } | Self::OpEnd { instance_id, op } => {
                if instance_id.is_empty() {
                    return empty("instance_id");
                }
                if op.is_empty() {
                    return empty("op");
                }
            }
        }
        Ok(())
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Self::ScaleOut1 { .. } => ElementKind::ScaleOut1,
            Self::ScaleOut2 { .. } => ElementKind::ScaleOut2,
            Self::ScaleIn { .. } => ElementKind::ScaleIn,
            Self::OpStart { .. } => ElementKind::OpStart,
            Self::OpEnd { .. } => ElementKind::OpEnd,
        }
    }

    fn variant_name(&self) -> &'static str {
        match self.kind() {
            ElementKind::ScaleOut1 => "ScaleOut1",
            ElementKind::ScaleOut2 => "ScaleOut2",
            ElementKind::ScaleIn => "ScaleIn",
            ElementKind::OpStart => "OpStart",
            ElementKind::OpEnd => "OpEnd",
        }
    }

    /// The instance this step creates, removes or operates on
    pub fn target(&self) -> &InstanceId {
        match self {
            Self::ScaleOut1 { id_to_assign, .. } | Self::ScaleOut2 { id_to_assign, .. } => {
                id_to_assign
            }
            Self::ScaleIn { instance_id }
            | Self::OpStart { instance_id, .. }
            | Self::OpEnd { instance_id, .. } => instance_id,
        }
    }

    /// Every instance id this step mentions (target first, then container)
    pub fn referenced_instances(&self) -> Vec<&InstanceId> {
        match self {
            Self::ScaleOut2 {
                id_to_assign,
                container_id,
                ..
            } => vec![id_to_assign, container_id],
            _ => vec![self.target()],
        }
    }

    /// The operation name for `OpStart`/`OpEnd`
    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::OpStart { op, .. } | Self::OpEnd { op, .. } => Some(op),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExecutableElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ScaleOut1 {
                node_name,
                id_to_assign,
            } => write!(f, "scaleOut1({}, {})", node_name, id_to_assign),
            Self::ScaleOut2 {
                node_name,
                id_to_assign,
                container_id,
            } => write!(
                f,
                "scaleOut2({}, {}, {})",
                node_name, id_to_assign, container_id
            ),
            Self::ScaleIn { instance_id } => write!(f, "scaleIn({})", instance_id),
            Self::OpStart { instance_id, op } => write!(f, "opStart({}, {})", instance_id, op),
            Self::OpEnd { instance_id, op } => write!(f, "opEnd({}, {})", instance_id, op),
        }
    }
}

/// Wire shape of an element: `{"type": "scale_out2", "node": .., "id": .., "container": ..}`
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ElementRepr {
    ScaleOut1 {
        node: String,
        id: InstanceId,
    },
    ScaleOut2 {
        node: String,
        id: InstanceId,
        container: InstanceId,
    },
    ScaleIn {
        instance: InstanceId,
    },
    OpStart {
        instance: InstanceId,
        op: String,
    },
    OpEnd {
        instance: InstanceId,
        op: String,
    },
}

impl TryFrom<ElementRepr> for ExecutableElement {
    type Error = PlanError;

    fn try_from(repr: ElementRepr) -> PlanResult<Self> {
        match repr {
            ElementRepr::ScaleOut1 { node, id } => Self::scale_out1(node, id),
            ElementRepr::ScaleOut2 {
                node,
                id,
                container,
            } => Self::scale_out2(node, id, container),
            ElementRepr::ScaleIn { instance } => Self::scale_in(instance),
            ElementRepr::OpStart { instance, op } => Self::op_start(instance, op),
            ElementRepr::OpEnd { instance, op } => Self::op_end(instance, op),
        }
    }
}

impl From<ExecutableElement> for ElementRepr {
    fn from(element: ExecutableElement) -> Self {
        match element {
            ExecutableElement::ScaleOut1 {
                node_name,
                id_to_assign,
            } => Self::ScaleOut1 {
                node: node_name,
                id: id_to_assign,
            },
            ExecutableElement::ScaleOut2 {
                node_name,
                id_to_assign,
                container_id,
            } => Self::ScaleOut2 {
                node: node_name,
                id: id_to_assign,
                container: container_id,
            },
            ExecutableElement::ScaleIn { instance_id } => Self::ScaleIn {
                instance: instance_id,
            },
            ExecutableElement::OpStart { instance_id, op } => Self::OpStart {
                instance: instance_id,
                op,
            },
            ExecutableElement::OpEnd { instance_id, op } => Self::OpEnd {
                instance: instance_id,
                op,
            },
        }
    }
}

// ── Constraint ───────────────────────────────────────────────────────

/// `before` must be executed before `after` in every ordering of the plan
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraint {
    before: ExecutableElement,
    after: ExecutableElement,
}

impl Constraint {
    pub fn new(before: ExecutableElement, after: ExecutableElement) -> Self {
        Self { before, after }
    }

    pub fn before(&self) -> &ExecutableElement {
        &self.before
    }

    pub fn after(&self) -> &ExecutableElement {
        &self.after
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} < {}", self.before, self.after)
    }
}
