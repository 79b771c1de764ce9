//! Plan preparation: misuse checks and the ordering graph
//!
//! A [`PreparedPlan`] is a validated element list plus the precedence edges
//! every ordering must respect: the explicit constraints, and one implicit
//! edge from each `OpStart` to the `OpEnd` that closes it.

use crate::{AnalysisError, AnalysisResult};
use mprot_application::Application;
use mprot_types::{Constraint, ExecutableElement, InstanceId};
use std::collections::{HashMap, HashSet, VecDeque};

/// Elements and precedence edges of a plan, checked acyclic
#[derive(Clone, Debug)]
pub struct PreparedPlan {
    elements: Vec<ExecutableElement>,
    /// `successors[i]`: elements that must come after element `i`
    successors: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
}

impl PreparedPlan {
    /// Prepare an unordered plan.
    ///
    /// A constraint endpoint matches every element equal to it.
    pub fn new(
        app: &Application,
        elements: &[ExecutableElement],
        constraints: &[Constraint],
    ) -> AnalysisResult<Self> {
        validate_elements(elements)?;
        let mut edges = constraint_edges(elements, constraints)?;
        edges.extend(operation_pairs(app, elements)?);
        Self::from_edges(elements.to_vec(), edges)
    }

    /// Prepare a totally ordered sequence
    pub fn sequence(app: &Application, elements: &[ExecutableElement]) -> AnalysisResult<Self> {
        validate_elements(elements)?;
        operation_pairs(app, elements)?;
        let edges = (1..elements.len()).map(|i| (i - 1, i)).collect();
        Self::from_edges(elements.to_vec(), edges)
    }

    fn from_edges(
        elements: Vec<ExecutableElement>,
        edges: Vec<(usize, usize)>,
    ) -> AnalysisResult<Self> {
        let n = elements.len();
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut in_degree = vec![0; n];
        for (before, after) in edges {
            if !successors[before].contains(&after) {
                successors[before].push(after);
                in_degree[after] += 1;
            }
        }

        // Kahn: whatever never reaches in-degree 0 sits on a cycle
        let mut remaining = in_degree.clone();
        let mut queue: VecDeque<usize> = (0..n).filter(|&i| remaining[i] == 0).collect();
        let mut visited = 0;
        while let Some(i) = queue.pop_front() {
            visited += 1;
            for &next in &successors[i] {
                remaining[next] -= 1;
                if remaining[next] == 0 {
                    queue.push_back(next);
                }
            }
        }
        if visited < n {
            return Err(AnalysisError::CyclicConstraints {
                elements: (0..n)
                    .filter(|&i| remaining[i] > 0)
                    .map(|i| elements[i].to_string())
                    .collect(),
            });
        }

        Ok(Self {
            elements,
            successors,
            in_degree,
        })
    }

    pub fn elements(&self) -> &[ExecutableElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn successors(&self, index: usize) -> &[usize] {
        &self.successors[index]
    }

    /// Number of direct predecessors of each element
    pub fn in_degrees(&self) -> &[usize] {
        &self.in_degree
    }
}

fn validate_elements(elements: &[ExecutableElement]) -> AnalysisResult<()> {
    for (index, element) in elements.iter().enumerate() {
        element
            .validate()
            .map_err(|source| AnalysisError::MalformedElement { index, source })?;
    }
    Ok(())
}

fn positions(elements: &[ExecutableElement], wanted: &ExecutableElement) -> Vec<usize> {
    elements
        .iter()
        .enumerate()
        .filter(|(_, e)| *e == wanted)
        .map(|(i, _)| i)
        .collect()
}

fn constraint_edges(
    elements: &[ExecutableElement],
    constraints: &[Constraint],
) -> AnalysisResult<Vec<(usize, usize)>> {
    let mut edges = Vec::new();
    for constraint in constraints {
        let before = positions(elements, constraint.before());
        let after = positions(elements, constraint.after());
        if before.is_empty() || after.is_empty() {
            return Err(AnalysisError::ConstraintOutsidePlan {
                constraint: constraint.to_string(),
            });
        }
        for &b in &before {
            edges.extend(after.iter().map(|&a| (b, a)));
        }
    }
    Ok(edges)
}

/// Pair every `OpEnd` with an `OpStart` of the same instance and operation,
/// in element order.
///
/// One unpaired `OpEnd` per instance and operation is accepted when the
/// snapshot instance is already performing that operation.
fn operation_pairs(
    app: &Application,
    elements: &[ExecutableElement],
) -> AnalysisResult<Vec<(usize, usize)>> {
    let mut open: HashMap<(&InstanceId, &str), VecDeque<usize>> = HashMap::new();
    for (i, element) in elements.iter().enumerate() {
        if let ExecutableElement::OpStart { instance_id, op } = element {
            open.entry((instance_id, op.as_str()))
                .or_default()
                .push_back(i);
        }
    }

    let mut pairs = Vec::new();
    let mut resumed: HashSet<(&InstanceId, &str)> = HashSet::new();
    for (i, element) in elements.iter().enumerate() {
        let ExecutableElement::OpEnd { instance_id, op } = element else {
            continue;
        };
        let key = (instance_id, op.as_str());
        if let Some(start) = open.get_mut(&key).and_then(VecDeque::pop_front) {
            pairs.push((start, i));
        } else if !(in_flight(app, instance_id, op) && resumed.insert(key)) {
            return Err(AnalysisError::UnmatchedOpEnd {
                element: element.to_string(),
            });
        }
    }
    Ok(pairs)
}

fn in_flight(app: &Application, id: &InstanceId, op: &str) -> bool {
    app.instance(id)
        .ok()
        .and_then(|instance| instance.pending_transition())
        .is_some_and(|t| t.operation() == op)
}
