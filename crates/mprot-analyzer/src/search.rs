//! Backtracking over the topological orders of a prepared plan
//!
//! The search walks orderings depth-first, always trying the lowest-index
//! ready element first. Each step applies one element to a clone of the
//! parent's application, so sibling branches never observe each other and
//! a shared prefix is replayed once.

use crate::{
    AnalysisError, AnalysisFailReport, AnalysisResult, AnalyzerConfig, FatalFault, PlanVerdict,
    PreparedPlan, Validity,
};
use mprot_application::{Application, BrokenCause};
use mprot_types::{ExecutableElement, InstanceId};
use tracing::{debug, trace};

enum Flow {
    Continue,
    Stop,
}

pub(crate) struct OrderingSearch<'a> {
    plan: &'a PreparedPlan,
    validity: Validity,
    max_orderings: Option<usize>,
    /// Instances already broken in the snapshot, with their causes
    baseline: Vec<(InstanceId, BrokenCause)>,
    explored: usize,
    witness: Option<Vec<ExecutableElement>>,
    failure: Option<AnalysisFailReport>,
}

impl<'a> OrderingSearch<'a> {
    pub(crate) fn new(plan: &'a PreparedPlan, validity: Validity, config: &AnalyzerConfig) -> Self {
        Self {
            plan,
            validity,
            max_orderings: config.max_orderings,
            baseline: Vec::new(),
            explored: 0,
            witness: None,
            failure: None,
        }
    }

    pub(crate) fn run(mut self, app: &Application) -> AnalysisResult<PlanVerdict> {
        self.baseline = app
            .broken_instances()
            .into_iter()
            .filter_map(|i| Some((i.id().clone(), i.broken_cause()?.clone())))
            .collect();

        let mut in_degree = self.plan.in_degrees().to_vec();
        let mut placed = vec![false; self.plan.len()];
        let mut prefix = Vec::with_capacity(self.plan.len());
        self.explore(app, &mut in_degree, &mut placed, &mut prefix)?;

        let valid = match self.validity {
            Validity::Strict => self.failure.is_none(),
            Validity::Weak => self.witness.is_some(),
        };
        Ok(PlanVerdict {
            validity: self.validity,
            valid,
            witness: self.witness,
            failure: self.failure,
            orderings_explored: self.explored,
        })
    }

    fn explore(
        &mut self,
        app: &Application,
        in_degree: &mut [usize],
        placed: &mut [bool],
        prefix: &mut Vec<usize>,
    ) -> AnalysisResult<Flow> {
        let plan = self.plan;

        if prefix.len() == plan.len() {
            self.count()?;
            trace!(ordering = %self.describe(prefix), "Ordering succeeded");
            if self.witness.is_none() {
                self.witness = Some(self.sequence(prefix));
            }
            return Ok(match self.validity {
                Validity::Weak => Flow::Stop,
                Validity::Strict => Flow::Continue,
            });
        }

        for next in 0..plan.len() {
            if placed[next] || in_degree[next] != 0 {
                continue;
            }
            let element = &plan.elements()[next];
            prefix.push(next);
            placed[next] = true;

            let mut branch = app.clone();
            let failure = match branch.apply(element) {
                Err(error) => Some(AnalysisFailReport::operation(
                    element.clone(),
                    error,
                    self.sequence(prefix),
                )),
                Ok(()) => self.inspect(&branch, placed, prefix),
            };

            let flow = match failure {
                Some(report) => {
                    self.count()?;
                    debug!(ordering = %self.describe(prefix), %report, "Ordering failed");
                    if self.failure.is_none() {
                        self.failure = Some(report);
                    }
                    match self.validity {
                        Validity::Strict => Flow::Stop,
                        Validity::Weak => Flow::Continue,
                    }
                }
                None => {
                    for &s in plan.successors(next) {
                        in_degree[s] -= 1;
                    }
                    let flow = self.explore(&branch, in_degree, placed, prefix)?;
                    for &s in plan.successors(next) {
                        in_degree[s] += 1;
                    }
                    flow
                }
            };

            placed[next] = false;
            prefix.pop();
            if let Flow::Stop = flow {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    /// Account for one more explored ordering
    fn count(&mut self) -> AnalysisResult<()> {
        if let Some(limit) = self.max_orderings {
            if self.explored >= limit {
                return Err(AnalysisError::SearchBudgetExhausted { limit });
            }
        }
        self.explored += 1;
        Ok(())
    }

    /// Breakage left by a successful step.
    ///
    /// An instance broken by a fault its state does not handle is a
    /// BROKENINSTANCE; one whose handler could neither rebind nor recover is
    /// a FAULT. Breakage already present in the snapshot, and instances a
    /// remaining element scales in, are not reported.
    fn inspect(
        &self,
        app: &Application,
        placed: &[bool],
        prefix: &[usize],
    ) -> Option<AnalysisFailReport> {
        let (instance, cause) = app.broken_instances().into_iter().find_map(|instance| {
            let cause = instance.broken_cause()?;
            let id = instance.id();
            let inherited = self
                .baseline
                .iter()
                .any(|(known, known_cause)| known == id && known_cause == cause);
            (!inherited && !self.scaled_in_later(id, placed)).then_some((id, cause))
        })?;

        let sequence = self.sequence(prefix);
        Some(match cause {
            BrokenCause::Fault(fault) if !fault.handled => {
                AnalysisFailReport::broken_instance(instance.clone(), sequence)
            }
            _ => AnalysisFailReport::fault(
                FatalFault {
                    instance: instance.clone(),
                    cause: cause.clone(),
                },
                sequence,
            ),
        })
    }

    fn scaled_in_later(&self, id: &InstanceId, placed: &[bool]) -> bool {
        self.plan
            .elements()
            .iter()
            .zip(placed)
            .any(|(element, &done)| {
                !done
                    && matches!(
                        element,
                        ExecutableElement::ScaleIn { instance_id } if instance_id == id
                    )
            })
    }

    fn sequence(&self, prefix: &[usize]) -> Vec<ExecutableElement> {
        prefix
            .iter()
            .map(|&i| self.plan.elements()[i].clone())
            .collect()
    }

    fn describe(&self, prefix: &[usize]) -> String {
        prefix
            .iter()
            .map(|&i| self.plan.elements()[i].to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}
