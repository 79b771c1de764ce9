//! Analyzer entry points

use crate::search::OrderingSearch;
use crate::{AnalysisResult, AnalyzerConfig, PlanVerdict, PreparedPlan, Validity};
use mprot_application::Application;
use mprot_types::{Constraint, ExecutableElement};
use tracing::{info, instrument};

/// Checks plans against an application snapshot.
///
/// The caller's application is never mutated; every ordering is replayed on
/// a clone.
#[derive(Clone, Debug, Default)]
pub struct Analyzer {
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Every ordering allowed by `constraints` succeeds
    pub fn is_valid_plan(
        &self,
        app: &Application,
        elements: &[ExecutableElement],
        constraints: &[Constraint],
    ) -> AnalysisResult<bool> {
        Ok(self
            .check_plan(app, elements, constraints, Validity::Strict)?
            .valid)
    }

    /// At least one ordering allowed by `constraints` succeeds
    pub fn is_weakly_valid_plan(
        &self,
        app: &Application,
        elements: &[ExecutableElement],
        constraints: &[Constraint],
    ) -> AnalysisResult<bool> {
        Ok(self
            .check_plan(app, elements, constraints, Validity::Weak)?
            .valid)
    }

    /// Check a plan and report the witness and first failure found
    #[instrument(
        skip_all,
        fields(elements = elements.len(), constraints = constraints.len(), %validity)
    )]
    pub fn check_plan(
        &self,
        app: &Application,
        elements: &[ExecutableElement],
        constraints: &[Constraint],
        validity: Validity,
    ) -> AnalysisResult<PlanVerdict> {
        let plan = PreparedPlan::new(app, elements, constraints)?;
        self.check_prepared(app, &plan, validity)
    }

    /// The elements, executed in the given order, all succeed
    pub fn is_valid_sequence(
        &self,
        app: &Application,
        elements: &[ExecutableElement],
    ) -> AnalysisResult<bool> {
        Ok(self.check_sequence(app, elements)?.valid)
    }

    #[instrument(skip_all, fields(elements = elements.len()))]
    pub fn check_sequence(
        &self,
        app: &Application,
        elements: &[ExecutableElement],
    ) -> AnalysisResult<PlanVerdict> {
        let plan = PreparedPlan::sequence(app, elements)?;
        self.check_prepared(app, &plan, Validity::Strict)
    }

    pub fn check_prepared(
        &self,
        app: &Application,
        plan: &PreparedPlan,
        validity: Validity,
    ) -> AnalysisResult<PlanVerdict> {
        let verdict = OrderingSearch::new(plan, validity, &self.config).run(app)?;
        info!(
            %validity,
            valid = verdict.valid,
            orderings = verdict.orderings_explored,
            "Plan analyzed"
        );
        Ok(verdict)
    }
}

/// [`Analyzer::is_valid_plan`] with the default configuration
pub fn is_valid_plan(
    app: &Application,
    elements: &[ExecutableElement],
    constraints: &[Constraint],
) -> AnalysisResult<bool> {
    Analyzer::default().is_valid_plan(app, elements, constraints)
}

/// [`Analyzer::is_weakly_valid_plan`] with the default configuration
pub fn is_weakly_valid_plan(
    app: &Application,
    elements: &[ExecutableElement],
    constraints: &[Constraint],
) -> AnalysisResult<bool> {
    Analyzer::default().is_weakly_valid_plan(app, elements, constraints)
}

/// [`Analyzer::is_valid_sequence`] with the default configuration
pub fn is_valid_sequence(
    app: &Application,
    elements: &[ExecutableElement],
) -> AnalysisResult<bool> {
    Analyzer::default().is_valid_sequence(app, elements)
}
