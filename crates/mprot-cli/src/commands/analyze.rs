//! `mprot analyze`: check a plan or sequence against an application

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::{self, OutputFormat};
use clap::Args;
use colored::*;
use mprot_analyzer::{Analyzer, PlanVerdict, Validity};
use mprot_loader::{load_application, load_plan, PlanKind, PlanWrapper};
use mprot_types::ExecutableElement;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Application description (JSON)
    #[arg(long)]
    pub app: PathBuf,

    /// Plan or sequence description (JSON)
    #[arg(long)]
    pub plan: PathBuf,

    /// Every ordering allowed by the constraints must succeed
    #[arg(long, conflicts_with = "weak")]
    pub strict: bool,

    /// One ordering allowed by the constraints succeeding is enough
    #[arg(long)]
    pub weak: bool,

    /// Give up after exploring this many orderings
    #[arg(long)]
    pub max_orderings: Option<usize>,
}

impl AnalyzeArgs {
    fn validity(&self, config: &CliConfig) -> Validity {
        if self.weak {
            Validity::Weak
        } else if self.strict {
            Validity::Strict
        } else {
            config.default_validity.unwrap_or_default()
        }
    }
}

#[derive(Serialize)]
struct AnalyzeReport<'a> {
    plan: String,
    kind: PlanKind,
    elements: usize,
    constraints: usize,
    #[serde(flatten)]
    verdict: &'a PlanVerdict,
}

/// Run the analysis; `Ok(true)` when the verdict holds
pub fn execute(args: AnalyzeArgs, config: &CliConfig, format: OutputFormat) -> CliResult<bool> {
    let app = load_application(&args.app)?;
    let plan = load_plan(&args.plan)?;
    plan.check_references(&app)?;

    let analyzer = Analyzer::new(config.analyzer_config(args.max_orderings));
    let elements = plan.elements();
    let verdict = if plan.is_sequence() {
        analyzer.check_sequence(&app, &elements)?
    } else {
        analyzer.check_plan(&app, &elements, plan.constraints(), args.validity(config))?
    };

    match format {
        OutputFormat::Json => output::print_json(&AnalyzeReport {
            plan: args.plan.display().to_string(),
            kind: plan.kind(),
            elements: plan.len(),
            constraints: plan.constraints().len(),
            verdict: &verdict,
        })?,
        OutputFormat::Table => print_verdict(&plan, &verdict),
    }
    Ok(verdict.valid)
}

fn print_verdict(plan: &PlanWrapper, verdict: &PlanVerdict) {
    let subject = if plan.is_sequence() {
        "sequence is".to_string()
    } else {
        let adverb = match verdict.validity {
            Validity::Strict => "strictly",
            Validity::Weak => "weakly",
        };
        if verdict.valid {
            format!("plan is {} valid", adverb)
        } else {
            format!("plan is not {} valid", adverb)
        }
    };
    let summary = if plan.is_sequence() {
        format!(
            "{} {} ({} elements)",
            subject,
            if verdict.valid { "valid" } else { "not valid" },
            plan.len()
        )
    } else {
        format!(
            "{} ({} elements, {} constraints, {} orderings explored)",
            subject,
            plan.len(),
            plan.constraints().len(),
            verdict.orderings_explored
        )
    };

    if verdict.valid {
        output::print_success(&summary);
    } else {
        output::print_failure(&summary);
    }

    if let Some(failure) = &verdict.failure {
        if verdict.valid {
            output::print_warning("some allowed orderings fail");
        }
        println!();
        output::print_heading("First failing ordering");
        print_ordering(plan, &failure.sequence);
        println!("  {} {}", "reason:".red(), failure);
    }
    if let Some(witness) = &verdict.witness {
        if verdict.validity == Validity::Weak && !plan.is_sequence() {
            println!();
            output::print_heading("Successful ordering");
            print_ordering(plan, witness);
        }
    }
}

fn print_ordering(plan: &PlanWrapper, ordering: &[ExecutableElement]) {
    for (step, element) in ordering.iter().enumerate() {
        println!(
            "  {:>3}. {:<20} {}",
            step + 1,
            plan.label_of(element).unwrap_or("-"),
            element.to_string().dimmed()
        );
    }
}
