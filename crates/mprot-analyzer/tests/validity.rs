//! Strict and weak validity against hosted stacks

mod common;

use common::*;
use mprot_analyzer::{
    is_valid_plan, is_valid_sequence, is_weakly_valid_plan, AnalysisError, Analyzer, FailType,
    Validity,
};
use mprot_application::BrokenCause;
use mprot_types::{Constraint, ExecutableElement, FaultHandler, FaultKind, ManagementError};

#[test]
fn deploy_and_start_is_strictly_valid() {
    let mut app = stack(None, vec![]);
    app.scale_out1("vm", &id("vm1")).unwrap();

    let elements = vec![
        deploy("db", "db1", "vm1"),
        start("db1"),
        started("db1"),
        deploy("web", "web1", "vm1"),
        start("web1"),
        started("web1"),
    ];
    let constraints = vec![
        Constraint::new(deploy("db", "db1", "vm1"), start("db1")),
        Constraint::new(started("db1"), started("web1")),
        Constraint::new(deploy("web", "web1", "vm1"), start("web1")),
    ];

    assert!(is_valid_plan(&app, &elements, &constraints).unwrap());
    assert!(is_weakly_valid_plan(&app, &elements, &constraints).unwrap());
    // the snapshot is untouched
    assert_eq!(app.instance_count(), 1);
}

#[test]
fn missing_ordering_makes_plan_weak_only() {
    let mut app = stack(None, vec![]);
    app.scale_out1("vm", &id("vm1")).unwrap();

    let elements = vec![
        deploy("db", "db1", "vm1"),
        start("db1"),
        started("db1"),
        deploy("web", "web1", "vm1"),
        start("web1"),
        started("web1"),
    ];
    let constraints = vec![
        Constraint::new(deploy("db", "db1", "vm1"), start("db1")),
        Constraint::new(deploy("web", "web1", "vm1"), start("web1")),
    ];

    let verdict = Analyzer::default()
        .check_plan(&app, &elements, &constraints, Validity::Strict)
        .unwrap();
    assert!(!verdict.valid);
    let failure = verdict.failure.unwrap();
    assert_eq!(failure.fail_type, FailType::Operation);
    assert!(matches!(
        failure.error,
        Some(ManagementError::FailedOperation { .. })
    ));

    assert!(is_weakly_valid_plan(&app, &elements, &constraints).unwrap());
}

#[test]
fn competing_scale_outs_on_limited_container() {
    let mut app = stack(Some(1), vec![]);
    app.scale_out1("vm", &id("vm1")).unwrap();

    let elements = vec![
        deploy("db", "db1", "vm1"),
        remove("db1"),
        deploy("db", "db2", "vm1"),
    ];
    let constraints = vec![Constraint::new(deploy("db", "db1", "vm1"), remove("db1"))];

    assert!(!is_valid_plan(&app, &elements, &constraints).unwrap());
    assert!(is_weakly_valid_plan(&app, &elements, &constraints).unwrap());

    let verdict = Analyzer::default()
        .check_plan(&app, &elements, &constraints, Validity::Weak)
        .unwrap();
    assert_eq!(verdict.witness, Some(elements.clone()));

    let verdict = Analyzer::default()
        .check_plan(&app, &elements, &constraints, Validity::Strict)
        .unwrap();
    let failure = verdict.failure.unwrap();
    assert_eq!(failure.failed_element, Some(deploy("db", "db2", "vm1")));
    assert!(matches!(
        failure.error,
        Some(ManagementError::InstanceNotAvailable { .. })
    ));
}

#[test]
fn unhandled_breakage_is_a_broken_instance() {
    let app = running_stack(vec![]);

    let verdict = Analyzer::default()
        .check_plan(&app, &[remove("db1")], &[], Validity::Strict)
        .unwrap();
    assert!(!verdict.valid);

    let failure = verdict.failure.unwrap();
    assert_eq!(failure.fail_type, FailType::BrokenInstance);
    assert_eq!(failure.failed_broken_instance_id, Some(id("web1")));
    assert!(failure.error.is_none());
    assert!(failure.failed_element.is_none());
    assert!(failure.fatal_fault.is_none());
    assert_eq!(failure.sequence, vec![remove("db1")]);
}

#[test]
fn failed_fault_handler_is_a_fault() {
    let app = running_stack(vec![FaultHandler::new(FaultKind::DependencyLost)]);

    let verdict = Analyzer::default()
        .check_plan(&app, &[remove("db1")], &[], Validity::Strict)
        .unwrap();
    assert!(!verdict.valid);

    let failure = verdict.failure.unwrap();
    assert_eq!(failure.fail_type, FailType::Fault);
    assert!(failure.error.is_none());
    assert!(failure.failed_broken_instance_id.is_none());
    let fatal = failure.fatal_fault.unwrap();
    assert_eq!(fatal.instance, id("web1"));
    let fault = fatal.cause.fault().unwrap();
    assert!(fault.handled);
    assert_eq!(fault.kind, FaultKind::DependencyLost);
    assert_eq!(fault.lost_provider, id("db1"));
}

#[test]
fn broken_instances_scaled_in_later_are_tolerated() {
    let app = running_stack(vec![]);
    let elements = vec![remove("db1"), remove("web1"), remove("lb1")];

    assert!(is_valid_plan(&app, &elements, &[]).unwrap());
}

#[test]
fn acting_on_a_broken_instance_is_an_operation_failure() {
    let app = running_stack(vec![]);
    let sequence = vec![remove("db1"), stop("web1"), remove("web1"), remove("lb1")];

    let verdict = Analyzer::default().check_sequence(&app, &sequence).unwrap();
    assert!(!verdict.valid);
    let failure = verdict.failure.unwrap();
    assert_eq!(failure.fail_type, FailType::Operation);
    assert_eq!(failure.failed_element, Some(stop("web1")));
    assert!(failure.failed_broken_instance_id.is_none());
    assert!(matches!(
        failure.error,
        Some(ManagementError::RuleNotApplicable(_))
    ));
    assert_eq!(failure.sequence, sequence[..2].to_vec());
}

#[test]
fn fault_handler_keeps_plan_valid() {
    let mut app = running_stack(vec![FaultHandler::new(FaultKind::DependencyLost)]);
    app.scale_out2("db", &id("db2"), &id("vm1")).unwrap();
    app.op_start(&id("db2"), "start").unwrap();
    app.op_end(&id("db2"), "start").unwrap();

    assert!(is_valid_plan(&app, &[remove("db1")], &[]).unwrap());
    assert!(!is_valid_plan(&app, &[remove("db1"), remove("db2")], &[]).unwrap());
}

#[test]
fn recovery_state_cascades_to_dependents() {
    let app = running_stack(vec![
        FaultHandler::new(FaultKind::DependencyLost).with_recovery("stopped")
    ]);

    let verdict = Analyzer::default()
        .check_plan(&app, &[remove("db1")], &[], Validity::Strict)
        .unwrap();
    let failure = verdict.failure.unwrap();
    // web recovers to stopped, lb loses http and has no handler
    assert_eq!(failure.fail_type, FailType::BrokenInstance);
    assert_eq!(failure.failed_broken_instance_id, Some(id("lb1")));
}

#[test]
fn breakage_in_the_snapshot_is_not_blamed_on_the_plan() {
    let mut app = running_stack(vec![]);
    app.scale_in(&id("db1")).unwrap();
    assert!(matches!(
        app.instance(&id("web1")).unwrap().broken_cause(),
        Some(BrokenCause::Fault(_))
    ));

    assert!(is_valid_plan(&app, &[], &[]).unwrap());
    let unrelated = [ExecutableElement::scale_out1("vm", "vm2").unwrap()];
    assert!(is_valid_plan(&app, &unrelated, &[]).unwrap());
    assert!(is_weakly_valid_plan(&app, &unrelated, &[]).unwrap());

    // the plan still may not act on the broken instances
    let verdict = Analyzer::default()
        .check_plan(&app, &[stop("web1")], &[], Validity::Strict)
        .unwrap();
    let failure = verdict.failure.unwrap();
    assert_eq!(failure.fail_type, FailType::Operation);
    assert_eq!(failure.failed_element, Some(stop("web1")));
}

#[test]
fn sequences_follow_the_given_order() {
    let app = running_stack(vec![]);
    let stop_then_start = vec![
        stop("lb1"),
        ExecutableElement::op_end("lb1", "stop").unwrap(),
        start("lb1"),
        started("lb1"),
    ];
    assert!(is_valid_sequence(&app, &stop_then_start).unwrap());

    // starting before the stop completed
    let overlapping = vec![
        stop("lb1"),
        start("lb1"),
        ExecutableElement::op_end("lb1", "stop").unwrap(),
        started("lb1"),
    ];
    let verdict = Analyzer::default().check_sequence(&app, &overlapping).unwrap();
    assert!(!verdict.valid);
    assert_eq!(verdict.failure.unwrap().failed_element, Some(start("lb1")));

    let err = is_valid_sequence(&app, &[stop("lb1"), started("lb1")]).unwrap_err();
    assert!(matches!(err, AnalysisError::UnmatchedOpEnd { .. }));
}

#[test]
fn misuse_is_an_error_not_a_verdict() {
    let app = running_stack(vec![]);

    let err = is_valid_plan(&app, &[started("web1")], &[]).unwrap_err();
    assert!(matches!(err, AnalysisError::UnmatchedOpEnd { .. }));

    let err = is_valid_plan(
        &app,
        &[remove("lb1")],
        &[Constraint::new(remove("lb1"), remove("web1"))],
    )
    .unwrap_err();
    assert!(matches!(err, AnalysisError::ConstraintOutsidePlan { .. }));
}

#[test]
fn operation_failures_on_unknown_targets() {
    let app = running_stack(vec![]);
    let verdict = Analyzer::default()
        .check_plan(&app, &[deploy("cache", "c1", "vm1")], &[], Validity::Weak)
        .unwrap();
    assert!(!verdict.valid);
    assert!(verdict.witness.is_none());
    assert!(matches!(
        verdict.failure.unwrap().error,
        Some(ManagementError::NodeUnknown(_))
    ));
}
