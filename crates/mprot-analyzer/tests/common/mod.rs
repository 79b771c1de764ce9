//! Shared fixtures: a small hosted stack of vm, db, web and lb nodes

#![allow(dead_code)]

use mprot_application::{Application, PiVersion};
use mprot_types::{
    ExecutableElement, FaultHandler, InstanceId, ManagementProtocol, Node, Offer, ProtocolState,
    Requirement,
};

pub fn id(s: &str) -> InstanceId {
    InstanceId::new(s)
}

/// Always on, offers `host` with the given capacity
pub fn vm_node(capacity: Option<u32>) -> Node {
    let mut p = ManagementProtocol::new();
    p.add_state("on").unwrap();
    let host = match capacity {
        Some(c) => Offer::new("host").with_capacity(c),
        None => Offer::new("host"),
    };
    p.add_gamma_entry(&ProtocolState::stable("on"), vec![host])
        .unwrap();
    Node::new("vm", "on", p).unwrap()
}

/// Hosted `stopped <-> running` service needing `needs` and offering
/// `offers` while running
pub fn service_node(
    name: &str,
    needs: &[&str],
    offers: &[&str],
    handlers: Vec<FaultHandler>,
) -> Node {
    let mut p = ManagementProtocol::new();
    p.add_state("stopped").unwrap();
    p.add_state("running").unwrap();
    p.add_operation("start").unwrap();
    p.add_operation("stop").unwrap();
    let start = p.add_transition("stopped", "start", "running").unwrap();
    let stop = p.add_transition("running", "stop", "stopped").unwrap();

    let hosted = vec![Requirement::new("host")];
    for state in [
        ProtocolState::stable("stopped"),
        ProtocolState::pending(start),
        ProtocolState::pending(stop),
    ] {
        p.add_rho_entry(&state, hosted.clone()).unwrap();
    }
    let running = ProtocolState::stable("running");
    let mut requires = hosted;
    requires.extend(needs.iter().map(|n| Requirement::new(*n)));
    p.add_rho_entry(&running, requires).unwrap();
    p.add_gamma_entry(&running, offers.iter().map(|o| Offer::new(*o)).collect())
        .unwrap();
    p.add_phi_entry(&running, handlers).unwrap();
    Node::new(name, "stopped", p).unwrap()
}

/// Node types only, `vm` offering `host` with `capacity`
pub fn stack(capacity: Option<u32>, web_handlers: Vec<FaultHandler>) -> Application {
    Application::new(PiVersion::GreedyPi)
        .with_node(vm_node(capacity))
        .unwrap()
        .with_node(service_node("db", &[], &["db"], vec![]))
        .unwrap()
        .with_node(service_node("web", &["db"], &["http"], web_handlers))
        .unwrap()
        .with_node(service_node("lb", &["http"], &["entry"], vec![]))
        .unwrap()
}

/// vm1 hosting running db1, web1 and lb1
pub fn running_stack(web_handlers: Vec<FaultHandler>) -> Application {
    let mut app = stack(None, web_handlers);
    app.scale_out1("vm", &id("vm1")).unwrap();
    for (node, instance) in [("db", "db1"), ("web", "web1"), ("lb", "lb1")] {
        app.scale_out2(node, &id(instance), &id("vm1")).unwrap();
        app.op_start(&id(instance), "start").unwrap();
        app.op_end(&id(instance), "start").unwrap();
    }
    app
}

pub fn deploy(node: &str, instance: &str, container: &str) -> ExecutableElement {
    ExecutableElement::scale_out2(node, instance, container).unwrap()
}

pub fn start(instance: &str) -> ExecutableElement {
    ExecutableElement::op_start(instance, "start").unwrap()
}

pub fn started(instance: &str) -> ExecutableElement {
    ExecutableElement::op_end(instance, "start").unwrap()
}

pub fn stop(instance: &str) -> ExecutableElement {
    ExecutableElement::op_start(instance, "stop").unwrap()
}

pub fn remove(instance: &str) -> ExecutableElement {
    ExecutableElement::scale_in(instance).unwrap()
}
