//! `mprot inspect`: node types and live instances of an application

use crate::error::CliResult;
use crate::output::{self, OutputFormat};
use mprot_application::{Application, NodeInstance};
use mprot_loader::load_application;
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

#[derive(Debug, Serialize, Tabled)]
struct NodeRow {
    name: String,
    initial_state: String,
    states: usize,
    operations: usize,
    transitions: usize,
}

#[derive(Debug, Serialize, Tabled)]
struct InstanceRow {
    id: String,
    node: String,
    state: String,
    container: String,
    status: String,
    bindings: String,
}

#[derive(Serialize)]
struct InspectReport {
    pi: String,
    nodes: Vec<NodeRow>,
    instances: Vec<InstanceRow>,
}

fn instance_row(app: &Application, instance: &NodeInstance) -> InstanceRow {
    let bindings = app
        .bindings_of(instance.id())
        .into_iter()
        .map(|(capability, providers)| {
            let providers: Vec<&str> = providers.iter().map(|p| p.as_str()).collect();
            format!("{}={}", capability, providers.join(","))
        })
        .collect::<Vec<_>>()
        .join("; ");

    InstanceRow {
        id: instance.id().to_string(),
        node: instance.node_name().to_string(),
        state: instance.state().to_string(),
        container: instance
            .container()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".into()),
        status: match instance.broken_cause() {
            Some(cause) => format!("broken: {}", cause),
            None => "ok".into(),
        },
        bindings,
    }
}

pub fn execute(app_path: &Path, format: OutputFormat) -> CliResult<()> {
    let app = load_application(app_path)?;

    let nodes: Vec<NodeRow> = app
        .nodes()
        .map(|node| NodeRow {
            name: node.name().to_string(),
            initial_state: node.initial_state().to_string(),
            states: node.protocol().states().len(),
            operations: node.protocol().operations().len(),
            transitions: node.protocol().transitions().len(),
        })
        .collect();
    let instances: Vec<InstanceRow> = app
        .instances()
        .map(|instance| instance_row(&app, instance))
        .collect();

    match format {
        OutputFormat::Json => output::print_json(&InspectReport {
            pi: app.pi_version().to_string(),
            nodes,
            instances,
        }),
        OutputFormat::Table => {
            output::print_heading(&format!("Nodes (binding policy {})", app.pi_version()));
            output::print_output(nodes, format)?;
            println!();
            output::print_heading("Instances");
            output::print_output(instances, format)
        }
    }
}
