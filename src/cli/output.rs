//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying graphs and
//! deployment reports to the user in various formats.

use colored::Colorize;
use std::collections::BTreeMap;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::engine::{DeclarationStatus, DeploymentReport};
use crate::graph::ResourceGraph;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Graph row for table display.
#[derive(Tabled)]
struct GraphRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Depends on")]
    depends_on: String,
}

/// Outcome row for table display.
#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Duration")]
    duration: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a compiled dependency graph for display.
    #[must_use]
    pub fn format_graph(&self, graph: &ResourceGraph, show_edges: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&GraphJson::from(graph)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_graph_text(graph, show_edges),
        }
    }

    /// Formats a graph as text.
    fn format_graph_text(graph: &ResourceGraph, show_edges: bool) -> String {
        if graph.is_empty() {
            return String::from("The stack declares no resources.\n");
        }

        let mut output = String::new();
        let _ = writeln!(
            output,
            "\nDependency graph: {} declarations, {} edges\n",
            graph.len(),
            graph.edge_count()
        );

        let rows: Vec<GraphRow> = graph
            .execution_order()
            .iter()
            .enumerate()
            .map(|(position, &node)| {
                let depends_on = if show_edges {
                    graph
                        .dependencies(node)
                        .iter()
                        .map(|edge| graph.declaration(edge.on).ident().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                } else {
                    graph.dependencies(node).len().to_string()
                };
                GraphRow {
                    position: position + 1,
                    resource: graph.declaration(node).ident().to_string(),
                    depends_on,
                }
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');
        output
    }

    /// Formats a deployment report with its resolved stack outputs.
    #[must_use]
    pub fn format_report(
        &self,
        report: &DeploymentReport,
        outputs: &BTreeMap<String, serde_json::Value>,
    ) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "report": report,
                "outputs": outputs,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report, outputs),
        }
    }

    /// Formats a report as text.
    fn format_report_text(
        report: &DeploymentReport,
        outputs: &BTreeMap<String, serde_json::Value>,
    ) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "\nDeployment {}\n", report.deployment_id);

        let rows: Vec<OutcomeRow> = report
            .outcomes
            .iter()
            .map(|outcome| OutcomeRow {
                resource: outcome.ident.to_string(),
                status: Self::format_status(outcome.status),
                id: outcome.resource_id.clone().unwrap_or_else(|| String::from("-")),
                duration: outcome
                    .duration_ms
                    .map_or_else(|| String::from("-"), |ms| format!("{ms}ms")),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let summary = if report.success() {
            format!("{} {report}", "✓".green())
        } else if report.is_partial() {
            format!("{} {report}", "⚠".yellow())
        } else {
            format!("{} {report}", "✗".red())
        };
        let _ = writeln!(output, "\n{summary}");

        if !outputs.is_empty() {
            output.push_str("\nOutputs:\n");
            for (name, value) in outputs {
                let rendered = value
                    .as_str()
                    .map_or_else(|| value.to_string(), str::to_string);
                let _ = writeln!(output, "   {name} = {rendered}");
            }
        }

        for outcome in &report.outcomes {
            if let Some(error) = &outcome.error
                && outcome.status == DeclarationStatus::Failed {
                    let _ = writeln!(output, "\n{} {}: {error}", "✗".red(), outcome.ident);
                }
        }

        output
    }

    /// Formats a declaration status with color.
    fn format_status(status: DeclarationStatus) -> String {
        match status {
            DeclarationStatus::Succeeded => "succeeded".green().to_string(),
            DeclarationStatus::Failed => "failed".red().to_string(),
            DeclarationStatus::Blocked => "blocked".yellow().to_string(),
            DeclarationStatus::Cancelled => "cancelled".dimmed().to_string(),
        }
    }

    /// Prints a success message.
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "success", "message": message });
                eprintln!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
            }
            OutputFormat::Text => eprintln!("{} {message}", "✓".green()),
        }
    }

    /// Prints an error message.
    pub fn error(&self, message: &str) {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "error", "message": message });
                eprintln!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
            }
            OutputFormat::Text => eprintln!("{} {message}", "✗".red()),
        }
    }

    /// Prints a warning message.
    pub fn warning(&self, message: &str) {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "warning", "message": message });
                eprintln!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
            }
            OutputFormat::Text => eprintln!("{} {message}", "⚠".yellow()),
        }
    }
}

// JSON serialization helpers

#[derive(serde::Serialize)]
struct GraphJson {
    declarations: usize,
    edges: usize,
    order: Vec<NodeJson>,
}

#[derive(serde::Serialize)]
struct NodeJson {
    resource: String,
    depends_on: Vec<String>,
}

impl From<&ResourceGraph> for GraphJson {
    fn from(graph: &ResourceGraph) -> Self {
        Self {
            declarations: graph.len(),
            edges: graph.edge_count(),
            order: graph
                .execution_order()
                .iter()
                .map(|&node| NodeJson {
                    resource: graph.declaration(node).ident().to_string(),
                    depends_on: graph
                        .dependencies(node)
                        .iter()
                        .map(|edge| graph.declaration(edge.on).ident().to_string())
                        .collect(),
                })
                .collect(),
        }
    }
}
