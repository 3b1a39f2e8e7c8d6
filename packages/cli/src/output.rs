//! Human-readable and JSON rendering of plans and reports.
//!
//! Successful and skipped operations go to stdout; failures go to stderr so
//! they stay visible when stdout is piped.

use crate::error::CliResult;
use indexsync_core::{IndexOperation, OperationOutcome, ReconcilePlan, ReconcileReport};

/// Rendered output split by destination stream
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Rendered {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl Rendered {
    fn emit(&self) {
        for line in &self.stdout {
            println!("{line}");
        }
        for line in &self.stderr {
            eprintln!("{line}");
        }
    }
}

fn applied_line(collection: &str, operation: &IndexOperation) -> String {
    match operation {
        IndexOperation::Drop { name } => format!("[{collection}] dropped index '{name}'"),
        IndexOperation::Create { name, definition } => {
            format!("[{collection}] created index '{name}' on {}", definition.fields)
        }
    }
}

pub fn render_report(report: &ReconcileReport) -> Rendered {
    let collection = report.collection.as_str();
    let mut rendered = Rendered::default();

    for record in &report.records {
        match &record.outcome {
            OperationOutcome::Applied => rendered
                .stdout
                .push(applied_line(collection, &record.operation)),
            OperationOutcome::Skipped(reason) => rendered.stdout.push(format!(
                "[{collection}] skipped {}: {reason}",
                record.operation
            )),
            OperationOutcome::Failed(reason) => rendered.stderr.push(format!(
                "error: [{collection}] {} failed: {reason}",
                record.operation
            )),
            OperationOutcome::Pending => rendered.stdout.push(format!(
                "[{collection}] pending {}",
                record.operation
            )),
        }
    }

    rendered.stdout.push(format!(
        "[{collection}] {} dropped, {} created, {} skipped, {} failed",
        report.drops(),
        report.creates(),
        report.skipped(),
        report.failures()
    ));

    rendered
}

pub fn render_plan(plan: &ReconcilePlan) -> Rendered {
    let collection = plan.collection.as_str();
    let mut rendered = Rendered::default();

    for record in &plan.records {
        let line = match &record.outcome {
            OperationOutcome::Skipped(reason) => {
                format!("[{collection}] would skip {}: {reason}", record.operation)
            }
            _ => format!("[{collection}] would {}", record.operation),
        };
        rendered.stdout.push(line);
    }

    if plan.is_noop() {
        rendered
            .stdout
            .push(format!("[{collection}] already up to date"));
    }

    rendered
}

pub fn print_report(report: &ReconcileReport, json: bool) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        // Failures are reported on stderr in every mode
        let mut rendered = render_report(report);
        rendered.stdout.clear();
        rendered.emit();
    } else {
        render_report(report).emit();
    }
    Ok(())
}

pub fn print_plan(plan: &ReconcilePlan, json: bool) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(plan)?);
    } else {
        render_plan(plan).emit();
    }
    Ok(())
}
