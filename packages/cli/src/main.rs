//! reconcile-indexes
//!
//! Brings the secondary indexes of one or more collections to the state
//! declared in a configuration file.
//!
//! # Usage
//!
//! ```bash
//! reconcile-indexes --config config/variants.json
//! reconcile-indexes --config config/variants.json --dry-run
//! INDEXSYNC_ENDPOINT=http://localhost:8000 reconcile-indexes --config c.json
//! ```
//!
//! # Exit codes
//!
//! - `0`: every operation succeeded
//! - `1`: at least one drop/create request was rejected
//! - `2`: usage or configuration error
//! - `3`: storage engine unreachable

mod cli;
mod error;
mod output;

use clap::Parser;
use cli::Cli;
use error::{exit_with_error, CliError, CliResult};
use indexsync_core::{IndexReconciler, ReconcileConfig, ReconcileError, SurrealStore};
use std::sync::Arc;

fn init_tracing(cli: &Cli) {
    // --quiet → "off"; --verbose → RUST_LOG or "info"; default → RUST_LOG or "warn"
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("off")
    } else if cli.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(&cli);

    if let Err(e) = run(cli).await {
        exit_with_error(e);
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let mut config = ReconcileConfig::from_file(&cli.config)?;

    if let Some(endpoint) = cli.endpoint {
        config.connection.endpoint = endpoint;
    }
    if let Some(password) = cli.password {
        config.connection.password = Some(password);
    }
    config.validate()?;

    let collections = match cli.collection.as_deref() {
        Some(name) => config.select(name)?,
        None => config.collections.clone(),
    };

    let store = SurrealStore::connect(&config.connection)
        .await
        .map_err(|e| CliError::Connection(format!("{e:#}")))?;
    tracing::info!(
        "Connected to {}; reconciling {} collection(s)",
        config.connection.endpoint,
        collections.len()
    );
    let reconciler = IndexReconciler::new(Arc::new(store));

    if cli.dry_run {
        for collection in &collections {
            let plan = reconciler.plan(collection).await?;
            output::print_plan(&plan, cli.json)?;
        }
        return Ok(());
    }

    let mut failed = 0;
    for collection in &collections {
        match reconciler.reconcile(collection).await {
            Ok(report) => output::print_report(&report, cli.json)?,
            Err(ReconcileError::IndexBuild { report, .. }) => {
                failed += report.failures();
                output::print_report(&report, cli.json)?;
            }
            Err(e) => {
                // Whatever was applied before the connection dropped
                for report in e.completed().iter().chain([e.report()]) {
                    output::print_report(report, cli.json)?;
                }
                return Err(e.into());
            }
        }
    }

    if failed > 0 {
        return Err(CliError::IndexBuild { failed });
    }
    Ok(())
}
