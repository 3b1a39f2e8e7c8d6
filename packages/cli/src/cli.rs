use clap::Parser;
use std::path::PathBuf;

/// Drop and (re)build secondary indexes from a declarative configuration
#[derive(Parser, Debug)]
#[command(name = "reconcile-indexes", version)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, env = "INDEXSYNC_CONFIG")]
    pub config: PathBuf,

    /// Override connection.endpoint (e.g. rocksdb://./data, http://localhost:8000)
    #[arg(long, env = "INDEXSYNC_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Override connection.password
    #[arg(long, env = "INDEXSYNC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Only reconcile this collection
    #[arg(long)]
    pub collection: Option<String>,

    /// Print the operations that would run without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print reports as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress log output
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_invocation() {
        let cli = Cli::try_parse_from(["reconcile-indexes", "--config", "variants.json"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("variants.json"));
        assert!(!cli.dry_run);
        assert!(cli.collection.is_none());
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::try_parse_from([
            "reconcile-indexes",
            "--config",
            "c.json",
            "--endpoint",
            "http://localhost:8000",
            "--collection",
            "variants",
            "--dry-run",
            "--json",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.endpoint.as_deref(), Some("http://localhost:8000"));
        assert_eq!(cli.collection.as_deref(), Some("variants"));
        assert!(cli.dry_run && cli.json && cli.verbose);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        let result = Cli::try_parse_from(["reconcile-indexes", "--config", "c.json", "-v", "-q"]);
        assert!(result.is_err());
    }
}
