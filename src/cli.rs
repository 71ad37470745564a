use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "license-ledger",
    about = "Record dependency license snapshots and detect drift against the live dependency tree",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compare the live dependency tree with the cache; exit non-zero if anything needs review
    Status(ScanArgs),
    /// Reconcile and write the results to the cache
    Cache(ScanArgs),
}

impl Command {
    pub fn args(&self) -> &ScanArgs {
        match self {
            Command::Status(args) | Command::Cache(args) => args,
        }
    }
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Project path to scan
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Only scan these source types (comma-separated, e.g. `rubygem,npm`)
    #[arg(long, value_delimiter = ',', value_name = "LIST")]
    pub sources: Option<Vec<String>>,

    /// Delete cached records of dependencies that are gone instead of marking them stale
    #[arg(long)]
    pub prune: bool,

    /// Per-source enumeration timeout
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Config file [default: ./.license-ledger/config.toml, fallback ~/.config/license-ledger/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// Show unchanged dependencies and debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print summary line
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cache_flags() {
        let cli = Cli::try_parse_from([
            "license-ledger",
            "cache",
            "/project",
            "--sources=rubygem,npm",
            "--prune",
            "--timeout=30",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Cache(_)));
        let args = cli.command.args();
        assert_eq!(args.path, PathBuf::from("/project"));
        assert_eq!(
            args.sources,
            Some(vec!["rubygem".to_string(), "npm".to_string()])
        );
        assert!(args.prune);
        assert_eq!(args.timeout, Some(30));
    }

    #[test]
    fn test_status_defaults() {
        let cli = Cli::try_parse_from(["license-ledger", "status"]).unwrap();
        let args = cli.command.args();
        assert_eq!(args.path, PathBuf::from("."));
        assert!(args.sources.is_none());
        assert!(!args.prune);
        assert!(matches!(args.report, ReportFormat::Terminal));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["license-ledger"]).is_err());
    }
}
