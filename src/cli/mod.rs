//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Conduit using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Process exit codes returned by every command
pub mod exit_code {
    /// Run completed with no duplicate-key batches
    pub const SUCCESS: i32 = 0;
    /// Run completed, but some batches hit duplicate keys
    pub const COMPLETED_WITH_DUPLICATES: i32 = 1;
    /// Configuration could not be loaded or is invalid
    pub const CONFIGURATION: i32 = 2;
    /// The backing store could not be reached
    pub const CONNECTION: i32 = 4;
    /// A fatal error ended the command
    pub const FATAL: i32 = 5;
    /// Stopped by SIGINT/SIGTERM (standard Unix convention)
    pub const CANCELLED: i32 = 130;
}

/// Conduit - bounded-memory streaming pipeline
#[derive(Parser, Debug)]
#[command(name = "conduit")]
#[command(version, about, long_about = None)]
#[command(author = "Conduit Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "conduit.toml", env = "CONDUIT_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "CONDUIT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream records from the source through processing into the sink
    Run(commands::run::RunArgs),

    /// Write generated records to the source table
    Seed(commands::seed::SeedArgs),

    /// Count records matching a filter
    Count(commands::count::CountArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Category;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["conduit", "run"]);
        assert_eq!(cli.config, "conduit.toml");
        assert!(matches!(cli.command, Commands::Run(_)));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["conduit", "--config", "custom.toml", "run"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["conduit", "--log-level", "debug", "run"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_run_overrides() {
        let cli = Cli::parse_from([
            "conduit",
            "run",
            "--limit",
            "50",
            "--batch-size",
            "25",
            "--concurrency",
            "8",
            "--synthetic",
            "1000",
            "--category",
            "b",
            "--output",
            "json",
            "--dry-run",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.limit, Some(50));
        assert_eq!(args.batch_size, Some(25));
        assert_eq!(args.concurrency, Some(8));
        assert_eq!(args.synthetic, Some(1000));
        assert_eq!(args.category, Some(Category::B));
        assert_eq!(args.output, commands::run::OutputFormat::Json);
        assert!(args.dry_run);
    }

    #[test]
    fn test_cli_parse_seed() {
        let cli = Cli::parse_from(["conduit", "seed", "--count", "100"]);
        let Commands::Seed(args) = cli.command else {
            panic!("expected seed");
        };
        assert_eq!(args.count, 100);
        assert_eq!(args.batch_size, 500);
    }

    #[test]
    fn test_cli_parse_count() {
        let cli = Cli::parse_from(["conduit", "count", "--sink"]);
        assert!(matches!(cli.command, Commands::Count(ref a) if a.sink));
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["conduit", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["conduit", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }
}
