// reclink CLI - config-driven record linkage and deduplication

mod exit_codes;
mod link;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use exit_codes::{EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "reclink")]
#[command(about = "Record linkage and deduplication across CSV and SQLite datasets")]
#[command(version)]
struct Cli {
    /// Log progress at info level (RECLINK_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a linkage project from a TOML config file
    #[command(after_help = "\
One dataset is deduplicated; two or more are linked pairwise.

Examples:
  reclink run customers.link.toml
  reclink run customers.link.toml --json > report.json
  reclink run customers.link.toml --limit 500 --no-export -v
  reclink run nightly.link.toml --fail-on-partial")]
    Run {
        /// Path to the .link.toml config file
        config: PathBuf,

        /// Load at most N records per dataset
        #[arg(long)]
        limit: Option<usize>,

        /// Print the JSON run report to stdout
        #[arg(long)]
        json: bool,

        /// Skip the [output] exports (CSV, SQLite, JSON file)
        #[arg(long)]
        no_export: bool,

        /// Exit 6 when some comparisons failed and others succeeded
        #[arg(long)]
        fail_on_partial: bool,
    },

    /// Parse and validate a config without loading data
    #[command(after_help = "\
Examples:
  reclink validate customers.link.toml")]
    Validate {
        /// Path to the .link.toml config file
        config: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("RECLINK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "info" } else { "warn" }));

    // stdout is reserved for --json
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run { config, limit, json, no_export, fail_on_partial } => {
            link::cmd_run(link::RunOptions { config, limit, json, no_export, fail_on_partial })
        }
        Commands::Validate { config } => link::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<reclink_linkage::LinkageError> for CliError {
    fn from(err: reclink_linkage::LinkageError) -> Self {
        use reclink_linkage::LinkageError;

        let code = exit_codes::linkage_exit_code(&err);
        let hint = match &err {
            LinkageError::Schema { .. } => {
                Some("check [datasets.columns] against the source header or table")
            }
            LinkageError::CandidateLimit { .. } => {
                Some("use a more selective blocking key or raise max_candidate_pairs")
            }
            LinkageError::ConfigParse(_) => Some("run `reclink validate <config>` for details"),
            _ => None,
        };
        Self { code, message: err.to_string(), hint: hint.map(String::from) }
    }
}
