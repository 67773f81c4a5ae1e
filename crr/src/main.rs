//! Case Run Reporter CLI
//!
//! Binds a CI execution to a test-management product and records one test
//! case outcome against the automated run for its build and environment.

#![forbid(unsafe_code)]

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use crr::{CaseRunStatus, CaseSelector, Driver, ReconcileError};
use crr_common::{CaseId, ConfigError, ErrorCode, LogConfig, ReporterConfig, init_logging};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

const DEFAULT_CONFIG_FILE: &str = "crr.toml";

#[derive(Parser)]
#[command(name = "crr")]
#[command(author, version, about = "Case run reporter - record CI test outcomes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ./crr.toml, then ~/.config/crr/crr.toml)
    #[arg(short, long, global = true, env = "CRR_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    overrides: Overrides,
}

/// Per-invocation overrides; they win over file and environment values.
#[derive(clap::Args, Default)]
struct Overrides {
    /// Service endpoint (http:// or https://)
    #[arg(long, global = true)]
    url: Option<String>,

    #[arg(long, global = true)]
    username: Option<String>,

    /// Branch under test
    #[arg(long, global = true)]
    branch: Option<String>,

    /// Commit under test
    #[arg(long, global = true)]
    commit: Option<String>,

    #[arg(long, global = true)]
    milestone: Option<String>,

    /// Environment label, matched as a name suffix
    #[arg(long, global = true)]
    environment: Option<String>,

    /// Date used in the automated run summary (default: today, UTC)
    #[arg(long, global = true)]
    build_date: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record one test case outcome
    Report {
        /// Product name (exact)
        #[arg(short, long)]
        product: String,

        /// Test case alias among the plan's automated cases
        #[arg(long, conflicts_with = "case_id", required_unless_present = "case_id")]
        case: Option<String>,

        /// Test case id; not checked against the bound plan
        #[arg(long)]
        case_id: Option<u64>,

        /// Status name (passed, failed, blocked, ...) or numeric id
        #[arg(short, long)]
        status: CaseRunStatus,
    },

    /// Bind a product and print the resolved context as JSON
    Resolve {
        #[arg(short, long)]
        product: String,
    },

    /// Explain an error code (e.g. CRR-E403)
    Explain { code: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("info").with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = match init_logging(&log_config) {
        Ok(guards) => guards,
        Err(err) => {
            eprintln!("{}", err.code().entry().format_full());
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(code) = error_code(&err) {
                eprintln!("{}", code.entry().format_full());
            }
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Explain { code } => explain(&code),
        Commands::Resolve { product } => {
            let config = load_config(cli.config.as_deref(), &cli.overrides)?;
            let mut driver = Driver::open(&config)?;
            let bound = driver.bind_product(&product)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "product": bound.product,
                    "plan": bound.plan,
                    "environment": bound.environment,
                    "build": bound.build,
                    "run": bound.run,
                    "created": bound.created,
                }))?
            );
            Ok(())
        }
        Commands::Report {
            product,
            case,
            case_id,
            status,
        } => {
            let selector = match (case, case_id) {
                (Some(alias), _) => CaseSelector::Alias(alias),
                (None, Some(id)) => CaseSelector::Id(CaseId::new(id)),
                (None, None) => anyhow::bail!("either --case or --case-id is required"),
            };
            let config = load_config(cli.config.as_deref(), &cli.overrides)?;
            let mut driver = Driver::open(&config)?;
            driver.bind_product(&product)?;
            let case_run = driver.bind_case_run(&selector)?.clone();
            let report = driver.execute_case_run(status)?;
            println!(
                "run {} case {}: {}{}",
                case_run.product.run_id(),
                case_run.case_id(),
                report.status,
                if report.case_run_created {
                    " (case run created)"
                } else {
                    ""
                }
            );
            Ok(())
        }
    }
}

fn explain(code: &str) -> Result<()> {
    let parsed = ErrorCode::parse(code)
        .with_context(|| format!("unknown error code '{code}'"))?;
    println!("{}", parsed.entry().format_full());
    Ok(())
}

fn default_config_path() -> PathBuf {
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return local;
    }
    dirs::config_dir()
        .map(|dir| dir.join("crr").join(DEFAULT_CONFIG_FILE))
        .unwrap_or(local)
}

fn load_config(path: Option<&std::path::Path>, overrides: &Overrides) -> Result<ReporterConfig> {
    let path = path.map(PathBuf::from).unwrap_or_else(default_config_path);
    let mut config = ReporterConfig::load(&path)?;
    config.apply_env_overrides()?;
    apply_overrides(&mut config, overrides);
    config.validate()?;
    debug!(config = ?config, path = %path.display(), "Configuration loaded");
    Ok(config)
}

fn apply_overrides(config: &mut ReporterConfig, overrides: &Overrides) {
    if let Some(url) = &overrides.url {
        config.set_from_cli("server.url", |c| c.server.url = url.clone());
    }
    if let Some(username) = &overrides.username {
        config.set_from_cli("server.username", |c| c.server.username = username.clone());
    }
    if let Some(branch) = &overrides.branch {
        config.set_from_cli("build.branch", |c| c.build.branch = branch.clone());
    }
    if let Some(commit) = &overrides.commit {
        config.set_from_cli("build.commit", |c| c.build.commit = commit.clone());
    }
    if let Some(milestone) = &overrides.milestone {
        config.set_from_cli("build.milestone", |c| c.build.milestone = milestone.clone());
    }
    if let Some(environment) = &overrides.environment {
        config.set_from_cli("run.environment", |c| c.run.environment = environment.clone());
    }
    if let Some(date) = &overrides.build_date {
        config.set_from_cli("build.date", |c| c.build.date = Some(date.clone()));
    }
}

fn error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    if let Some(err) = err.downcast_ref::<ReconcileError>() {
        return Some(err.code());
    }
    if let Some(err) = err.downcast_ref::<ConfigError>() {
        return Some(err.code());
    }
    None
}
