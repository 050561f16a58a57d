//! # xs-cli
//!
//! Command-line client for the Xen security policy manager.
//!
//! - `xs setpolicy <policytype> <policyname>`: deploy a policy, load it and
//!   activate it for boot
//! - `xs getpolicy`: show the policy the daemon currently manages
//!
//! Exit status is 0 on success, 1 on any failure, 2 on a usage error and 3
//! when the hypervisor reports an error code this client does not know.
//! Failures print a single `Error: <message>` line on stderr.

mod commands;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use xs_submit::config::DEFAULT_CONFIG_PATH;
use xs_policy::PolicyType;
use xs_submit::{ApiGeneration, ClientConfig, SubmitError};

const EXIT_FAILURE: u8 = 1;
const EXIT_USAGE: u8 = 2;
const EXIT_UNKNOWN_HV_ERROR: u8 = 3;

/// Xen security policy client: deploy and inspect ACM policies.
#[derive(Parser)]
#[command(name = "xs", version, about)]
struct Cli {
    /// Client configuration file [default: /etc/xen/xs-client.toml, if present].
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Daemon API generation to use (xen-api or legacy); overrides the config file.
    #[arg(long, global = true)]
    api: Option<ApiGeneration>,

    /// Log progress to stderr (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the policy managed by xend.
    #[command(name = "setpolicy", disable_help_flag = true)]
    SetPolicy(commands::setpolicy::SetPolicyArgs),
    /// Show the policy currently managed by xend.
    #[command(name = "getpolicy")]
    GetPolicy {
        /// Also print the policy's XML representation.
        #[arg(long)]
        dumpxml: bool,
    },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return usage_exit(e),
    };

    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", one_line(&e.to_string()));
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::SetPolicy(args) => {
            // An unsupported type fails before the config file is opened.
            PolicyType::parse(&args.policytype).map_err(SubmitError::from)?;
            commands::setpolicy::execute(args, &load_config(cli)?)
        }
        Commands::GetPolicy { dumpxml } => {
            commands::getpolicy::execute(*dumpxml, &load_config(cli)?)
        }
    }
}

/// An explicit `--config` must exist; the default path is optional.
fn load_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::load_or_default(Path::new(DEFAULT_CONFIG_PATH))?,
    };
    if let Some(api) = cli.api {
        config.api = api;
    }
    Ok(config)
}

// Logs go to stderr; silent unless asked for so that failures stay a single line.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "off",
        1 => "xs=info,xs_submit=info,xs_policy=info",
        _ => "xs=debug,xs_submit=debug,xs_policy=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

/// Map a failure to the process exit status.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<SubmitError>() {
        Some(e) if e.is_hard_fault() => EXIT_UNKNOWN_HV_ERROR,
        _ => EXIT_FAILURE,
    }
}

/// Handle a clap parse failure: help and version exit cleanly, anything
/// else is a usage error.
fn usage_exit(err: clap::Error) -> ExitCode {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = err.print();
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Error: {}", usage_message(&err.render().to_string()));
            ExitCode::from(EXIT_USAGE)
        }
    }
}

/// Condense clap's multi-line error into one line, dropping the usage block.
fn usage_message(rendered: &str) -> String {
    let body: Vec<&str> = rendered
        .lines()
        .take_while(|line| !line.trim().is_empty())
        .map(str::trim)
        .collect();
    let text = body.join(" ");
    text.strip_prefix("error: ").unwrap_or(&text).to_string()
}

fn one_line(message: &str) -> String {
    message.split_whitespace().collect::<Vec<_>>().join(" ")
}
