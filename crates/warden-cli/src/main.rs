//! Warden CLI - human-gated action authorization.
//!
//! The host runtime invokes `warden check` before each sensitive
//! operation and reads the verdict off the exit code: 0 allows, 2
//! denies. The human's chat transport invokes `warden observe` with
//! each message from the approval authority; that command always exits
//! 0 because the approval channel must never block the human's own
//! interaction flow.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use warden_gate::GateConfig;

mod commands;

use commands::{check, keygen, observe, pending, policy};

/// Warden - human-gated action authorization.
#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding warden state (policy, key, registry)
    #[arg(long, global = true, env = "WARDEN_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Override the policy file location
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    /// Override the key file location
    #[arg(long, global = true)]
    key: Option<PathBuf>,

    /// Override the registry file location
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Treat an absent policy file as "nothing configured yet" and allow
    /// (bootstrap installs only; the default fails closed)
    #[arg(long, global = true)]
    allow_when_policy_absent: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide one attempted operation (exit 0 allows, exit 2 denies)
    Check {
        /// Operation group (e.g. payments)
        group: String,

        /// Operation name (e.g. charge)
        name: String,

        /// Operation argument as key=value, repeatable; shown to the
        /// human for review
        #[arg(long = "arg", value_name = "KEY=VALUE")]
        args: Vec<String>,

        /// Emit the verdict as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Feed one human message to the approval listener (always exits 0)
    Observe {
        /// The message text; read from stdin when omitted
        message: Vec<String>,
    },

    /// Provision the secret key file
    Keygen,

    /// List live authorization requests
    Pending {
        /// Emit JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Inspect protection policy
    Policy {
        #[command(subcommand)]
        command: PolicyCommands,
    },
}

#[derive(Subcommand)]
enum PolicyCommands {
    /// Show the loaded policy and its load state
    Show,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = build_config(&cli);
    let result = match cli.command {
        Commands::Check {
            ref group,
            ref name,
            ref args,
            json,
        } => check::run(&config, group, name, args, json),
        Commands::Observe { ref message } => observe::run(&config, message),
        Commands::Keygen => keygen::run(&config),
        Commands::Pending { json } => pending::run(&config, json),
        Commands::Policy {
            command: PolicyCommands::Show,
        } => policy::run(&config),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Logs go to stderr so stdout stays clean for JSON verdicts.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// One explicit configuration struct, sourced here and nowhere else.
fn build_config(cli: &Cli) -> GateConfig {
    let state_dir = cli
        .state_dir
        .clone()
        .unwrap_or_else(default_state_dir);
    let mut config = GateConfig::new(state_dir)
        .with_allow_when_policy_absent(cli.allow_when_policy_absent);
    if let Some(path) = &cli.policy {
        config = config.with_policy_path(path);
    }
    if let Some(path) = &cli.key {
        config = config.with_key_path(path);
    }
    if let Some(path) = &cli.registry {
        config = config.with_registry_path(path);
    }
    config
}

fn default_state_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "warden", "warden")
        .map_or_else(|| PathBuf::from(".warden"), |dirs| dirs.data_dir().to_path_buf())
}
