//! `warden policy show` - inspect the loaded protection policy.

use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;
use warden_gate::GateConfig;
use warden_policy::{LoadState, PolicyStore};

pub(crate) fn run(config: &GateConfig) -> Result<ExitCode> {
    let store = PolicyStore::load(&config.policy_path);

    println!("policy file: {}", config.policy_path.display());
    match store.load_state() {
        LoadState::Loaded => println!("{}", store.describe()),
        LoadState::Absent => {
            let hint = if config.allow_when_policy_absent {
                "absent; allow_when_policy_absent is set, operations are allowed"
            } else {
                "absent; protected-capable operations are DENIED (fail-closed)"
            };
            println!("{}", hint.yellow());
        },
        LoadState::Failed { .. } => println!("{}", store.describe().red()),
    }
    Ok(ExitCode::SUCCESS)
}
