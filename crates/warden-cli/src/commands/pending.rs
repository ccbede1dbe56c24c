//! `warden pending` - list live authorization requests.
//!
//! A read-only scan; runs unlocked, so a request mid-write may not be
//! visible yet. That staleness is harmless for an operator listing.

use std::process::ExitCode;

use anyhow::Result;
use warden_gate::GateConfig;
use warden_registry::RegistryStore;

pub(crate) fn run(config: &GateConfig, json: bool) -> Result<ExitCode> {
    let live = RegistryStore::new(&config.registry_path).scan();

    if json {
        println!("{}", serde_json::to_string_pretty(&live)?);
        return Ok(ExitCode::SUCCESS);
    }

    if live.is_empty() {
        println!("no live requests");
        return Ok(ExitCode::SUCCESS);
    }
    for request in live {
        println!(
            "{}  {}  {:?}  expires {}",
            request.code,
            request.operation,
            request.status,
            request.expires_at.format("%H:%M:%S"),
        );
    }
    Ok(ExitCode::SUCCESS)
}
