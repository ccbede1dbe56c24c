//! `warden keygen` - provision the shared secret.

use std::process::ExitCode;

use anyhow::{Context, Result};
use warden_crypto::SecretKey;
use warden_gate::GateConfig;

pub(crate) fn run(config: &GateConfig) -> Result<ExitCode> {
    let existed = config.key_path.exists();
    SecretKey::load_or_provision(&config.key_path)
        .with_context(|| format!("provisioning key at {}", config.key_path.display()))?;

    if existed {
        println!("key already present at {}", config.key_path.display());
    } else {
        println!("key provisioned at {}", config.key_path.display());
        println!("keep this file readable only by the approval authority");
    }
    Ok(ExitCode::SUCCESS)
}
