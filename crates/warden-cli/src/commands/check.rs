//! `warden check` - the decision call.

use std::process::ExitCode;

use anyhow::{bail, Result};
use colored::Colorize;
use warden_gate::{Gate, GateConfig, Verdict};
use warden_policy::OperationId;

/// Exit code for a denial. Distinct from 1 so callers can tell "denied"
/// from "the tool itself failed" - though both must be treated as
/// not-allowed.
const DENY_EXIT: u8 = 2;

pub(crate) fn run(
    config: &GateConfig,
    group: &str,
    name: &str,
    args: &[String],
    json: bool,
) -> Result<ExitCode> {
    let operation = OperationId::new(group, name);
    let arguments = parse_arguments(args)?;

    let gate = Gate::open(config);
    let verdict = match gate.check(&operation, arguments) {
        Ok(verdict) => verdict,
        // Registry I/O failure: fail closed, surfaced as an error.
        Err(e) => {
            eprintln!("{}", format!("DENIED: {operation}: {e}").red());
            return Ok(ExitCode::from(DENY_EXIT));
        },
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        match &verdict {
            Verdict::Allow => println!("{}", format!("ALLOWED: {operation}").green()),
            Verdict::Deny(denial) => println!("{}", denial.instruction.yellow()),
        }
    }

    Ok(if verdict.is_allowed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(DENY_EXIT)
    })
}

/// Parse repeated `key=value` arguments into the review snapshot.
fn parse_arguments(args: &[String]) -> Result<serde_json::Map<String, serde_json::Value>> {
    let mut map = serde_json::Map::new();
    for arg in args {
        let Some((key, value)) = arg.split_once('=') else {
            bail!("argument {arg:?} is not of the form key=value");
        };
        map.insert(
            key.to_owned(),
            serde_json::Value::String(value.to_owned()),
        );
    }
    Ok(map)
}
