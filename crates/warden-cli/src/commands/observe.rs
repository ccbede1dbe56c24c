//! `warden observe` - feed one human message to the approval listener.

use std::io::Read;
use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;
use warden_gate::{GateConfig, Listener, ListenerOutcome};

pub(crate) fn run(config: &GateConfig, message: &[String]) -> Result<ExitCode> {
    let text = if message.is_empty() {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        message.join(" ")
    };

    let outcome = Listener::open(config).observe(&text);
    match outcome {
        ListenerOutcome::Ignored => {},
        ListenerOutcome::Approved { code } => {
            println!("{}", format!("approved request {code}").green());
        },
        ListenerOutcome::Rejected { code, reason } => {
            // Advisory only: the human sees why, nothing else changes.
            match code {
                Some(code) => println!("{}", format!("not approved ({code}): {reason}").yellow()),
                None => println!("{}", format!("not approved: {reason}").yellow()),
            }
        },
    }

    // The approval channel never blocks or fails the human's flow.
    Ok(ExitCode::SUCCESS)
}
