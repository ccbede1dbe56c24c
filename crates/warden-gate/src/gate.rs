//! The decision point.
//!
//! # Check Order
//!
//! 1. Policy resolution; configuration denials short-circuit without
//!    touching the registry.
//! 2. Unprotected operation -> allow.
//! 3. Under the registry lock, consume a matching approved request if
//!    one verifies (one-time use); forged candidates are deleted and
//!    logged, never honored, and never allowed to shadow a legitimate
//!    one.
//! 4. Otherwise issue a fresh pending request and deny with the phrase
//!    and code the human must reproduce. Each repeated check issues a
//!    new code; codes are never reused across calls.

use chrono::Utc;
use tracing::{debug, info, warn};
use warden_crypto::{MacSigner, SecretKey};
use warden_policy::{
    ApprovalTier, OperationId, PolicyDecision, PolicyStore, ProtectionRequirement,
};
use warden_registry::{
    ApprovalCode, AuthorizationRequest, LockFile, RegistryError, RegistryStore, RequestStatus,
};

use crate::config::GateConfig;
use crate::error::GateResult;
use crate::verdict::{Denial, DenialReason, Verdict};

/// How many collision retries before giving up on code generation.
/// With a 27-character alphabet and six positions, one retry is already
/// rare; five exhausting means the RNG is broken.
const CODE_ATTEMPTS: u32 = 5;

/// The gate, invoked once per attempted sensitive operation.
pub struct Gate {
    policy: PolicyStore,
    registry: RegistryStore,
    lock: LockFile,
    signer: Option<MacSigner>,
    key_error: Option<String>,
    allow_when_policy_absent: bool,
}

impl Gate {
    /// Build a gate from configuration.
    ///
    /// Infallible by design: a missing or corrupt key or policy file is
    /// recorded and fails closed at check time with an operator-facing
    /// reason, which is more useful to the host runtime than a startup
    /// crash.
    #[must_use]
    pub fn open(config: &GateConfig) -> Self {
        let (signer, key_error) = match SecretKey::load(&config.key_path) {
            Ok(key) => (Some(MacSigner::new(&key)), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            policy: PolicyStore::load(&config.policy_path),
            registry: RegistryStore::new(&config.registry_path),
            lock: LockFile::new(&config.lock_path),
            signer,
            key_error,
            allow_when_policy_absent: config.allow_when_policy_absent,
        }
    }

    /// Decide one attempted operation.
    ///
    /// # Errors
    ///
    /// Returns an error only on registry I/O failure; every security
    /// condition is expressed as a [`Verdict`]. Callers should treat an
    /// error as a denial.
    pub fn check(
        &self,
        operation: &OperationId,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> GateResult<Verdict> {
        let requirement = match self.policy.lookup(operation) {
            PolicyDecision::Allow => {
                debug!(operation = %operation, "operation unprotected; allowing");
                return Ok(Verdict::Allow);
            },
            PolicyDecision::NoPolicy => {
                if self.allow_when_policy_absent {
                    debug!(operation = %operation, "no policy defined yet; allowing");
                    return Ok(Verdict::Allow);
                }
                warn!(operation = %operation, "policy file missing; failing closed");
                return Ok(deny(
                    DenialReason::PolicyAbsent,
                    format!(
                        "DENIED: {operation} cannot run because the protection policy file is \
                         missing. Restore the policy file (or explicitly configure \
                         allow_when_policy_absent for a fresh install)."
                    ),
                ));
            },
            PolicyDecision::Fault { reason } => {
                warn!(operation = %operation, reason = %reason, "policy fault; failing closed");
                return Ok(deny(
                    DenialReason::PolicyFault {
                        detail: reason.clone(),
                    },
                    format!("DENIED: {operation} cannot run: {reason}"),
                ));
            },
            PolicyDecision::UnknownGroup => {
                warn!(operation = %operation, "operation group unknown to policy; failing closed");
                return Ok(deny(
                    DenialReason::UnknownGroup,
                    format!(
                        "DENIED: operation group '{}' is not known to the protection policy. \
                         Add it to the policy or to unprotected_groups.",
                        operation.group
                    ),
                ));
            },
            PolicyDecision::Protected(requirement) => requirement,
        };

        let Some(signer) = &self.signer else {
            let detail = self
                .key_error
                .clone()
                .unwrap_or_else(|| "key not loaded".to_owned());
            warn!(operation = %operation, detail = %detail, "secret key unavailable; failing closed");
            return Ok(deny(
                DenialReason::KeyUnavailable {
                    detail: detail.clone(),
                },
                format!("DENIED: {operation} cannot run; approval signatures cannot be checked ({detail})."),
            ));
        };

        // Everything from here mutates the registry, so the whole
        // read-modify-write span holds the lock.
        let guard = match self.lock.acquire() {
            Ok(guard) => guard,
            Err(RegistryError::LockContended { .. }) => {
                warn!(operation = %operation, "registry lock contended; failing closed");
                return Ok(deny(
                    DenialReason::LockContended,
                    format!("DENIED: {operation} could not be checked (registry busy); try again."),
                ));
            },
            Err(e) => return Err(e.into()),
        };

        let now = Utc::now();
        for candidate in self.registry.scan() {
            if candidate.operation != *operation
                || candidate.status != RequestStatus::Approved
                || candidate.is_expired(now)
            {
                continue;
            }
            if candidate.verify_pending(signer) && candidate.verify_approved(signer) {
                self.registry.delete(&guard, &candidate.code)?;
                info!(
                    operation = %operation,
                    code = %candidate.code,
                    "consumed approved request; allowing"
                );
                return Ok(Verdict::Allow);
            }
            // A record claiming approval that the key never signed. Delete
            // it and keep scanning so it cannot shadow a legitimate one.
            warn!(
                operation = %operation,
                code = %candidate.code,
                "signature verification failed; deleting forged request"
            );
            self.registry.delete(&guard, &candidate.code)?;
        }

        let request = self.issue_request(&guard, operation, arguments, &requirement, signer)?;
        info!(
            operation = %operation,
            code = %request.code,
            tier = %requirement.tier,
            "approval required; issued request"
        );
        let instruction = instruction_text(&request, &requirement);
        drop(guard);

        Ok(deny(
            DenialReason::ApprovalRequired {
                code: request.code,
                phrase: requirement.phrase,
                tier: requirement.tier,
            },
            instruction,
        ))
    }

    /// Create and persist a fresh pending request, retrying code
    /// collisions against live entries.
    fn issue_request(
        &self,
        guard: &warden_registry::LockGuard,
        operation: &OperationId,
        arguments: serde_json::Map<String, serde_json::Value>,
        requirement: &ProtectionRequirement,
        signer: &MacSigner,
    ) -> GateResult<AuthorizationRequest> {
        let mut last = None;
        for _ in 0..CODE_ATTEMPTS {
            let request = AuthorizationRequest::new(
                ApprovalCode::generate(),
                operation.clone(),
                arguments.clone(),
                requirement.phrase.clone(),
                requirement.tier,
                signer,
            );
            match self.registry.put(guard, request.clone()) {
                Ok(()) => return Ok(request),
                Err(RegistryError::CodeCollision { code }) => {
                    debug!(code = %code, "code collision; regenerating");
                    last = Some(RegistryError::CodeCollision { code });
                },
                Err(e) => return Err(e.into()),
            }
        }
        Err(last
            .unwrap_or_else(|| RegistryError::Io("code generation failed".to_owned()))
            .into())
    }
}

fn deny(reason: DenialReason, instruction: String) -> Verdict {
    Verdict::Deny(Denial {
        reason,
        instruction,
    })
}

/// The human-facing denial block: operation, arguments for review, and
/// the exact utterance that will approve it.
fn instruction_text(request: &AuthorizationRequest, requirement: &ProtectionRequirement) -> String {
    let mut text = format!(
        "DENIED: {} requires human approval.\n\nRequested arguments:\n{}\n",
        request.operation,
        render_arguments(&request.arguments),
    );
    match requirement.tier {
        ApprovalTier::Direct => {
            text.push_str(&format!(
                "\nTo approve, the human operator must send:\n\n    APPROVE {} {}\n\n\
                 This code is single-use and expires in 5 minutes.",
                requirement.phrase, request.code
            ));
        },
        ApprovalTier::Delegated => {
            text.push_str(&format!(
                "\nThis operation uses delegated review: route the request to the designated \
                 reviewer first. Once review passes, approval must be typed by the human \
                 operator:\n\n    APPROVE {} {}\n\n\
                 This code is single-use and expires in 5 minutes.",
                requirement.phrase, request.code
            ));
        },
    }
    text
}

/// Arguments are displayed verbatim for human review; they are never
/// re-validated against the eventual call.
fn render_arguments(arguments: &serde_json::Map<String, serde_json::Value>) -> String {
    if arguments.is_empty() {
        return "    (none)".to_owned();
    }
    arguments
        .iter()
        .map(|(k, v)| format!("    {k} = {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}
