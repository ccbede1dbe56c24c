//! End-to-end tests of the deny/approve/consume protocol.
//!
//! Each test provisions an isolated state directory and drives the gate
//! and listener exactly the way the short-lived processes do in
//! production: fresh component instances per invocation, all shared
//! state on disk.

use chrono::{Duration, Utc};
use warden_crypto::{MacSigner, SecretKey};
use warden_gate::{DenialReason, Gate, GateConfig, Listener, ListenerOutcome, RejectReason, Verdict};
use warden_policy::{ApprovalTier, OperationId};
use warden_registry::{ApprovalCode, AuthorizationRequest, LockFile, RegistryStore};

const POLICY: &str = r#"
unprotected_groups = ["search"]

[groups.payments]
tier = "direct"
phrase = "PROD"
protected = ["charge", "refund"]

[groups.deploy]
tier = "delegated"
phrase = "SHIP IT"
protected = ["rollout"]
"#;

struct World {
    _dir: tempfile::TempDir,
    config: GateConfig,
}

impl World {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = GateConfig::new(dir.path());
        std::fs::write(&config.policy_path, POLICY).expect("write policy");
        SecretKey::load_or_provision(&config.key_path).expect("provision key");
        Self { _dir: dir, config }
    }

    /// A fresh gate instance, as each check is in production.
    fn gate(&self) -> Gate {
        Gate::open(&self.config)
    }

    fn listener(&self) -> Listener {
        Listener::open(&self.config)
    }

    fn signer(&self) -> MacSigner {
        MacSigner::new(&SecretKey::load(&self.config.key_path).expect("load key"))
    }

    fn registry(&self) -> RegistryStore {
        RegistryStore::new(&self.config.registry_path)
    }

    fn check(&self, group: &str, name: &str) -> Verdict {
        self.gate()
            .check(&OperationId::new(group, name), serde_json::Map::new())
            .expect("check")
    }

    /// Run a check expected to deny with a fresh approval request, and
    /// return its code and phrase.
    fn deny_with_code(&self, group: &str, name: &str) -> (ApprovalCode, String) {
        match self.check(group, name) {
            Verdict::Deny(denial) => match denial.reason {
                DenialReason::ApprovalRequired { code, phrase, .. } => (code, phrase),
                other => panic!("expected ApprovalRequired, got {other:?}"),
            },
            Verdict::Allow => panic!("expected denial"),
        }
    }
}

#[test]
fn deny_approve_allow_then_deny_again() {
    let w = World::new();

    // First attempt denies and issues a code.
    let (code, phrase) = w.deny_with_code("payments", "charge");
    assert_eq!(phrase, "PROD");

    // The human approves within the window.
    let outcome = w.listener().observe(&format!("APPROVE PROD {code}"));
    assert_eq!(outcome, ListenerOutcome::Approved { code: code.clone() });

    // The next matching check consumes the approval.
    assert!(w.check("payments", "charge").is_allowed());

    // And the one after that starts over with a fresh code.
    let (second_code, _) = w.deny_with_code("payments", "charge");
    assert_ne!(second_code, code);
}

#[test]
fn repeated_checks_issue_fresh_codes() {
    let w = World::new();
    let (a, _) = w.deny_with_code("payments", "charge");
    let (b, _) = w.deny_with_code("payments", "charge");
    assert_ne!(a, b, "codes must never be reused across calls");
}

#[test]
fn approval_is_operation_specific() {
    let w = World::new();
    let (code, _) = w.deny_with_code("payments", "charge");
    w.listener().observe(&format!("APPROVE PROD {code}"));

    // A different protected operation does not consume it.
    let (_refund_code, _) = w.deny_with_code("payments", "refund");

    // The original operation still has its approval.
    assert!(w.check("payments", "charge").is_allowed());
}

#[test]
fn unprotected_operations_pass_through() {
    let w = World::new();
    // Listed group, operation not in its protected list.
    assert!(w.check("payments", "status").is_allowed());
    // Group on the explicit unprotected list.
    assert!(w.check("search", "query").is_allowed());
}

#[test]
fn unknown_group_fails_closed() {
    let w = World::new();
    match w.check("payments2", "charge") {
        Verdict::Deny(denial) => {
            assert!(matches!(denial.reason, DenialReason::UnknownGroup));
        },
        Verdict::Allow => panic!("aliasing a fresh group name must not dodge policy"),
    }
}

#[test]
fn deleted_policy_file_denies_by_default() {
    let w = World::new();
    std::fs::remove_file(&w.config.policy_path).expect("delete policy");

    match w.check("payments", "charge") {
        Verdict::Deny(denial) => {
            assert!(matches!(denial.reason, DenialReason::PolicyAbsent));
            assert!(denial.reason.is_configuration_error());
        },
        Verdict::Allow => panic!("deleting the policy must not disable the gate"),
    }
}

#[test]
fn absent_policy_allows_when_configured_for_bootstrap() {
    let w = World::new();
    std::fs::remove_file(&w.config.policy_path).expect("delete policy");

    let config = w.config.clone().with_allow_when_policy_absent(true);
    let verdict = Gate::open(&config)
        .check(&OperationId::new("payments", "charge"), serde_json::Map::new())
        .expect("check");
    assert!(verdict.is_allowed());
}

#[test]
fn corrupt_policy_file_denies_everything_protected_capable() {
    let w = World::new();
    std::fs::write(&w.config.policy_path, "groups = 3").expect("corrupt policy");

    for (group, name) in [("payments", "charge"), ("search", "query"), ("new", "thing")] {
        match w.check(group, name) {
            Verdict::Deny(denial) => {
                assert!(matches!(denial.reason, DenialReason::PolicyFault { .. }));
            },
            Verdict::Allow => panic!("{group}:{name} allowed under corrupt policy"),
        }
    }
}

#[test]
fn missing_key_denies_protected_operations_only() {
    let w = World::new();
    std::fs::remove_file(&w.config.key_path).expect("delete key");

    match w.check("payments", "charge") {
        Verdict::Deny(denial) => {
            assert!(matches!(denial.reason, DenialReason::KeyUnavailable { .. }));
        },
        Verdict::Allow => panic!("unverifiable signatures must reject"),
    }
    // Unprotected operations never need signatures.
    assert!(w.check("search", "query").is_allowed());
}

#[test]
fn wrong_phrase_is_rejected_without_approving() {
    let w = World::new();
    let (code, _) = w.deny_with_code("payments", "charge");

    let outcome = w.listener().observe(&format!("APPROVE STAGING {code}"));
    assert_eq!(
        outcome,
        ListenerOutcome::Rejected {
            code: Some(code),
            reason: RejectReason::PhraseMismatch,
        }
    );
    assert!(!w.check("payments", "charge").is_allowed());
}

#[test]
fn unknown_code_is_rejected_with_reason() {
    let w = World::new();
    let outcome = w.listener().observe("APPROVE PROD QQQQQQ");
    assert_eq!(
        outcome,
        ListenerOutcome::Rejected {
            code: Some("QQQQQQ".parse().expect("valid code")),
            reason: RejectReason::NoSuchRequest,
        }
    );
}

#[test]
fn listener_ignores_unrelated_messages() {
    let w = World::new();
    assert_eq!(w.listener().observe("ship the release"), ListenerOutcome::Ignored);
    assert_eq!(w.listener().observe(""), ListenerOutcome::Ignored);
    assert_eq!(
        w.listener().observe("I approve of this plan"),
        ListenerOutcome::Ignored
    );
}

#[test]
fn forged_approved_status_is_deleted_and_never_honored() {
    let w = World::new();
    let (code, _) = w.deny_with_code("payments", "charge");

    // The agent edits the registry file directly: flips status to
    // approved without being able to mint the approval MAC.
    let raw = std::fs::read_to_string(&w.config.registry_path).expect("read registry");
    let tampered = raw.replace("\"pending\"", "\"approved\"");
    assert_ne!(raw, tampered, "fixture should contain a pending record");
    std::fs::write(&w.config.registry_path, tampered).expect("write registry");

    assert!(!w.check("payments", "charge").is_allowed());
    // The forged record was deleted during the scan.
    assert!(w.registry().get(&code).is_none());
}

#[test]
fn tampered_approved_mac_is_deleted_and_never_honored() {
    let w = World::new();
    let (code, _) = w.deny_with_code("payments", "charge");
    w.listener().observe(&format!("APPROVE PROD {code}"));

    // Corrupt one hex character of the approval MAC.
    let raw = std::fs::read_to_string(&w.config.registry_path).expect("read registry");
    let mut records: Vec<serde_json::Value> = serde_json::from_str(&raw).expect("parse registry");
    let mac = records[0]["approved_mac"].as_str().expect("mac present").to_owned();
    let flipped = if mac.starts_with('a') {
        format!("b{}", &mac[1..])
    } else {
        format!("a{}", &mac[1..])
    };
    records[0]["approved_mac"] = serde_json::Value::String(flipped);
    std::fs::write(
        &w.config.registry_path,
        serde_json::to_string_pretty(&records).expect("serialize"),
    )
    .expect("write registry");

    assert!(!w.check("payments", "charge").is_allowed());
    assert!(w.registry().get(&code).is_none());
}

#[test]
fn tampered_pending_mac_rejects_approval() {
    let w = World::new();
    let (code, _) = w.deny_with_code("payments", "charge");

    let raw = std::fs::read_to_string(&w.config.registry_path).expect("read registry");
    let mut records: Vec<serde_json::Value> = serde_json::from_str(&raw).expect("parse registry");
    records[0]["pending_mac"] = serde_json::Value::String("00".repeat(32));
    std::fs::write(
        &w.config.registry_path,
        serde_json::to_string_pretty(&records).expect("serialize"),
    )
    .expect("write registry");

    let outcome = w.listener().observe(&format!("APPROVE PROD {code}"));
    assert_eq!(
        outcome,
        ListenerOutcome::Rejected {
            code: Some(code.clone()),
            reason: RejectReason::Forged,
        }
    );
    assert!(w.registry().get(&code).is_none());
}

#[test]
fn expired_approval_is_treated_as_absent() {
    let w = World::new();
    let signer = w.signer();

    // A request created just over five minutes ago: MACs are valid over
    // its (past) expiry, and it was properly approved.
    let mut request = AuthorizationRequest::new_at(
        ApprovalCode::generate(),
        OperationId::new("payments", "charge"),
        serde_json::Map::new(),
        "PROD",
        ApprovalTier::Direct,
        &signer,
        Utc::now() - Duration::seconds(301),
    );
    request.approve(&signer);
    assert!(request.verify_pending(&signer) && request.verify_approved(&signer));

    let lock = LockFile::new(&w.config.lock_path);
    let guard = lock.acquire().expect("lock");
    w.registry().put(&guard, request).expect("put");
    drop(guard);

    // t + 5m + epsilon: the approval must not be honored.
    assert!(!w.check("payments", "charge").is_allowed());
}

#[test]
fn racing_checks_consume_an_approval_exactly_once() {
    let w = World::new();
    let (code, _) = w.deny_with_code("payments", "charge");
    w.listener().observe(&format!("APPROVE PROD {code}"));

    let mut handles = Vec::new();
    for _ in 0..2 {
        let config = w.config.clone();
        handles.push(std::thread::spawn(move || {
            Gate::open(&config)
                .check(&OperationId::new("payments", "charge"), serde_json::Map::new())
                .expect("check")
                .is_allowed()
        }));
    }
    let allowed = handles
        .into_iter()
        .map(|h| h.join().expect("join"))
        .filter(|allowed| *allowed)
        .count();

    assert_eq!(allowed, 1, "exactly one racing check may consume an approval");
}

#[test]
fn delegated_tier_changes_instruction_not_mechanics() {
    let w = World::new();

    let denial = match w.check("deploy", "rollout") {
        Verdict::Deny(denial) => denial,
        Verdict::Allow => panic!("expected denial"),
    };
    assert!(denial.instruction.contains("delegated review"));
    let (code, phrase, tier) = match denial.reason {
        DenialReason::ApprovalRequired { code, phrase, tier } => (code, phrase, tier),
        other => panic!("expected ApprovalRequired, got {other:?}"),
    };
    assert_eq!(phrase, "SHIP IT");
    assert_eq!(tier, ApprovalTier::Delegated);

    // Same approval mechanics as the direct tier, multiword phrase.
    let outcome = w.listener().observe(&format!("approve ship it {code}"));
    assert!(matches!(outcome, ListenerOutcome::Approved { .. }));
    assert!(w.check("deploy", "rollout").is_allowed());
}

#[test]
fn lock_contention_fails_closed() {
    let w = World::new();
    let lock = LockFile::new(&w.config.lock_path);
    let _held = lock.acquire().expect("hold the lock");

    match w.check("payments", "charge") {
        Verdict::Deny(denial) => {
            assert!(matches!(denial.reason, DenialReason::LockContended));
        },
        Verdict::Allow => panic!("a contended lock must deny, not allow"),
    }
    // No request was created without the lock.
    assert!(w.registry().scan().is_empty());
}
