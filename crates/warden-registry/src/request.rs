//! The authorization request record.
//!
//! A request is created by the gate when it denies a protected operation,
//! flipped to approved by the listener after phrase+code validation, and
//! deleted either by consumption (the next matching gate check) or by
//! lazy expiry. Consumed and expired requests are deleted, never marked.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use warden_crypto::{Mac, MacSigner};
use warden_policy::{ApprovalTier, OperationId};

use crate::code::ApprovalCode;

/// How long a request stays live, in seconds. Fixed; not configurable.
pub const REQUEST_TTL_SECS: i64 = 5 * 60;

/// Status of a live request. One-way: `Pending -> Approved`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Created by the gate, awaiting the human's approval utterance.
    Pending,
    /// Approved by the listener; consumed by the next matching gate check.
    Approved,
}

/// An in-flight authorization request, keyed by its one-time code.
///
/// Both MAC fields are optional at the serialization layer so records
/// written without them still deserialize, but verification rejects a
/// missing MAC exactly like a wrong one: signing is mandatory, and a
/// record the secret key never touched is worthless as authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// One-time code; primary key among live requests.
    pub code: ApprovalCode,
    /// The operation this request would authorize.
    pub operation: OperationId,
    /// Snapshot of the operation's parameters at request time.
    ///
    /// For human review only; never re-validated against the eventual
    /// call.
    pub arguments: serde_json::Map<String, serde_json::Value>,
    /// Approval phrase captured from policy at creation time.
    pub phrase: String,
    /// Approval tier captured from policy at creation time.
    pub tier: ApprovalTier,
    /// Current status.
    pub status: RequestStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry time: `created_at` + 5 minutes.
    pub expires_at: DateTime<Utc>,
    /// MAC over (code, operation, expiry), proving the gate created this
    /// record.
    #[serde(default)]
    pub pending_mac: Option<Mac>,
    /// MAC over (code, operation, "approved", expiry), proving the
    /// listener performed the transition.
    #[serde(default)]
    pub approved_mac: Option<Mac>,
}

impl AuthorizationRequest {
    /// Create a pending request and seal it with its creation MAC.
    #[must_use]
    pub fn new(
        code: ApprovalCode,
        operation: OperationId,
        arguments: serde_json::Map<String, serde_json::Value>,
        phrase: impl Into<String>,
        tier: ApprovalTier,
        signer: &MacSigner,
    ) -> Self {
        Self::new_at(code, operation, arguments, phrase, tier, signer, Utc::now())
    }

    /// Create a pending request with an explicit creation time.
    ///
    /// The expiry window follows from `created_at`. Used by replay
    /// tooling and tests; production callers use [`Self::new`].
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new_at(
        code: ApprovalCode,
        operation: OperationId,
        arguments: serde_json::Map<String, serde_json::Value>,
        phrase: impl Into<String>,
        tier: ApprovalTier,
        signer: &MacSigner,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut request = Self {
            code,
            operation,
            arguments,
            phrase: phrase.into(),
            tier,
            status: RequestStatus::Pending,
            created_at,
            expires_at: created_at + Duration::seconds(REQUEST_TTL_SECS),
            pending_mac: None,
            approved_mac: None,
        };
        request.pending_mac = Some(sign_fields(signer, &request.pending_fields()));
        request
    }

    /// Whether the request has expired as of `now`.
    ///
    /// Every reader treats an expired request as absent.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Verify the creation MAC. A missing MAC fails.
    #[must_use]
    pub fn verify_pending(&self, signer: &MacSigner) -> bool {
        self.pending_mac
            .as_ref()
            .is_some_and(|mac| verify_fields(signer, &self.pending_fields(), mac))
    }

    /// Flip to approved and seal the transition with its own MAC.
    ///
    /// Only the approval listener calls this, after validating the
    /// human's phrase and code against the stored record.
    pub fn approve(&mut self, signer: &MacSigner) {
        self.status = RequestStatus::Approved;
        self.approved_mac = Some(sign_fields(signer, &self.approved_fields()));
    }

    /// Verify the approval MAC. A missing MAC fails.
    ///
    /// Checked independently of [`Self::verify_pending`]; a consumable
    /// request must pass both.
    #[must_use]
    pub fn verify_approved(&self, signer: &MacSigner) -> bool {
        self.approved_mac
            .as_ref()
            .is_some_and(|mac| verify_fields(signer, &self.approved_fields(), mac))
    }

    fn expiry_stamp(&self) -> String {
        self.expires_at.to_rfc3339()
    }

    fn pending_fields(&self) -> [String; 4] {
        [
            self.code.as_str().to_owned(),
            self.operation.group.clone(),
            self.operation.name.clone(),
            self.expiry_stamp(),
        ]
    }

    fn approved_fields(&self) -> [String; 5] {
        [
            self.code.as_str().to_owned(),
            self.operation.group.clone(),
            self.operation.name.clone(),
            "approved".to_owned(),
            self.expiry_stamp(),
        ]
    }
}

fn sign_fields(signer: &MacSigner, fields: &[String]) -> Mac {
    let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
    signer.sign(&refs)
}

fn verify_fields(signer: &MacSigner, fields: &[String], mac: &Mac) -> bool {
    let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
    signer.verify(&refs, mac)
}
