//! Facilitator response types and the invalid-reason taxonomy.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// Reason tags surfaced to clients. Clients remediate on these: approve
/// Permit2, top up balance, or request a fresh 402.
pub mod reasons {
    pub const INVALID_SPENDER: &str = "invalid_spender";
    pub const INVALID_RECIPIENT: &str = "invalid_recipient";
    pub const PERMIT2_DEADLINE_EXPIRED: &str = "permit2_deadline_expired";
    pub const PERMIT2_NOT_YET_VALID: &str = "permit2_not_yet_valid";
    pub const INSUFFICIENT_AUTHORIZED_AMOUNT: &str = "insufficient_authorized_amount";
    pub const INVALID_PERMIT2_SIGNATURE: &str = "invalid_permit2_signature";
    pub const SIGNATURE_VERIFICATION_FAILED: &str = "signature_verification_failed";
    pub const PERMIT2_ALLOWANCE_REQUIRED: &str = "permit2_allowance_required";
    pub const ALLOWANCE_CHECK_FAILED: &str = "allowance_check_failed";
    pub const INSUFFICIENT_BALANCE: &str = "insufficient_balance";
    pub const BALANCE_CHECK_FAILED: &str = "balance_check_failed";

    pub const SETTLEMENT_EXCEEDS_AUTHORIZATION: &str = "settlement_exceeds_authorization";
    pub const TRANSACTION_REVERTED: &str = "transaction_reverted";
}

/// Response from the facilitator's `/verify` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<Address>,
}

impl VerifyResponse {
    pub fn valid(payer: Address) -> Self {
        Self {
            is_valid: true,
            invalid_reason: None,
            payer: Some(payer),
        }
    }

    pub fn invalid(reason: &str) -> Self {
        Self {
            is_valid: false,
            invalid_reason: Some(reason.to_string()),
            payer: None,
        }
    }
}

/// Response from the facilitator's `/settle` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SettleResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            tx_hash: None,
            settled_amount: None,
            error: Some(error.into()),
        }
    }
}

/// Settlement summary the middleware base64-encodes into the
/// `X-Payment-Response` header on a paid success.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementInfo {
    pub success: bool,
    /// Empty string when the settlement was elided (zero consumption).
    pub tx_hash: String,
    pub settled_amount: String,
    pub authorized_amount: String,
}
