//! Wire-format payment types.
//!
//! Integer-valued fields travel as decimal strings (JSON safety) and are
//! parsed into `U256` only at signing and verification time. The conversion
//! lives in [`Permit2Authorization::typed_message`]; getting it wrong there
//! silently produces signature mismatches, so nothing else re-implements it.

use alloy::primitives::{Address, Bytes, U256};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::UptoError;
use crate::{PermitTransferFrom, PermitWitnessTransferFrom, TokenPermissions, x402Witness};

/// A single entry in the `accepts` array of a 402 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    /// CAIP-2 network identifier, e.g. `eip155:84532`.
    pub network: String,
    /// Token contract the payment is denominated in.
    pub asset: Address,
    /// Server-side ceiling in smallest token units; the payer must authorize
    /// at least this much.
    pub max_amount: String,
    pub pay_to: Address,
    pub max_timeout_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Token/amount pair inside the authorization. `amount` is the ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPermissionsData {
    pub token: Address,
    pub amount: String,
}

/// Witness fields bound into the Permit2 signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WitnessData {
    pub to: Address,
    pub valid_after: String,
    pub extra: Bytes,
}

/// The Permit2 authorization signed by the payer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permit2Authorization {
    pub from: Address,
    pub permitted: TokenPermissionsData,
    /// Always the upto proxy contract.
    pub spender: Address,
    pub nonce: String,
    pub deadline: String,
    pub witness: WitnessData,
}

/// Wire payload carried in the `X-Payment` header, base64-encoded JSON.
///
/// `settlement_amount` is absent on the wire; the resource middleware writes
/// it after metering, before asking the facilitator to settle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UptoPayload {
    /// 0x-prefixed 65-byte EIP-712 signature.
    pub signature: String,
    pub permit2_authorization: Permit2Authorization,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_amount: Option<String>,
}

/// The 402 response body returned by the resource server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredBody {
    pub error: String,
    pub accepts: Vec<PaymentRequirements>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

pub(crate) fn parse_amount(field: &str, value: &str) -> Result<U256, UptoError> {
    value
        .parse::<U256>()
        .map_err(|e| UptoError::InvalidPayment(format!("invalid {field} '{value}': {e}")))
}

impl Permit2Authorization {
    /// Reconstruct the EIP-712 message this authorization was signed over.
    pub fn typed_message(&self) -> Result<PermitWitnessTransferFrom, UptoError> {
        Ok(PermitWitnessTransferFrom {
            permitted: TokenPermissions {
                token: self.permitted.token,
                amount: self.permitted_amount()?,
            },
            spender: self.spender,
            nonce: parse_amount("nonce", &self.nonce)?,
            deadline: parse_amount("deadline", &self.deadline)?,
            witness: x402Witness {
                to: self.witness.to,
                validAfter: parse_amount("validAfter", &self.witness.valid_after)?,
                extra: self.witness.extra.clone(),
            },
        })
    }

    /// The permit tuple the upto proxy takes at settlement time.
    pub fn settlement_permit(&self) -> Result<PermitTransferFrom, UptoError> {
        Ok(PermitTransferFrom {
            permitted: TokenPermissions {
                token: self.permitted.token,
                amount: self.permitted_amount()?,
            },
            nonce: parse_amount("nonce", &self.nonce)?,
            deadline: parse_amount("deadline", &self.deadline)?,
        })
    }

    /// The authorized ceiling in smallest token units.
    pub fn permitted_amount(&self) -> Result<U256, UptoError> {
        parse_amount("amount", &self.permitted.amount)
    }
}

/// Base64-encode a payload for the `X-Payment` header.
pub fn encode_payment(payload: &UptoPayload) -> Result<String, UptoError> {
    let json = serde_json::to_vec(payload)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(json))
}

/// Decode a payload from the `X-Payment` header.
pub fn decode_payment(encoded: &str) -> Result<UptoPayload, UptoError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| UptoError::InvalidPayment(format!("invalid base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| UptoError::InvalidPayment(format!("invalid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::UPTO_PROXY_ADDRESS;

    fn sample_payload() -> UptoPayload {
        UptoPayload {
            signature: "0xdead".to_string(),
            permit2_authorization: Permit2Authorization {
                from: Address::ZERO,
                permitted: TokenPermissionsData {
                    token: Address::ZERO,
                    amount: "1000000".to_string(),
                },
                spender: UPTO_PROXY_ADDRESS,
                nonce: "12345".to_string(),
                deadline: "1893456000".to_string(),
                witness: WitnessData {
                    to: Address::ZERO,
                    valid_after: "0".to_string(),
                    extra: Bytes::new(),
                },
            },
            settlement_amount: None,
        }
    }

    #[test]
    fn test_encode_payment_roundtrip() {
        let payload = sample_payload();
        let encoded = encode_payment(&payload).unwrap();
        let decoded = decode_payment(&encoded).unwrap();

        assert_eq!(decoded.signature, payload.signature);
        assert_eq!(
            decoded.permit2_authorization.permitted.amount,
            payload.permit2_authorization.permitted.amount
        );
        assert!(decoded.settlement_amount.is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_payment("!!!not-base64!!!").is_err());
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"this is not json");
        assert!(decode_payment(&encoded).is_err());
    }

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let json = serde_json::to_value(sample_payload()).unwrap();
        assert!(json.get("permit2Authorization").is_some());
        let auth = &json["permit2Authorization"];
        assert!(auth.get("witness").is_some());
        assert!(auth["witness"].get("validAfter").is_some());
        // absent on the wire until metering writes it
        assert!(json.get("settlementAmount").is_none());
    }

    #[test]
    fn test_typed_message_rejects_non_decimal_amounts() {
        let mut payload = sample_payload();
        payload.permit2_authorization.permitted.amount = "-1".to_string();
        assert!(payload.permit2_authorization.typed_message().is_err());

        payload.permit2_authorization.permitted.amount = "1.5".to_string();
        assert!(payload.permit2_authorization.typed_message().is_err());
    }

    #[test]
    fn test_requirements_wire_shape() {
        let requirements = PaymentRequirements {
            scheme: "upto".to_string(),
            network: "eip155:84532".to_string(),
            asset: Address::ZERO,
            max_amount: "1000000".to_string(),
            pay_to: Address::ZERO,
            max_timeout_seconds: 300,
            description: None,
            mime_type: None,
        };
        let json = serde_json::to_value(&requirements).unwrap();
        assert_eq!(json["maxAmount"], "1000000");
        assert_eq!(json["maxTimeoutSeconds"], 300);
        assert!(json.get("payTo").is_some());
        assert!(json.get("description").is_none());
    }
}
