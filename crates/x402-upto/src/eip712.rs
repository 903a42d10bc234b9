//! EIP-712 typed-data hashing, signature recovery, and nonce generation for
//! Permit2 witness transfers.

use alloy::primitives::{Address, Signature, B256, U256};
use alloy::sol_types::{Eip712Domain, SolStruct};

use crate::constants::PERMIT2_ADDRESS;
use crate::error::UptoError;
use crate::PermitWitnessTransferFrom;

/// Build the Permit2 EIP-712 domain for a chain. Permit2's domain carries
/// no version field.
pub fn permit2_domain(chain_id: u64) -> Eip712Domain {
    Eip712Domain {
        name: Some(std::borrow::Cow::Borrowed("Permit2")),
        version: None,
        chain_id: Some(U256::from(chain_id)),
        verifying_contract: Some(PERMIT2_ADDRESS),
        salt: None,
    }
}

/// Compute the EIP-712 signing hash of a witness transfer message.
pub fn signing_hash(message: &PermitWitnessTransferFrom, chain_id: u64) -> B256 {
    message.eip712_signing_hash(&permit2_domain(chain_id))
}

/// secp256k1 curve order N / 2 — signatures with s > this are malleable (EIP-2).
const SECP256K1_N_DIV_2: U256 = U256::from_limbs([
    0xBFD25E8CD0364140,
    0xBAAEDCE6AF48A03B,
    0xFFFFFFFFFFFFFFFE,
    0x7FFFFFFFFFFFFFFF,
]);

/// Recover the signer of a witness transfer message.
/// Rejects malformed and high-s signatures before attempting recovery.
pub fn recover_signer(
    message: &PermitWitnessTransferFrom,
    chain_id: u64,
    signature_bytes: &[u8],
) -> Result<Address, UptoError> {
    if signature_bytes.len() != 65 {
        return Err(UptoError::SignatureError(format!(
            "signature must be 65 bytes, got {}",
            signature_bytes.len()
        )));
    }

    let sig = Signature::from_raw(signature_bytes)
        .map_err(|e| UptoError::SignatureError(format!("invalid signature: {e}")))?;

    if sig.s() > SECP256K1_N_DIV_2 {
        return Err(UptoError::SignatureError(
            "high-s signature rejected (EIP-2 malleability)".to_string(),
        ));
    }

    let hash = signing_hash(message, chain_id);
    sig.recover_address_from_prehash(&hash)
        .map_err(|e| UptoError::SignatureError(format!("recovery failed: {e}")))
}

/// Generate a random 48-bit nonce. Uniqueness is enforced on-chain by
/// Permit2 nonce invalidation, so non-cryptographic collision odds suffice.
pub fn random_nonce() -> u64 {
    rand::random::<u64>() >> 16
}

/// Encode a signature to a 0x-prefixed hex string (65 bytes -> 0x + 130 hex).
pub fn encode_signature_hex(sig: &Signature) -> String {
    format!("0x{}", alloy::hex::encode(sig.as_bytes()))
}

/// Decode a 0x-prefixed (or bare) hex signature string.
pub fn decode_signature_hex(signature: &str) -> Result<Vec<u8>, UptoError> {
    alloy::hex::decode(signature.strip_prefix("0x").unwrap_or(signature))
        .map_err(|e| UptoError::SignatureError(format!("invalid hex signature: {e}")))
}
