use alloy::primitives::{Bytes, U256};
use alloy::signers::{Signer, SignerSync};

use x402::eip712::{encode_signature_hex, random_nonce, signing_hash};
use x402::{
    chain_id_from_network, Permit2Authorization, PaymentRequirements, PermitWitnessTransferFrom,
    SchemeClient, TokenPermissions, TokenPermissionsData, UptoError, UptoPayload, WitnessData,
    x402Witness, UPTO_PROXY_ADDRESS,
};

/// Clock skew allowance applied to `validAfter`.
const VALID_AFTER_SKEW_SECONDS: u64 = 60;

/// Client-side scheme implementation: signs Permit2 ceiling authorizations.
///
/// Generic over any signer exposing an address and synchronous typed-data
/// signing; production uses [`alloy::signers::local::PrivateKeySigner`].
pub struct UptoSchemeClient<S> {
    signer: S,
}

impl<S> UptoSchemeClient<S>
where
    S: Signer + SignerSync,
{
    pub fn new(signer: S) -> Self {
        Self { signer }
    }

    /// Address of the payer.
    pub fn address(&self) -> alloy::primitives::Address {
        self.signer.address()
    }
}

impl<S> SchemeClient for UptoSchemeClient<S>
where
    S: Signer + SignerSync + Send + Sync,
{
    async fn create_payment_payload(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<UptoPayload, UptoError> {
        let chain_id = chain_id_from_network(&requirements.network)?;

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| UptoError::ConfigError(format!("system time error: {e}")))?
            .as_secs();

        let deadline = now + requirements.max_timeout_seconds;
        let valid_after = now.saturating_sub(VALID_AFTER_SKEW_SECONDS);
        let nonce = random_nonce();

        let max_amount = requirements
            .max_amount
            .parse::<U256>()
            .map_err(|e| UptoError::InvalidPayment(format!("invalid maxAmount: {e}")))?;

        // Sign the ceiling; the settled amount is decided later by the
        // resource server's meter.
        let message = PermitWitnessTransferFrom {
            permitted: TokenPermissions {
                token: requirements.asset,
                amount: max_amount,
            },
            spender: UPTO_PROXY_ADDRESS,
            nonce: U256::from(nonce),
            deadline: U256::from(deadline),
            witness: x402Witness {
                to: requirements.pay_to,
                validAfter: U256::from(valid_after),
                extra: Bytes::new(),
            },
        };

        let hash = signing_hash(&message, chain_id);
        let sig = self
            .signer
            .sign_hash_sync(&hash)
            .map_err(|e| UptoError::SignatureError(format!("signing failed: {e}")))?;

        Ok(UptoPayload {
            signature: encode_signature_hex(&sig),
            permit2_authorization: Permit2Authorization {
                from: self.signer.address(),
                permitted: TokenPermissionsData {
                    token: requirements.asset,
                    amount: max_amount.to_string(),
                },
                spender: UPTO_PROXY_ADDRESS,
                nonce: nonce.to_string(),
                deadline: deadline.to_string(),
                witness: WitnessData {
                    to: requirements.pay_to,
                    valid_after: valid_after.to_string(),
                    extra: Bytes::new(),
                },
            },
            settlement_amount: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;
    use alloy::signers::local::PrivateKeySigner;
    use x402::{BASE_SEPOLIA_NETWORK, BASE_SEPOLIA_USDC, SCHEME_NAME};

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: SCHEME_NAME.to_string(),
            network: BASE_SEPOLIA_NETWORK.to_string(),
            asset: BASE_SEPOLIA_USDC,
            max_amount: "1000000".to_string(),
            pay_to: Address::with_last_byte(0x77),
            max_timeout_seconds: 300,
            description: None,
            mime_type: None,
        }
    }

    #[tokio::test]
    async fn test_create_payment_payload() {
        let signer = PrivateKeySigner::random();
        let client = UptoSchemeClient::new(signer.clone());

        let payload = client.create_payment_payload(&requirements()).await.unwrap();
        let auth = &payload.permit2_authorization;

        assert_eq!(auth.from, signer.address());
        assert_eq!(auth.spender, UPTO_PROXY_ADDRESS);
        assert_eq!(auth.permitted.amount, "1000000");
        assert_eq!(auth.witness.to, Address::with_last_byte(0x77));
        assert!(payload.settlement_amount.is_none());
        assert!(payload.signature.starts_with("0x"));
        assert_eq!(payload.signature.len(), 132); // 0x + 130 hex chars
    }

    #[tokio::test]
    async fn test_nonce_fits_48_bits() {
        let client = UptoSchemeClient::new(PrivateKeySigner::random());
        let payload = client.create_payment_payload(&requirements()).await.unwrap();
        let nonce: u64 = payload.permit2_authorization.nonce.parse().unwrap();
        assert!(nonce < (1u64 << 48));
    }

    #[tokio::test]
    async fn test_deadline_honors_max_timeout() {
        let client = UptoSchemeClient::new(PrivateKeySigner::random());
        let payload = client.create_payment_payload(&requirements()).await.unwrap();
        let auth = &payload.permit2_authorization;

        let deadline: u64 = auth.deadline.parse().unwrap();
        let valid_after: u64 = auth.witness.valid_after.parse().unwrap();
        assert!(deadline > valid_after);
        assert_eq!(deadline - valid_after, 300 + 60);
    }

    #[tokio::test]
    async fn test_rejects_non_evm_network() {
        let client = UptoSchemeClient::new(PrivateKeySigner::random());
        let mut reqs = requirements();
        reqs.network = "solana:mainnet".to_string();

        let err = client.create_payment_payload(&reqs).await.unwrap_err();
        assert!(matches!(err, UptoError::UnsupportedNetwork(_)));
    }
}
