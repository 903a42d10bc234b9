//! Facilitator-side scheme implementation: verifies ceiling authorizations
//! and settles the metered amount through the upto proxy.

use alloy::primitives::{Bytes, U256};

use crate::chain::FacilitatorChain;
use crate::constants::{chain_id_from_network, PERMIT2_ADDRESS, UPTO_PROXY_ADDRESS};
use crate::eip712::{decode_signature_hex, recover_signer};
use crate::error::UptoError;
use crate::payment::{parse_amount, PaymentRequirements, UptoPayload};
use crate::response::{reasons, SettleResponse, VerifyResponse};
use crate::scheme::SchemeFacilitator;

/// Verifies and settles upto payments over an injected chain capability.
pub struct UptoFacilitator<C> {
    chain: C,
}

impl<C> UptoFacilitator<C> {
    pub fn new(chain: C) -> Self {
        Self { chain }
    }

    /// Access the underlying chain capability.
    pub fn chain(&self) -> &C {
        &self.chain
    }
}

fn unix_now() -> Result<u64, UptoError> {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| UptoError::ConfigError(format!("system time error: {e}")))
}

impl<C> SchemeFacilitator for UptoFacilitator<C>
where
    C: FacilitatorChain,
{
    /// Total-validity predicate over (payload, requirements, chain state).
    /// Checks are ordered so that cheap local checks run before RPC reads;
    /// the first failure wins.
    async fn verify(
        &self,
        payload: &UptoPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, UptoError> {
        let auth = &payload.permit2_authorization;

        // 1. Spender is pinned to the upto proxy.
        if auth.spender != UPTO_PROXY_ADDRESS {
            return Ok(VerifyResponse::invalid(reasons::INVALID_SPENDER));
        }

        // 2. The witness binds the recipient the server advertised.
        if auth.witness.to != requirements.pay_to {
            return Ok(VerifyResponse::invalid(reasons::INVALID_RECIPIENT));
        }

        // 3/4. Time bounds. A deadline equal to now is already expired;
        // validAfter equal to now is usable.
        let now = U256::from(unix_now()?);
        let deadline = parse_amount("deadline", &auth.deadline)?;
        if deadline <= now {
            return Ok(VerifyResponse::invalid(reasons::PERMIT2_DEADLINE_EXPIRED));
        }
        let valid_after = parse_amount("validAfter", &auth.witness.valid_after)?;
        if valid_after > now {
            return Ok(VerifyResponse::invalid(reasons::PERMIT2_NOT_YET_VALID));
        }

        // 5. The signed ceiling must cover the advertised maximum.
        let permitted = auth.permitted_amount()?;
        let max_amount = parse_amount("maxAmount", &requirements.max_amount)?;
        if permitted < max_amount {
            return Ok(VerifyResponse::invalid(
                reasons::INSUFFICIENT_AUTHORIZED_AMOUNT,
            ));
        }

        // 6. The EIP-712 signature must recover to the claimed payer.
        let chain_id = chain_id_from_network(&requirements.network)?;
        let message = auth.typed_message()?;
        let sig_bytes = match decode_signature_hex(&payload.signature) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(payer = %auth.from, error = %e, "unparseable payment signature");
                return Ok(VerifyResponse::invalid(
                    reasons::SIGNATURE_VERIFICATION_FAILED,
                ));
            }
        };
        match recover_signer(&message, chain_id, &sig_bytes) {
            Ok(recovered) if recovered == auth.from => {}
            Ok(_) => {
                return Ok(VerifyResponse::invalid(reasons::INVALID_PERMIT2_SIGNATURE));
            }
            Err(e) => {
                tracing::warn!(payer = %auth.from, error = %e, "signature recovery failed");
                return Ok(VerifyResponse::invalid(
                    reasons::SIGNATURE_VERIFICATION_FAILED,
                ));
            }
        }

        // 7. The payer must have approved Permit2 for at least the ceiling.
        match self
            .chain
            .allowance(auth.permitted.token, auth.from, PERMIT2_ADDRESS)
            .await
        {
            Ok(allowance) if allowance >= permitted => {}
            Ok(allowance) => {
                tracing::info!(
                    payer = %auth.from,
                    allowance = %allowance,
                    required = %permitted,
                    "payment rejected: Permit2 allowance required"
                );
                return Ok(VerifyResponse::invalid(reasons::PERMIT2_ALLOWANCE_REQUIRED));
            }
            Err(e) => {
                tracing::warn!(payer = %auth.from, error = %e, "allowance read failed");
                return Ok(VerifyResponse::invalid(reasons::ALLOWANCE_CHECK_FAILED));
            }
        }

        // 8. The payer must hold at least the ceiling.
        match self.chain.balance_of(auth.permitted.token, auth.from).await {
            Ok(balance) if balance >= permitted => {}
            Ok(balance) => {
                tracing::info!(
                    payer = %auth.from,
                    balance = %balance,
                    required = %permitted,
                    "payment rejected: insufficient balance"
                );
                return Ok(VerifyResponse::invalid(reasons::INSUFFICIENT_BALANCE));
            }
            Err(e) => {
                tracing::warn!(payer = %auth.from, error = %e, "balance read failed");
                return Ok(VerifyResponse::invalid(reasons::BALANCE_CHECK_FAILED));
            }
        }

        tracing::info!(
            payer = %auth.from,
            authorized = %permitted,
            nonce = %auth.nonce,
            "payment verification succeeded"
        );

        Ok(VerifyResponse::valid(auth.from))
    }

    async fn settle(
        &self,
        payload: &UptoPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, UptoError> {
        let auth = &payload.permit2_authorization;
        let permitted = auth.permitted_amount()?;

        // Unmetered payloads settle the full ceiling.
        let amount = match &payload.settlement_amount {
            Some(metered) => parse_amount("settlementAmount", metered)?,
            None => permitted,
        };

        // Settling beyond the signed ceiling is a caller bug; catch it
        // before any chain traffic.
        if amount > permitted {
            tracing::error!(
                payer = %auth.from,
                amount = %amount,
                authorized = %permitted,
                "settlement amount exceeds authorization"
            );
            return Ok(SettleResponse::failed(
                reasons::SETTLEMENT_EXCEEDS_AUTHORIZATION,
            ));
        }

        // Zero-cost requests produce no transaction at all.
        if amount.is_zero() {
            tracing::info!(payer = %auth.from, nonce = %auth.nonce, "zero settlement elided");
            return Ok(SettleResponse {
                success: true,
                tx_hash: None,
                settled_amount: Some("0".to_string()),
                error: None,
            });
        }

        // Re-verify: balance or allowance may have moved since the resource
        // server's verify call.
        let check = self.verify(payload, requirements).await?;
        if !check.is_valid {
            let reason = check
                .invalid_reason
                .unwrap_or_else(|| "verification failed".to_string());
            tracing::warn!(
                payer = %auth.from,
                reason = %reason,
                "settlement rejected after re-verification"
            );
            return Ok(SettleResponse::failed(reason));
        }

        let permit = auth.settlement_permit()?;
        let witness = auth.typed_message()?.witness;
        let signature = Bytes::from(decode_signature_hex(&payload.signature)?);

        match self
            .chain
            .settle(permit, amount, auth.from, witness, signature)
            .await
        {
            Ok(receipt) if receipt.reverted => {
                tracing::error!(
                    payer = %auth.from,
                    tx = %receipt.tx_hash,
                    "settlement transaction reverted"
                );
                Ok(SettleResponse {
                    success: false,
                    tx_hash: Some(format!("{}", receipt.tx_hash)),
                    settled_amount: None,
                    error: Some(reasons::TRANSACTION_REVERTED.to_string()),
                })
            }
            Ok(receipt) => {
                tracing::info!(
                    payer = %auth.from,
                    settled = %amount,
                    authorized = %permitted,
                    tx = %receipt.tx_hash,
                    "payment settled"
                );
                Ok(SettleResponse {
                    success: true,
                    tx_hash: Some(format!("{}", receipt.tx_hash)),
                    settled_amount: Some(amount.to_string()),
                    error: None,
                })
            }
            Err(e) => {
                tracing::error!(payer = %auth.from, error = %e, "settlement write failed");
                Ok(SettleResponse::failed(e.to_string()))
            }
        }
    }
}
