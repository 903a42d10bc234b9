//! Chain I/O capabilities used by the facilitator.
//!
//! The verifier and settler never talk to an RPC endpoint directly; they go
//! through [`FacilitatorChain`]. Production wires [`RpcChain`] over an alloy
//! provider; tests substitute in-memory implementations.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::Provider;

use crate::error::UptoError;
use crate::{IERC20, IUptoProxy, PermitTransferFrom, x402Witness};

/// Outcome of a mined settlement transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleReceipt {
    pub tx_hash: TxHash,
    pub reverted: bool,
}

/// Facilitator-side chain capabilities: ERC-20 reads and the upto proxy
/// settlement write.
pub trait FacilitatorChain: Send + Sync {
    /// ERC-20 allowance `owner` has granted to `spender`.
    fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> impl std::future::Future<Output = Result<U256, UptoError>> + Send;

    /// ERC-20 balance of `owner`.
    fn balance_of(
        &self,
        token: Address,
        owner: Address,
    ) -> impl std::future::Future<Output = Result<U256, UptoError>> + Send;

    /// Call `settle(permit, amount, owner, witness, signature)` on the upto
    /// proxy and wait for the receipt.
    fn settle(
        &self,
        permit: PermitTransferFrom,
        amount: U256,
        owner: Address,
        witness: x402Witness,
        signature: Bytes,
    ) -> impl std::future::Future<Output = Result<SettleReceipt, UptoError>> + Send;
}

/// [`FacilitatorChain`] backed by an alloy RPC provider.
pub struct RpcChain<P> {
    provider: P,
    proxy: Address,
}

impl<P> RpcChain<P> {
    pub fn new(provider: P, proxy: Address) -> Self {
        Self { provider, proxy }
    }
}

impl<P: Provider> RpcChain<P> {
    /// Check RPC connectivity by fetching the latest block number.
    pub async fn latest_block(&self) -> Result<u64, UptoError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| UptoError::ChainError(format!("health check failed: {e}")))
    }
}

const SEND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
const RECEIPT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

impl<P> FacilitatorChain for RpcChain<P>
where
    P: Provider + Send + Sync,
{
    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, UptoError> {
        let contract = IERC20::new(token, &self.provider);
        contract
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| UptoError::ChainError(format!("allowance failed: {e}")))
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, UptoError> {
        let contract = IERC20::new(token, &self.provider);
        contract
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| UptoError::ChainError(format!("balanceOf failed: {e}")))
    }

    async fn settle(
        &self,
        permit: PermitTransferFrom,
        amount: U256,
        owner: Address,
        witness: x402Witness,
        signature: Bytes,
    ) -> Result<SettleReceipt, UptoError> {
        let contract = IUptoProxy::new(self.proxy, &self.provider);

        // Bounded send and receipt waits: a hung RPC must not pin the
        // settlement task indefinitely.
        let pending = tokio::time::timeout(
            SEND_TIMEOUT,
            contract
                .settle(permit, amount, owner, witness, signature)
                .send(),
        )
        .await
        .map_err(|_| UptoError::ChainError("settle send timed out after 30s".to_string()))?
        .map_err(|e| UptoError::ChainError(format!("settle send failed: {e}")))?;

        let receipt = tokio::time::timeout(RECEIPT_TIMEOUT, pending.get_receipt())
            .await
            .map_err(|_| UptoError::ChainError("settle receipt timed out after 60s".to_string()))?
            .map_err(|e| UptoError::ChainError(format!("settle receipt failed: {e}")))?;

        Ok(SettleReceipt {
            tx_hash: receipt.transaction_hash,
            reverted: !receipt.status(),
        })
    }
}
