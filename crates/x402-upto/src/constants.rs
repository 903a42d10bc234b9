use alloy::primitives::{address, Address};

use crate::error::UptoError;

/// x402 scheme name for ceiling-authorized, metered payments.
pub const SCHEME_NAME: &str = "upto";

/// Canonical Permit2 deployment (same address on every EVM chain).
pub const PERMIT2_ADDRESS: Address = address!("000000000022D473030F116dDEE9F6B43aC78BA3");

/// The upto proxy contract: wraps Permit2 and accepts a settlement amount
/// at most equal to the signed ceiling.
pub const UPTO_PROXY_ADDRESS: Address = address!("4020633461b2895a48930Ff97eE8fCdE8E520002");

/// CAIP-2 identifier for Base mainnet.
pub const BASE_NETWORK: &str = "eip155:8453";

/// CAIP-2 identifier for Base Sepolia.
pub const BASE_SEPOLIA_NETWORK: &str = "eip155:84532";

/// USDC on Base mainnet.
pub const BASE_USDC: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// USDC on Base Sepolia.
pub const BASE_SEPOLIA_USDC: Address = address!("036CbD53842c5426634e7929541eC2318f3dCF7e");

/// USDC has 6 decimal places on both supported networks.
pub const USDC_DECIMALS: u32 = 6;

/// Default network for facilitator and demo deployments.
pub const DEFAULT_NETWORK: &str = BASE_SEPOLIA_NETWORK;

/// Default RPC endpoint (Base Sepolia public RPC).
pub const DEFAULT_RPC_URL: &str = "https://sepolia.base.org";

/// Default facilitator listen port.
pub const DEFAULT_FACILITATOR_PORT: u16 = 4402;

/// Default upper bound a client may use for the authorization deadline.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

/// Look up the default settlement asset (USDC) for a supported network.
pub fn usdc_for_network(network: &str) -> Option<Address> {
    match network {
        BASE_NETWORK => Some(BASE_USDC),
        BASE_SEPOLIA_NETWORK => Some(BASE_SEPOLIA_USDC),
        _ => None,
    }
}

/// Parse the numeric chain id out of a CAIP-2 `eip155:<chainId>` identifier.
pub fn chain_id_from_network(network: &str) -> Result<u64, UptoError> {
    let (namespace, reference) = network
        .split_once(':')
        .ok_or_else(|| UptoError::UnsupportedNetwork(network.to_string()))?;
    if namespace != "eip155" {
        return Err(UptoError::UnsupportedNetwork(network.to_string()));
    }
    reference
        .parse::<u64>()
        .map_err(|_| UptoError::UnsupportedNetwork(network.to_string()))
}
