//! The `upto` x402 payment scheme: pay-per-request over HTTP 402 where the
//! payer signs a spending *ceiling* and only the metered consumption settles
//! on-chain.
//!
//! A payer signs a Permit2 `PermitWitnessTransferFrom` authorization for at
//! most `maxAmount` of a token. The resource server serves the request,
//! meters what was actually consumed, and the facilitator settles that
//! (smaller) amount through the upto proxy contract, which enforces
//! `settled <= authorized`.
//!
//! # Three-party model
//!
//! - **Client** ([`SchemeClient`]) — signs ceiling authorizations
//! - **Server** — gates endpoints, returns 402 with pricing, meters usage
//! - **Facilitator** ([`SchemeFacilitator`]) — verifies signatures and
//!   settles the metered amount on-chain
//!
//! The client and server halves live in the `x402-upto-client` and
//! `x402-upto-server` crates; this crate holds the shared types, the
//! verifier, and the settler.

// Core types and traits
pub mod approval;
pub mod constants;
pub mod error;
pub mod payment;
pub mod response;
pub mod scheme;
pub mod usd;

// Permit2 / chain implementation
pub mod chain;
pub mod eip712;
pub mod scheme_facilitator;

use alloy::sol;

// EIP-712 structs for the Permit2 witness transfer. The sol! macro derives
// SolStruct, which provides eip712_signing_hash(); the nested struct type
// strings hash exactly as the Permit2 contract expects.
sol! {
    #[derive(Debug)]
    struct TokenPermissions {
        address token;
        uint256 amount;
    }

    /// Witness bound into the signature: the recipient, the earliest-usable
    /// timestamp, and opaque extension bytes.
    #[allow(non_camel_case_types)]
    #[derive(Debug)]
    struct x402Witness {
        address to;
        uint256 validAfter;
        bytes extra;
    }

    #[derive(Debug)]
    struct PermitWitnessTransferFrom {
        TokenPermissions permitted;
        address spender;
        uint256 nonce;
        uint256 deadline;
        x402Witness witness;
    }

    /// The permit tuple passed to the upto proxy at settlement time.
    #[derive(Debug)]
    struct PermitTransferFrom {
        TokenPermissions permitted;
        uint256 nonce;
        uint256 deadline;
    }

    #[sol(rpc)]
    interface IUptoProxy {
        function settle(
            PermitTransferFrom calldata permit,
            uint256 amount,
            address owner,
            x402Witness calldata witness,
            bytes calldata signature
        ) external;
    }

    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 value) external returns (bool);
    }
}

// Re-exports
pub use constants::*;
pub use error::UptoError;
pub use payment::*;
pub use response::*;
pub use scheme::*;

pub use chain::{FacilitatorChain, RpcChain, SettleReceipt};
pub use scheme_facilitator::UptoFacilitator;
