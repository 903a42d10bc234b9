//! One-time ERC-20 approval of Permit2.
//!
//! Payers approve Permit2 once per token; every later payment is
//! signature-only. The approval is for 2^160 - 1, the maximum amount
//! Permit2 itself can track.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;

use crate::constants::PERMIT2_ADDRESS;
use crate::IERC20;

/// The maximum allowance Permit2 can represent (uint160).
pub fn max_permit2_allowance() -> U256 {
    (U256::from(1u8) << 160) - U256::from(1u8)
}

/// Build the `approve(Permit2, 2^160 - 1)` transaction for a token:
/// returns the `to` address and ABI-encoded calldata (selector `0x095ea7b3`).
pub fn approval_call(token: Address) -> (Address, Bytes) {
    let call = IERC20::approveCall {
        spender: PERMIT2_ADDRESS,
        value: max_permit2_allowance(),
    };
    (token, Bytes::from(call.abi_encode()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BASE_SEPOLIA_USDC;

    #[test]
    fn test_approval_selector() {
        let (to, data) = approval_call(BASE_SEPOLIA_USDC);
        assert_eq!(to, BASE_SEPOLIA_USDC);
        assert_eq!(&data[..4], &[0x09, 0x5e, 0xa7, 0xb3]);
    }

    #[test]
    fn test_approval_encodes_permit2_and_max_amount() {
        let (_, data) = approval_call(BASE_SEPOLIA_USDC);
        let decoded = IERC20::approveCall::abi_decode(&data).unwrap();
        assert_eq!(decoded.spender, PERMIT2_ADDRESS);
        assert_eq!(decoded.value, max_permit2_allowance());
    }

    #[test]
    fn test_max_allowance_is_uint160_max() {
        let max = max_permit2_allowance();
        assert_eq!(max, U256::from_str_radix("f".repeat(40).as_str(), 16).unwrap());
    }
}
