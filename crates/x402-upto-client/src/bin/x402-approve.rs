//! One-time Permit2 approval for a payer wallet.
//!
//! Payments under the upto scheme are signature-only once the payer has
//! approved Permit2 on the token. This submits that approval.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;

use x402::approval::{approval_call, max_permit2_allowance};
use x402::{usdc_for_network, IERC20, DEFAULT_NETWORK, DEFAULT_RPC_URL, PERMIT2_ADDRESS};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let client_key =
        std::env::var("EVM_PRIVATE_KEY").expect("EVM_PRIVATE_KEY environment variable is required");
    let signer: PrivateKeySigner = client_key.parse().expect("invalid EVM_PRIVATE_KEY");
    let payer = signer.address();

    let network = std::env::var("NETWORK").unwrap_or_else(|_| DEFAULT_NETWORK.to_string());
    let token: Address = match std::env::var("TOKEN") {
        Ok(t) => t.parse().expect("invalid TOKEN address"),
        Err(_) => usdc_for_network(&network)
            .unwrap_or_else(|| panic!("no default token for network {network}; set TOKEN")),
    };
    let rpc_url = std::env::var("RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string());

    println!("Approving Permit2 for upto payments...");
    println!("  Payer:   {payer}");
    println!("  Token:   {token}");
    println!("  Spender: {PERMIT2_ADDRESS}");

    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_http(rpc_url.parse().expect("invalid RPC_URL"));

    let current = IERC20::new(token, &provider)
        .allowance(payer, PERMIT2_ADDRESS)
        .call()
        .await
        .expect("failed to read allowance");

    println!("\nCurrent allowance: {current}");
    if current >= max_permit2_allowance() {
        println!("Permit2 already has the maximum allowance — nothing to do.");
        return;
    }

    let (to, data) = approval_call(token);
    let tx = TransactionRequest::default().with_to(to).with_input(data);

    println!("Sending approval transaction...");
    let receipt = provider
        .send_transaction(tx)
        .await
        .expect("approval send failed")
        .get_receipt()
        .await
        .expect("approval receipt failed");

    if !receipt.status() {
        eprintln!("Approval transaction reverted: {}", receipt.transaction_hash);
        std::process::exit(1);
    }

    println!("  tx: {}", receipt.transaction_hash);
    println!("Approval confirmed.");
}
