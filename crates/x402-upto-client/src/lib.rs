//! Client SDK for paid API requests under the upto scheme.
//!
//! Handles the HTTP 402 flow automatically: request -> 402 -> sign ceiling
//! authorization -> retry with `X-Payment`. The signed amount is a ceiling;
//! the server settles only what the request actually consumed, and the
//! settlement summary comes back in the `X-Payment-Response` header.
//!
//! # Quick example
//!
//! ```no_run
//! use alloy::signers::local::PrivateKeySigner;
//! use x402_client::{UptoSchemeClient, X402Client};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let signer: PrivateKeySigner = "0xYOUR_KEY".parse().unwrap();
//! let client = X402Client::new(UptoSchemeClient::new(signer));
//!
//! let (resp, settlement) = client
//!     .fetch("https://api.example.com/report", reqwest::Method::GET)
//!     .await
//!     .unwrap();
//!
//! if let Some(s) = settlement {
//!     println!("authorized {} — settled {}", s.authorized_amount, s.settled_amount);
//! }
//! # }
//! ```

mod http_client;
mod scheme_client;

pub use http_client::{
    decode_settlement_header, X402Client, PAYMENT_RESPONSE_HEADER, PAYMENT_SETTLED_HEADER,
    PAYMENT_TX_HASH_HEADER,
};
pub use scheme_client::UptoSchemeClient;

// Re-export commonly needed types from core
pub use x402::{
    PaymentRequiredBody, PaymentRequirements, SchemeClient, SettlementInfo, UptoError, UptoPayload,
    SCHEME_NAME,
};
