//! Core trait definitions for the three-party payment model.
//!
//! - [`SchemeClient`] — client-side: creates signed ceiling authorizations
//! - [`SchemeFacilitator`] — facilitator-side: verifies and settles payments
//!
//! See [`crate::scheme_facilitator::UptoFacilitator`] for the upto
//! facilitator implementation; the client half lives in the
//! `x402-upto-client` crate.

use crate::error::UptoError;
use crate::payment::{PaymentRequirements, UptoPayload};
use crate::response::{SettleResponse, VerifyResponse};

/// Client-side scheme: creates signed payment payloads.
pub trait SchemeClient: Send + Sync {
    /// Create a signed ceiling authorization for the given requirements.
    /// The returned payload has no settlement amount; the resource server
    /// writes it after metering.
    fn create_payment_payload(
        &self,
        requirements: &PaymentRequirements,
    ) -> impl std::future::Future<Output = Result<UptoPayload, UptoError>> + Send;
}

/// Facilitator-side scheme: verifies and settles payments.
pub trait SchemeFacilitator: Send + Sync {
    /// Verify a payment payload against the requirements. Stateless apart
    /// from on-chain reads; recording is the caller's concern.
    fn verify(
        &self,
        payload: &UptoPayload,
        requirements: &PaymentRequirements,
    ) -> impl std::future::Future<Output = Result<VerifyResponse, UptoError>> + Send;

    /// Settle the metered amount on-chain (re-verifies first, then calls the
    /// upto proxy). Never settles more than the signed ceiling.
    fn settle(
        &self,
        payload: &UptoPayload,
        requirements: &PaymentRequirements,
    ) -> impl std::future::Future<Output = Result<SettleResponse, UptoError>> + Send;
}
