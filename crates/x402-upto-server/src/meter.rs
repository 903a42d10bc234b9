//! Consumption metering.
//!
//! A [`Meter`] inspects the completed request/response pair and reports how
//! much was actually consumed, in smallest token units. The middleware
//! writes the result into the payload's settlement amount before asking the
//! facilitator to settle. Meters read the response body non-destructively;
//! the body still goes to the client unchanged.

use alloy::primitives::{Address, U256};

use x402::UptoError;

/// What a meter gets to look at after the handler ran.
pub struct MeterContext<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub response_body: &'a [u8],
    /// The ceiling the payer signed.
    pub authorized_amount: U256,
    pub payer: Option<Address>,
}

/// Computes the consumed amount for a completed request.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait Meter: Send + Sync {
    fn meter(&self, ctx: &MeterContext<'_>) -> Result<U256, UptoError>;
}

/// Charges the full authorized amount: flat-price routes.
pub struct FullAmountMeter;

impl Meter for FullAmountMeter {
    fn meter(&self, ctx: &MeterContext<'_>) -> Result<U256, UptoError> {
        Ok(ctx.authorized_amount)
    }
}

/// Charges per whitespace-separated token of the response body, clamped to
/// the authorized ceiling.
pub struct TextTokenMeter {
    pub price_per_token: U256,
}

impl TextTokenMeter {
    pub fn new(price_per_token: U256) -> Self {
        Self { price_per_token }
    }
}

impl Meter for TextTokenMeter {
    fn meter(&self, ctx: &MeterContext<'_>) -> Result<U256, UptoError> {
        let text = String::from_utf8_lossy(ctx.response_body);
        let tokens = text.split_whitespace().count();
        let cost = self
            .price_per_token
            .checked_mul(U256::from(tokens))
            .ok_or_else(|| UptoError::InvalidPayment("metered cost overflow".to_string()))?;
        Ok(cost.min(ctx.authorized_amount))
    }
}
