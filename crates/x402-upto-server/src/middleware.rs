//! The payment gate sequencer.
//!
//! Per gated request: verify strictly before the handler, meter strictly
//! after it, settle strictly after metering. The client's response is never
//! held hostage to settlement: once the handler has produced a body, a
//! failed settlement is logged and the response goes out unchanged, minus
//! the settlement headers. Verify and settle are each attempted exactly
//! once; the on-chain nonce makes client retries safe.

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse};
use alloy::primitives::{Address, U256};
use base64::Engine;
use serde_json::json;
use std::sync::Arc;

use x402::{
    decode_payment, reasons, PaymentRequiredBody, PaymentRequirements, SettleResponse,
    SettlementInfo, UptoPayload, VerifyResponse,
};

use crate::config::PaymentConfig;
use crate::meter::{Meter, MeterContext};
use crate::metrics::{PAYMENT_ATTEMPTS, REQUESTS, SETTLEMENTS};

/// Count a request against the matched route pattern (not the raw path, to
/// avoid label-cardinality bombs).
fn count_request(req: &HttpRequest, status: StatusCode) {
    let endpoint = req.match_pattern().unwrap_or_else(|| "unknown".to_string());
    REQUESTS
        .with_label_values(&[endpoint.as_str(), status.as_str()])
        .inc();
}

/// Payment header; `Payment-Signature` is accepted as an input alias.
pub const PAYMENT_HEADER: &str = "X-Payment";
pub const PAYMENT_HEADER_ALIAS: &str = "Payment-Signature";

/// Response headers emitted after a successful settlement.
pub const PAYMENT_RESPONSE_HEADER: &str = "X-Payment-Response";
pub const PAYMENT_SETTLED_HEADER: &str = "X-Payment-Settled";
pub const PAYMENT_TX_HASH_HEADER: &str = "X-Payment-TxHash";

/// A verified payment waiting for the handler to run, so it can be metered
/// and settled.
pub struct VerifiedPayment {
    pub payload: UptoPayload,
    pub requirements: PaymentRequirements,
    pub authorized_amount: U256,
    pub payer: Option<Address>,
    pub meter: Arc<dyn Meter>,
}

/// Build the 402 challenge body for a route.
pub fn payment_required_body(requirements: &PaymentRequirements) -> PaymentRequiredBody {
    PaymentRequiredBody {
        error: "Payment Required".to_string(),
        accepts: vec![requirements.clone()],
        description: requirements.description.clone(),
        mime_type: requirements.mime_type.clone(),
    }
}

/// Extract the payment header, accepting the legacy alias.
pub fn payment_header(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(PAYMENT_HEADER)
        .or_else(|| req.headers().get(PAYMENT_HEADER_ALIAS))
        .and_then(|v| v.to_str().ok())
}

async fn post_facilitator<T: serde::de::DeserializeOwned>(
    http: &reqwest::Client,
    facilitator_url: &str,
    endpoint: &str,
    payload: &UptoPayload,
    requirements: &PaymentRequirements,
) -> Result<T, String> {
    let url = format!("{facilitator_url}{endpoint}");
    let resp = http
        .post(&url)
        .timeout(std::time::Duration::from_secs(30))
        .json(&json!({
            "payload": payload,
            "requirements": requirements,
        }))
        .send()
        .await
        .map_err(|e| format!("facilitator request failed: {e}"))?;

    resp.json::<T>()
        .await
        .map_err(|e| format!("facilitator response parse failed: {e}"))
}

/// Gate phase: runs before the handler.
///
/// Returns `Ok(None)` when the route is not gated (pass through unchanged),
/// `Ok(Some(_))` when payment verified, and `Err(response)` with the
/// ready-made refusal otherwise: 402 missing/invalid payment, 400 malformed
/// header, 412 when the payer must first approve Permit2, 503 when the
/// facilitator is unreachable.
pub async fn verify_payment(
    req: &HttpRequest,
    config: &PaymentConfig,
    http: &reqwest::Client,
) -> Result<Option<VerifiedPayment>, HttpResponse> {
    let route = match config.get_route(req.method().as_str(), req.path()) {
        Some(r) => r,
        None => return Ok(None),
    };
    let requirements = &route.requirements;

    let header = match payment_header(req) {
        Some(h) => h,
        None => {
            PAYMENT_ATTEMPTS.with_label_values(&["missing"]).inc();
            count_request(req, StatusCode::PAYMENT_REQUIRED);
            return Err(
                HttpResponse::PaymentRequired().json(payment_required_body(requirements))
            );
        }
    };

    let payload = match decode_payment(header) {
        Ok(p) => p,
        Err(e) => {
            PAYMENT_ATTEMPTS.with_label_values(&["malformed"]).inc();
            count_request(req, StatusCode::BAD_REQUEST);
            tracing::warn!(error = %e, "invalid payment header");
            return Err(HttpResponse::BadRequest().json(json!({
                "error": "Invalid payment payload"
            })));
        }
    };

    let verify: VerifyResponse =
        match post_facilitator(http, &config.facilitator_url, "/verify", &payload, requirements)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                PAYMENT_ATTEMPTS.with_label_values(&["error"]).inc();
                count_request(req, StatusCode::SERVICE_UNAVAILABLE);
                tracing::error!(error = %e, "facilitator verify unreachable");
                return Err(HttpResponse::ServiceUnavailable().json(json!({
                    "error": "Facilitator unavailable"
                })));
            }
        };

    if !verify.is_valid {
        PAYMENT_ATTEMPTS.with_label_values(&["rejected"]).inc();
        let reason = verify
            .invalid_reason
            .unwrap_or_else(|| "verification failed".to_string());
        tracing::info!(reason = %reason, "payment verification failed");

        // A missing Permit2 approval is client configuration the payer can
        // fix without a fresh challenge, hence 412 rather than 402.
        let status = if reason == reasons::PERMIT2_ALLOWANCE_REQUIRED {
            StatusCode::PRECONDITION_FAILED
        } else {
            StatusCode::PAYMENT_REQUIRED
        };
        count_request(req, status);
        return Err(HttpResponse::build(status).json(json!({
            "error": "Payment verification failed",
            "reason": reason,
            "accepts": [requirements],
        })));
    }

    PAYMENT_ATTEMPTS.with_label_values(&["verified"]).inc();

    let authorized_amount = match requirements.max_amount.parse::<U256>() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!(error = %e, "route maxAmount unparseable");
            return Err(HttpResponse::InternalServerError().json(json!({
                "error": "internal error"
            })));
        }
    };

    Ok(Some(VerifiedPayment {
        payload,
        requirements: requirements.clone(),
        authorized_amount,
        payer: verify.payer,
        meter: Arc::clone(&route.meter),
    }))
}

/// Settlement phase: runs after the handler produced `body`.
///
/// Meters consumption, writes the settlement amount into the payload, asks
/// the facilitator to settle, and attaches the settlement headers on
/// success. The handler's status and body are returned as-is regardless of
/// settlement outcome.
pub async fn respond_paid(
    req: &HttpRequest,
    config: &PaymentConfig,
    http: &reqwest::Client,
    verified: VerifiedPayment,
    status: StatusCode,
    content_type: &str,
    body: Vec<u8>,
) -> HttpResponse {
    let VerifiedPayment {
        mut payload,
        requirements,
        authorized_amount,
        payer,
        meter,
    } = verified;

    let ctx = MeterContext {
        method: req.method().as_str(),
        path: req.path(),
        response_body: &body,
        authorized_amount,
        payer,
    };
    let metered = match meter.meter(&ctx) {
        Ok(amount) => amount,
        Err(e) => {
            // A broken meter must not lose revenue: fall back to the ceiling
            // the payer already signed.
            tracing::error!(error = %e, "meter failed; settling full authorization");
            authorized_amount
        }
    };

    payload.settlement_amount = Some(metered.to_string());

    let settle: Result<SettleResponse, String> = post_facilitator(
        http,
        &config.facilitator_url,
        "/settle",
        &payload,
        &requirements,
    )
    .await;

    count_request(req, status);
    let mut response = HttpResponse::build(status);
    response.content_type(content_type);

    match settle {
        Ok(s) if s.success => {
            SETTLEMENTS.with_label_values(&["success"]).inc();
            let info = SettlementInfo {
                success: true,
                tx_hash: s.tx_hash.unwrap_or_default(),
                settled_amount: s.settled_amount.unwrap_or_else(|| metered.to_string()),
                authorized_amount: authorized_amount.to_string(),
            };
            tracing::info!(
                payer = ?payer,
                settled = %info.settled_amount,
                authorized = %info.authorized_amount,
                tx = %info.tx_hash,
                "payment settled"
            );

            let encoded = base64::engine::general_purpose::STANDARD
                .encode(serde_json::to_vec(&info).unwrap_or_default());
            response.insert_header((PAYMENT_RESPONSE_HEADER, encoded));
            response.insert_header((PAYMENT_SETTLED_HEADER, info.settled_amount.clone()));
            response.insert_header((PAYMENT_TX_HASH_HEADER, info.tx_hash.clone()));
        }
        Ok(s) => {
            SETTLEMENTS.with_label_values(&["failed"]).inc();
            tracing::error!(
                payer = ?payer,
                reason = s.error.as_deref().unwrap_or("unknown"),
                "settlement failed; response returned without settlement headers"
            );
        }
        Err(e) => {
            SETTLEMENTS.with_label_values(&["error"]).inc();
            tracing::error!(payer = ?payer, error = %e, "settle call failed");
        }
    }

    response.body(body)
}
