use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;

use x402::{PaymentRequirements, SchemeFacilitator, UptoError, UptoPayload, SCHEME_NAME};

use crate::audit::NewPayment;
use crate::metrics;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PaymentRequest {
    pub payload: UptoPayload,
    pub requirements: PaymentRequirements,
}

fn bad_request() -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({
        "error": "invalid request body"
    }))
}

/// Client-caused errors surface as 400; everything else is a logged 500
/// with a generic reason.
fn error_response(e: &UptoError) -> HttpResponse {
    match e {
        UptoError::InvalidPayment(_) | UptoError::UnsupportedNetwork(_) => {
            tracing::warn!(error = %e, "rejecting malformed payment");
            HttpResponse::BadRequest().json(serde_json::json!({
                "error": "invalid payment payload"
            }))
        }
        _ => {
            tracing::error!(error = %e, "internal error");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal error"
            }))
        }
    }
}

#[get("/")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    match state.facilitator.chain().latest_block().await {
        Ok(block) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "x402-upto-facilitator",
            "network": &state.network,
            "latestBlock": block.to_string(),
        })),
        Err(_) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "degraded",
            "service": "x402-upto-facilitator",
            "error": "RPC unreachable",
        })),
    }
}

#[get("/supported")]
pub async fn supported(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "schemes": [SCHEME_NAME],
        "networks": [&state.network],
        "facilitator": state.facilitator_address,
    }))
}

#[get("/stats")]
pub async fn stats(state: web::Data<AppState>) -> HttpResponse {
    match state.audit.stats() {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => {
            tracing::error!(error = %e, "stats query failed");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal error"
            }))
        }
    }
}

#[get("/metrics")]
pub async fn metrics_endpoint() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics::metrics_output())
}

#[post("/verify")]
pub async fn verify(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let parsed: PaymentRequest = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(_) => return bad_request(),
    };

    match state
        .facilitator
        .verify(&parsed.payload, &parsed.requirements)
        .await
    {
        Ok(result) => {
            if result.is_valid {
                metrics::VERIFY_REQUESTS.with_label_values(&["valid"]).inc();

                // Record, never gate: an audit failure is an operator
                // problem, not the payer's.
                let auth = &parsed.payload.permit2_authorization;
                let row = NewPayment {
                    payer: result.payer.unwrap_or(auth.from).to_string(),
                    recipient: auth.witness.to.to_string(),
                    token: auth.permitted.token.to_string(),
                    authorized_amount: auth.permitted.amount.clone(),
                    nonce: auth.nonce.clone(),
                    network: parsed.requirements.network.clone(),
                };
                if let Err(e) = state.audit.record_verified(&row) {
                    tracing::warn!(error = %e, nonce = %row.nonce, "audit insert failed");
                }
            } else {
                metrics::VERIFY_REQUESTS
                    .with_label_values(&["invalid"])
                    .inc();
            }
            HttpResponse::Ok().json(result)
        }
        Err(e) => {
            metrics::VERIFY_REQUESTS.with_label_values(&["error"]).inc();
            error_response(&e)
        }
    }
}

#[post("/settle")]
pub async fn settle(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let parsed: PaymentRequest = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(_) => return bad_request(),
    };

    let start = std::time::Instant::now();
    let nonce = parsed.payload.permit2_authorization.nonce.clone();

    match state
        .facilitator
        .settle(&parsed.payload, &parsed.requirements)
        .await
    {
        Ok(result) => {
            let elapsed = start.elapsed().as_secs_f64();
            if result.success {
                metrics::SETTLE_REQUESTS
                    .with_label_values(&["success"])
                    .inc();
                metrics::SETTLE_LATENCY
                    .with_label_values(&["success"])
                    .observe(elapsed);

                // Zero-amount settlements are elided on-chain and leave the
                // audit row as verified.
                if let (Some(tx_hash), Some(settled)) = (&result.tx_hash, &result.settled_amount) {
                    if let Err(e) = state.audit.record_settled(&nonce, settled, tx_hash) {
                        tracing::warn!(error = %e, nonce = %nonce, "audit settle update failed");
                    }
                }
            } else {
                metrics::SETTLE_REQUESTS
                    .with_label_values(&["rejected"])
                    .inc();
                metrics::SETTLE_LATENCY
                    .with_label_values(&["rejected"])
                    .observe(elapsed);

                let error = result.error.as_deref().unwrap_or("unknown");
                tracing::warn!(nonce = %nonce, reason = error, "settlement failed");
                if let Err(e) = state.audit.record_failed(&nonce, error) {
                    tracing::warn!(error = %e, nonce = %nonce, "audit failure update failed");
                }
            }
            HttpResponse::Ok().json(result)
        }
        Err(e) => {
            metrics::SETTLE_REQUESTS.with_label_values(&["error"]).inc();
            metrics::SETTLE_LATENCY
                .with_label_values(&["error"])
                .observe(start.elapsed().as_secs_f64());
            error_response(&e)
        }
    }
}
