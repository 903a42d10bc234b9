use actix_web::http::StatusCode;
use actix_web::{get, web, HttpRequest, HttpResponse};

use crate::config::ServerState;
use crate::metrics;
use crate::middleware;

/// Flat-priced dataset endpoint: the full advertised amount settles.
#[get("/data")]
pub async fn data(req: HttpRequest, state: web::Data<ServerState>) -> HttpResponse {
    let verified = match middleware::verify_payment(&req, &state.config, &state.http).await {
        Ok(Some(v)) => v,
        Ok(None) => {
            return HttpResponse::Ok().json(serde_json::json!({ "dataset": "sample" }));
        }
        Err(resp) => return resp,
    };

    let body = serde_json::json!({
        "dataset": "sample",
        "rows": [1, 2, 3],
    })
    .to_string()
    .into_bytes();

    middleware::respond_paid(
        &req,
        &state.config,
        &state.http,
        verified,
        StatusCode::OK,
        "application/json",
        body,
    )
    .await
}

/// Metered text endpoint: the payer authorizes a ceiling; only the tokens
/// actually produced are settled.
#[get("/report")]
pub async fn report(req: HttpRequest, state: web::Data<ServerState>) -> HttpResponse {
    let verified = match middleware::verify_payment(&req, &state.config, &state.http).await {
        Ok(Some(v)) => v,
        Ok(None) => return HttpResponse::Ok().body(generate_report()),
        Err(resp) => return resp,
    };

    let body = generate_report().into_bytes();

    middleware::respond_paid(
        &req,
        &state.config,
        &state.http,
        verified,
        StatusCode::OK,
        "text/plain",
        body,
    )
    .await
}

fn generate_report() -> String {
    "market summary: volumes steady, spreads tight, settlement queues empty".to_string()
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "x402-upto-server",
    }))
}

#[get("/metrics")]
pub async fn metrics_endpoint() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics::metrics_output())
}
