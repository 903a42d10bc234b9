use actix_cors::Cors;
use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{web, App, HttpServer};
use alloy::primitives::{Address, U256};
use std::sync::Arc;

use x402::DEFAULT_NETWORK;
use x402_server::config::{PaymentConfigBuilder, PaymentGateConfig, ServerState};
use x402_server::meter::TextTokenMeter;
use x402_server::routes;

fn build_cors(origins: &[String]) -> Cors {
    if origins.is_empty() {
        // Default: allow localhost on any port
        Cors::default()
            .allowed_origin_fn(|origin, _| {
                origin
                    .to_str()
                    .map(|o| o == "http://localhost" || o.starts_with("http://localhost:"))
                    .unwrap_or(false)
            })
            .allow_any_method()
            .allow_any_header()
            .max_age(3600)
    } else {
        let mut cors = Cors::default();
        for origin in origins {
            cors = cors.allowed_origin(origin);
        }
        cors.allow_any_method().allow_any_header().max_age(3600)
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let pay_to: Address = std::env::var("PAY_TO")
        .expect("PAY_TO environment variable is required")
        .parse()
        .expect("invalid PAY_TO");

    let network = std::env::var("NETWORK").unwrap_or_else(|_| DEFAULT_NETWORK.to_string());
    let facilitator_url =
        std::env::var("FACILITATOR_URL").unwrap_or_else(|_| "http://localhost:4402".to_string());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(4021);

    let gate = PaymentGateConfig::from_env(&facilitator_url);
    let cors_origins = gate.allowed_origins.clone();

    // $0.0001 per text token of the report body.
    let config = PaymentConfigBuilder::new(&network, pay_to, &facilitator_url)
        .route("GET", "/data", "$0.01", Some("Sample dataset"))
        .metered_route(
            "GET",
            "/report",
            "$1.00",
            Arc::new(TextTokenMeter::new(U256::from(100u64))),
            Some("Market report, billed per token"),
        )
        .build();

    let state = web::Data::new(ServerState {
        config,
        http: reqwest::Client::new(),
    });

    tracing::info!("x402-upto resource server listening on port {port}");
    tracing::info!("Facilitator: {facilitator_url}");
    tracing::info!("Pay-to: {pay_to} on {network}");
    tracing::info!("  GET http://localhost:{port}/data    ($0.01 flat)");
    tracing::info!("  GET http://localhost:{port}/report  ($1.00 ceiling, metered)");

    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_minute(gate.rate_limit_rpm)
        .finish()
        .expect("failed to build rate limiter config");

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&cors_origins))
            .wrap(Governor::new(&governor_conf))
            .app_data(state.clone())
            .service(routes::data)
            .service(routes::report)
            .service(routes::health)
            .service(routes::metrics_endpoint)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
