use actix_cors::Cors;
use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{web, App, HttpServer};
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;

use x402::{
    chain_id_from_network, usdc_for_network, RpcChain, UptoFacilitator, DEFAULT_FACILITATOR_PORT,
    DEFAULT_NETWORK, DEFAULT_RPC_URL, UPTO_PROXY_ADDRESS,
};
use x402_facilitator::audit::AuditStore;
use x402_facilitator::routes;
use x402_facilitator::state::AppState;

fn parse_cors_origins() -> Vec<String> {
    match std::env::var("ALLOWED_ORIGINS") {
        Ok(origins) => origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => vec![],
    }
}

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

    let key = std::env::var("FACILITATOR_PRIVATE_KEY")
        .expect("FACILITATOR_PRIVATE_KEY environment variable is required");
    let signer: PrivateKeySigner = key.parse().expect("invalid FACILITATOR_PRIVATE_KEY");
    let facilitator_address = signer.address();

    let network = std::env::var("NETWORK").unwrap_or_else(|_| DEFAULT_NETWORK.to_string());
    chain_id_from_network(&network).expect("NETWORK must be a CAIP-2 eip155 identifier");
    if usdc_for_network(&network).is_none() {
        tracing::warn!(%network, "network has no default asset; only explicit-asset routes will settle");
    }

    let rpc_url = std::env::var("RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string());
    let provider = ProviderBuilder::new()
        .wallet(alloy::network::EthereumWallet::from(signer))
        .connect_http(rpc_url.parse().expect("invalid RPC_URL"));

    let audit_db_path =
        std::env::var("AUDIT_DB_PATH").unwrap_or_else(|_| "./x402-payments.db".to_string());
    let audit = AuditStore::open(&audit_db_path).expect("failed to open audit database");
    tracing::info!("Audit store: SQLite at {audit_db_path}");

    let facilitator = UptoFacilitator::new(RpcChain::new(provider, UPTO_PROXY_ADDRESS));

    let state = web::Data::new(AppState {
        facilitator,
        audit,
        network: network.clone(),
        facilitator_address,
    });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_FACILITATOR_PORT);

    let rate_limit_rpm: u64 = std::env::var("RATE_LIMIT_RPM")
        .ok()
        .and_then(|r| r.parse().ok())
        .unwrap_or(120);

    let cors_origins = parse_cors_origins();

    tracing::info!("x402-upto facilitator listening on port {port}");
    tracing::info!("Facilitator address: {facilitator_address}");
    tracing::info!("Network: {network}");
    tracing::info!("Rate limit: {rate_limit_rpm} req/min per IP");
    tracing::info!("  POST http://localhost:{port}/verify");
    tracing::info!("  POST http://localhost:{port}/settle");
    tracing::info!("  GET  http://localhost:{port}/supported");
    tracing::info!("  GET  http://localhost:{port}/stats");

    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_minute(rate_limit_rpm)
        .finish()
        .expect("failed to build rate limiter config");

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&cors_origins))
            .wrap(Governor::new(&governor_conf))
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(65_536))
            .service(routes::health)
            .service(routes::supported)
            .service(routes::stats)
            .service(routes::metrics_endpoint)
            .service(routes::verify)
            .service(routes::settle)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
