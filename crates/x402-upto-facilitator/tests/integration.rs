//! Facilitator endpoint behavior. The provider points at a dead RPC
//! endpoint: every exercised path either fails before chain I/O or is
//! expected to report the RPC as unreachable.

use actix_web::{test, web, App};
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;

use x402::{
    chain_id_from_network, eip712, Permit2Authorization, PaymentRequirements, RpcChain,
    TokenPermissions, TokenPermissionsData, UptoFacilitator, UptoPayload, WitnessData,
    PermitWitnessTransferFrom, x402Witness, BASE_SEPOLIA_NETWORK, BASE_SEPOLIA_USDC,
    UPTO_PROXY_ADDRESS,
};
use x402_facilitator::audit::AuditStore;
use x402_facilitator::routes;
use x402_facilitator::state::AppState;

fn make_state() -> web::Data<AppState> {
    let signer = PrivateKeySigner::random();
    let facilitator_address = signer.address();

    let provider = ProviderBuilder::new()
        .wallet(alloy::network::EthereumWallet::from(signer))
        .connect_http("http://localhost:1".parse().unwrap());

    web::Data::new(AppState {
        facilitator: UptoFacilitator::new(RpcChain::new(provider, UPTO_PROXY_ADDRESS)),
        audit: AuditStore::open_in_memory().unwrap(),
        network: BASE_SEPOLIA_NETWORK.to_string(),
        facilitator_address,
    })
}

const PAY_TO: Address = Address::with_last_byte(0x77);

fn requirements() -> PaymentRequirements {
    PaymentRequirements {
        scheme: "upto".to_string(),
        network: BASE_SEPOLIA_NETWORK.to_string(),
        asset: BASE_SEPOLIA_USDC,
        max_amount: "1000000".to_string(),
        pay_to: PAY_TO,
        max_timeout_seconds: 300,
        description: None,
        mime_type: None,
    }
}

fn now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn signed_payload(signer: &PrivateKeySigner, deadline: u64) -> UptoPayload {
    let requirements = requirements();
    let nonce = eip712::random_nonce();
    let message = PermitWitnessTransferFrom {
        permitted: TokenPermissions {
            token: requirements.asset,
            amount: U256::from(1_000_000u64),
        },
        spender: UPTO_PROXY_ADDRESS,
        nonce: U256::from(nonce),
        deadline: U256::from(deadline),
        witness: x402Witness {
            to: requirements.pay_to,
            validAfter: U256::ZERO,
            extra: Bytes::new(),
        },
    };
    let chain_id = chain_id_from_network(&requirements.network).unwrap();
    let sig = signer
        .sign_hash_sync(&eip712::signing_hash(&message, chain_id))
        .unwrap();

    UptoPayload {
        signature: eip712::encode_signature_hex(&sig),
        permit2_authorization: Permit2Authorization {
            from: signer.address(),
            permitted: TokenPermissionsData {
                token: requirements.asset,
                amount: "1000000".to_string(),
            },
            spender: UPTO_PROXY_ADDRESS,
            nonce: nonce.to_string(),
            deadline: deadline.to_string(),
            witness: WitnessData {
                to: requirements.pay_to,
                valid_after: "0".to_string(),
                extra: Bytes::new(),
            },
        },
        settlement_amount: None,
    }
}

fn request_body(payload: &UptoPayload) -> serde_json::Value {
    serde_json::json!({
        "payload": payload,
        "requirements": requirements(),
    })
}

#[actix_rt::test]
async fn supported_reports_scheme_network_and_address() {
    let state = make_state();
    let expected = state.facilitator_address.to_string();
    let app = test::init_service(App::new().app_data(state).service(routes::supported)).await;

    let req = test::TestRequest::get().uri("/supported").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["schemes"][0], "upto");
    assert_eq!(body["networks"][0], "eip155:84532");
    // Hex casing differs between serde and Display; addresses compare
    // case-insensitively.
    assert_eq!(
        body["facilitator"].as_str().unwrap().to_lowercase(),
        expected.to_lowercase()
    );
}

#[actix_rt::test]
async fn health_probe_reports_dead_rpc_as_degraded() {
    let state = make_state();
    let app = test::init_service(App::new().app_data(state).service(routes::health)).await;

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 503);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "degraded");
}

#[actix_rt::test]
async fn stats_start_at_zero() {
    let state = make_state();
    let app = test::init_service(App::new().app_data(state).service(routes::stats)).await;

    let req = test::TestRequest::get().uri("/stats").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["totalPayments"], 0);
    assert_eq!(body["settledPayments"], 0);
    assert_eq!(body["totalAuthorized"], 0);
    assert_eq!(body["totalSettled"], 0);
    assert_eq!(body["savingsPercent"], 0);
}

#[actix_rt::test]
async fn verify_rejects_malformed_body() {
    let state = make_state();
    let app = test::init_service(App::new().app_data(state).service(routes::verify)).await;

    let req = test::TestRequest::post()
        .uri("/verify")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 400);
}

#[actix_rt::test]
async fn verify_rejects_expired_deadline_without_recording() {
    let state = make_state();
    let signer = PrivateKeySigner::random();
    let payload = signed_payload(&signer, 1000);

    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .service(routes::verify)
            .service(routes::stats),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/verify")
        .set_json(request_body(&payload))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["isValid"], false);
    assert_eq!(body["invalidReason"], "permit2_deadline_expired");

    // Only valid payloads land in the audit store.
    let req = test::TestRequest::get().uri("/stats").to_request();
    let stats: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["totalPayments"], 0);
}

#[actix_rt::test]
async fn verify_rejects_wrong_spender() {
    let state = make_state();
    let signer = PrivateKeySigner::random();
    let mut payload = signed_payload(&signer, now() + 300);
    payload.permit2_authorization.spender = Address::ZERO;

    let app = test::init_service(App::new().app_data(state).service(routes::verify)).await;

    let req = test::TestRequest::post()
        .uri("/verify")
        .set_json(request_body(&payload))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["isValid"], false);
    assert_eq!(body["invalidReason"], "invalid_spender");
}

#[actix_rt::test]
async fn verify_reports_unreachable_rpc_as_allowance_failure() {
    // All local checks pass; the dead RPC surfaces at the allowance read.
    let state = make_state();
    let signer = PrivateKeySigner::random();
    let payload = signed_payload(&signer, now() + 300);

    let app = test::init_service(App::new().app_data(state).service(routes::verify)).await;

    let req = test::TestRequest::post()
        .uri("/verify")
        .set_json(request_body(&payload))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["isValid"], false);
    assert_eq!(body["invalidReason"], "allowance_check_failed");
}

#[actix_rt::test]
async fn settle_elides_zero_amount_without_chain() {
    let state = make_state();
    let signer = PrivateKeySigner::random();
    let mut payload = signed_payload(&signer, now() + 300);
    payload.settlement_amount = Some("0".to_string());

    let app = test::init_service(App::new().app_data(state).service(routes::settle)).await;

    let req = test::TestRequest::post()
        .uri("/settle")
        .set_json(request_body(&payload))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["settledAmount"], "0");
    assert!(body.get("txHash").is_none());
}

#[actix_rt::test]
async fn settle_rejects_amount_above_ceiling() {
    let state = make_state();
    let signer = PrivateKeySigner::random();
    let mut payload = signed_payload(&signer, now() + 300);
    payload.settlement_amount = Some("1000001".to_string());

    let app = test::init_service(App::new().app_data(state).service(routes::settle)).await;

    let req = test::TestRequest::post()
        .uri("/settle")
        .set_json(request_body(&payload))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "settlement_exceeds_authorization");
}

#[actix_rt::test]
async fn settle_rejects_malformed_body() {
    let state = make_state();
    let app = test::init_service(App::new().app_data(state).service(routes::settle)).await;

    let req = test::TestRequest::post()
        .uri("/settle")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("[]")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 400);
}
