// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment function client tests against a mock function endpoint.

use serde_json::json;
use slotbook::db::MemoryDb;
use slotbook::models::ContactInfo;
use slotbook::services::identity::{GoTrueClient, MockIdentityProvider};
use slotbook::services::notify::CollectingNotifier;
use slotbook::services::payment::{
    FunctionGatewayClient, GatewayError, OrderRequest, PaymentGateway,
};
use slotbook::services::profile::ProfileRepository;
use slotbook::services::session::{SessionListener, SessionStore};
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{signed_confirmation, test_identity};

const API_KEY: &str = "test_anon_key";
const FUNCTION_PATH: &str = "/functions/v1/razorpay";

fn session_store(signed_in: bool) -> Arc<SessionStore> {
    let mut provider = MockIdentityProvider::new();
    if signed_in {
        provider = provider.with_session(MockIdentityProvider::session_for(&test_identity("u1")));
    }
    SessionStore::new(
        Arc::new(provider),
        ProfileRepository::new(Arc::new(MemoryDb::new())),
        Arc::new(CollectingNotifier::new()),
    )
}

async fn client(server: &MockServer, signed_in: bool) -> (FunctionGatewayClient, SessionListener) {
    let store = session_store(signed_in);
    let listener = store.initialize().await;
    let url = format!("{}{}", server.uri(), FUNCTION_PATH);
    (FunctionGatewayClient::new(&url, API_KEY, store), listener)
}

fn order_request() -> OrderRequest {
    OrderRequest {
        amount: 500,
        receipt: "booking-S1-1760868000000".to_string(),
        slot_id: "S1".to_string(),
        contact: ContactInfo {
            name: "Asha Rao".to_string(),
            phone: "9876543210".to_string(),
            email: "u1@example.com".to_string(),
        },
    }
}

#[tokio::test]
async fn test_create_order_sends_action_with_user_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FUNCTION_PATH))
        .and(header("authorization", "Bearer token-u1"))
        .and(header("apikey", API_KEY))
        .and(body_json(json!({
            "action": "create_order",
            "amount": 500,
            "receipt": "booking-S1-1760868000000",
            "name": "Asha Rao",
            "email": "u1@example.com",
            "contact": "9876543210",
            "slot_id": "S1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "order": {
                "id": "order_Nx1",
                "amount": 50000,
                "currency": "INR",
                "receipt": "booking-S1-1760868000000"
            },
            "key_id": "rzp_test_key"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _listener) = client(&server, true).await;
    let created = client.create_order(&order_request()).await.unwrap();

    assert_eq!(created.order.id, "order_Nx1");
    assert_eq!(created.order.amount, 50_000);
    assert_eq!(created.key_id, "rzp_test_key");
}

#[tokio::test]
async fn test_expired_access_token_is_refreshed_before_call() {
    let server = MockServer::start().await;
    let user = json!({
        "id": "u1",
        "email": "u1@example.com",
        "user_metadata": { "name": "Asha Rao", "phone": "9876543210" }
    });
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "stale",
            "refresh_token": "refresh-1",
            "expires_in": 0,
            "user": user.clone(),
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_json(json!({ "refresh_token": "refresh-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "refresh_token": "refresh-2",
            "expires_in": 3600,
            "user": user,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(FUNCTION_PATH))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "order": { "id": "order_Nx2", "amount": 50000, "currency": "INR" },
            "key_id": "rzp_test_key"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = SessionStore::new(
        Arc::new(GoTrueClient::new(&server.uri(), API_KEY)),
        ProfileRepository::new(Arc::new(MemoryDb::new())),
        Arc::new(CollectingNotifier::new()),
    );
    store
        .login("u1@example.com", "hunter22", true)
        .await
        .unwrap();
    assert_eq!(store.access_token().as_deref(), Some("stale"));

    let url = format!("{}{}", server.uri(), FUNCTION_PATH);
    let client = FunctionGatewayClient::new(&url, API_KEY, store.clone());
    let created = client.create_order(&order_request()).await.unwrap();

    assert_eq!(created.order.id, "order_Nx2");
    assert_eq!(store.access_token().as_deref(), Some("fresh"));
}

#[tokio::test]
async fn test_signed_out_caller_falls_back_to_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FUNCTION_PATH))
        .and(header("authorization", format!("Bearer {}", API_KEY).as_str()))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "error": "Unauthorized"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _listener) = client(&server, false).await;
    let err = client.create_order(&order_request()).await.unwrap_err();

    assert_eq!(err, GatewayError::Rejected("Unauthorized".to_string()));
}

#[tokio::test]
async fn test_reply_without_envelope_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FUNCTION_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let (client, _listener) = client(&server, true).await;
    let err = client.create_order(&order_request()).await.unwrap_err();

    assert!(matches!(err, GatewayError::Malformed(_)));
}

#[tokio::test]
async fn test_error_envelope_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FUNCTION_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "success": false,
            "error": "Payment gateway is not configured"
        })))
        .mount(&server)
        .await;

    let (client, _listener) = client(&server, true).await;
    let err = client.create_order(&order_request()).await.unwrap_err();

    assert_eq!(
        err,
        GatewayError::Rejected("Payment gateway is not configured".to_string())
    );
}

#[tokio::test]
async fn test_success_without_order_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FUNCTION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&server)
        .await;

    let (client, _listener) = client(&server, true).await;
    let err = client.create_order(&order_request()).await.unwrap_err();

    assert!(matches!(err, GatewayError::Malformed(_)));
}

#[tokio::test]
async fn test_verify_requires_explicit_valid_true() {
    let confirmation = signed_confirmation("order_Nx1", "pay_Ab2");

    for (reply, expected) in [
        (json!({ "success": true, "valid": true }), true),
        (json!({ "success": true, "valid": false }), false),
        (json!({ "success": true }), false),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(FUNCTION_PATH))
            .and(body_json(json!({
                "action": "verify_payment",
                "razorpay_order_id": "order_Nx1",
                "razorpay_payment_id": "pay_Ab2",
                "razorpay_signature": confirmation.razorpay_signature,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _listener) = client(&server, true).await;
        assert_eq!(
            client.verify_payment(&confirmation).await.unwrap(),
            expected,
            "reply {}",
            reply
        );
    }
}

#[tokio::test]
async fn test_verify_transport_failure() {
    // Nothing listens here
    let store = session_store(true);
    let _listener = store.initialize().await;
    let client = FunctionGatewayClient::new("http://127.0.0.1:9/functions/v1/razorpay", API_KEY, store);

    let err = client
        .verify_payment(&signed_confirmation("order_Nx1", "pay_Ab2"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Transport(_)));
}
