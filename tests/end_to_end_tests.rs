// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Full booking run: session store, booking coordinator and function client
//! against the real router on a local listener, with the gateway API mocked.

use chrono::Utc;
use serde_json::{json, Value};
use slotbook::db::{BookingStore, ProfileStore};
use slotbook::middleware::auth::create_jwt;
use slotbook::config::Config;
use slotbook::models::{BookingStatus, Session, TokenMaterial};
use slotbook::services::booking::{BookingCoordinator, BookingState, EntryOutcome};
use slotbook::services::identity::MockIdentityProvider;
use slotbook::services::notify::CollectingNotifier;
use slotbook::services::payment::FunctionGatewayClient;
use slotbook::services::profile::ProfileRepository;
use slotbook::services::session::SessionStore;
use slotbook::services::{SlotCatalog, SlotHolds};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{create_test_app_with, signed_confirmation, test_catalog, test_identity};

#[tokio::test]
async fn test_booking_end_to_end() {
    // Gateway API
    let razorpay = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(body_partial_json(json!({ "amount": 50000, "currency": "INR" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "order_E2E1",
            "entity": "order",
            "amount": 50000,
            "currency": "INR",
            "receipt": "booking-S1",
            "status": "created"
        })))
        .expect(1)
        .mount(&razorpay)
        .await;

    // Server with the payment function and API
    let catalog: Arc<dyn SlotCatalog> = Arc::new(test_catalog());
    let (app, state, db) = create_test_app_with(Some(&razorpay.uri()), Some(catalog.clone()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let base = format!("http://{}", addr);

    // Signed-in client session carrying a real access token
    let identity = test_identity("u1");
    let access_token = create_jwt(&identity, &Config::test_default().auth_jwt_secret).unwrap();
    let provider = MockIdentityProvider::new().with_session(Session {
        identity: identity.clone(),
        tokens: TokenMaterial {
            access_token: access_token.clone(),
            refresh_token: None,
            expires_at: Utc::now().timestamp() + 3600,
        },
    });
    let notifier = Arc::new(CollectingNotifier::new());
    let session = SessionStore::new(
        Arc::new(provider),
        ProfileRepository::new(state.profiles.clone()),
        notifier.clone(),
    );
    let _session_listener = session.initialize().await;
    assert!(session.is_authenticated());
    // Sign-in repaired the missing profile
    assert!(db.get_profile("u1").await.unwrap().is_some());

    let gateway = FunctionGatewayClient::new(
        &format!("{}/functions/v1/razorpay", base),
        "test_anon_key",
        session.clone(),
    );
    let coordinator = BookingCoordinator::new(
        catalog,
        Arc::new(gateway),
        state.bookings.clone(),
        SlotHolds::new(Duration::from_secs(600)),
        notifier.clone(),
    );

    let mut attempt = match coordinator.begin(Some("S1"), &identity).await {
        EntryOutcome::Ready(attempt) => attempt,
        EntryOutcome::Redirect(reason) => panic!("unexpected redirect: {:?}", reason),
    };

    let prefill = attempt.prefill(session.profile().as_ref());
    let created = attempt.submit(&prefill.name, &prefill.phone).await.unwrap();
    assert_eq!(created.order.id, "order_E2E1");
    assert_eq!(created.key_id, "rzp_test_key");

    // Checkout widget reports a payment signed with the real key secret
    let booking = attempt
        .on_payment_success(&signed_confirmation("order_E2E1", "pay_E2E1"))
        .await
        .unwrap();
    assert!(matches!(attempt.state(), BookingState::Confirmed { .. }));
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.amount, 500);
    assert_eq!(
        state
            .bookings
            .find_by_payment_order("order_E2E1")
            .await
            .unwrap(),
        Some(booking.clone())
    );
    assert!(notifier.errors().is_empty());

    // History over HTTP
    let history: Value = reqwest::Client::new()
        .get(format!("{}/api/bookings", base))
        .bearer_auth(&access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["bookings"].as_array().unwrap().len(), 1);
    assert_eq!(history["bookings"][0]["id"], booking.id);
    assert_eq!(history["bookings"][0]["center_name"], "Koramangala Arena");
}

#[tokio::test]
async fn test_forged_payment_is_not_booked_end_to_end() {
    let razorpay = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "order_E2E2",
            "amount": 50000,
            "currency": "INR"
        })))
        .mount(&razorpay)
        .await;

    let catalog: Arc<dyn SlotCatalog> = Arc::new(test_catalog());
    let (app, state, db) = create_test_app_with(Some(&razorpay.uri()), Some(catalog.clone()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let identity = test_identity("u2");
    let access_token = create_jwt(&identity, &Config::test_default().auth_jwt_secret).unwrap();
    let provider = MockIdentityProvider::new().with_session(Session {
        identity: identity.clone(),
        tokens: TokenMaterial {
            access_token,
            refresh_token: None,
            expires_at: Utc::now().timestamp() + 3600,
        },
    });
    let notifier = Arc::new(CollectingNotifier::new());
    let session = SessionStore::new(
        Arc::new(provider),
        ProfileRepository::new(state.profiles.clone()),
        notifier.clone(),
    );
    let _session_listener = session.initialize().await;

    let gateway = FunctionGatewayClient::new(
        &format!("http://{}/functions/v1/razorpay", addr),
        "test_anon_key",
        session,
    );
    let coordinator = BookingCoordinator::new(
        catalog,
        Arc::new(gateway),
        state.bookings.clone(),
        SlotHolds::new(Duration::from_secs(600)),
        notifier.clone(),
    );

    let EntryOutcome::Ready(mut attempt) = coordinator.begin(Some("S1"), &identity).await else {
        panic!("S1 should be bookable");
    };
    attempt.submit("Asha Rao", "9876543210").await.unwrap();

    let mut forged = signed_confirmation("order_E2E2", "pay_E2E2");
    forged.razorpay_payment_id = "pay_OTHER".to_string();
    assert!(attempt.on_payment_success(&forged).await.is_err());

    assert_eq!(db.booking_count(), 0);
    assert_eq!(
        notifier.errors(),
        vec!["Payment verification failed. Please contact support."]
    );
}
