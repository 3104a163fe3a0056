// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::NaiveDate;
use slotbook::config::Config;
use slotbook::db::{BookingInsert, BookingStore, FirestoreDb, MemoryDb};
use slotbook::error::AppError;
use slotbook::middleware::auth::create_jwt;
use slotbook::models::{
    Booking, Center, CreatedOrder, Identity, PaymentConfirmation, PaymentOrder, Slot, Sport,
};
use slotbook::routes::create_router;
use slotbook::services::payment::{GatewayError, OrderRequest, PaymentGateway};
use slotbook::services::razorpay::{sign_payment, verify_payment_signature, CURRENCY};
use slotbook::services::{RazorpayClient, SlotCatalog, StaticCatalog};
use slotbook::AppState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Gateway key secret used by `Config::test_default()`.
#[allow(dead_code)]
pub const TEST_KEY_SECRET: &str = "test_key_secret";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

#[allow(dead_code)]
pub fn test_identity(id: &str) -> Identity {
    Identity {
        id: id.to_string(),
        email: format!("{}@example.com", id),
        name: "Asha Rao".to_string(),
        phone: Some("9876543210".to_string()),
    }
}

/// Access token for `identity`, signed with the test secret.
#[allow(dead_code)]
pub fn create_test_jwt(identity: &Identity) -> String {
    create_jwt(identity, &Config::test_default().auth_jwt_secret).unwrap()
}

/// Catalog with one bookable slot (S1), one unavailable slot (S2) and one
/// slot whose center does not resolve (S3).
#[allow(dead_code)]
pub fn test_catalog() -> StaticCatalog {
    let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
    let slot = |id: &str, center_id: &str, available: bool| Slot {
        id: id.to_string(),
        center_id: center_id.to_string(),
        sport_id: "badminton".to_string(),
        date,
        start_time: "09:00".to_string(),
        end_time: "10:00".to_string(),
        price: 500,
        available,
    };

    StaticCatalog::new(
        vec![Center {
            id: "C1".to_string(),
            name: "Koramangala Arena".to_string(),
            address: "80 Feet Road".to_string(),
        }],
        vec![Sport {
            id: "badminton".to_string(),
            name: "Badminton".to_string(),
        }],
        vec![
            slot("S1", "C1", true),
            slot("S2", "C1", false),
            slot("S3", "C404", true),
        ],
    )
}

/// Create a test app backed by the in-memory store.
/// Returns the router, the shared state and the store.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, MemoryDb) {
    create_test_app_with(None, Some(Arc::new(test_catalog())))
}

/// Create a test app whose gateway client talks to `razorpay_url`
/// (None leaves the gateway unconfigured).
#[allow(dead_code)]
pub fn create_test_app_with(
    razorpay_url: Option<&str>,
    catalog: Option<Arc<dyn SlotCatalog>>,
) -> (axum::Router, Arc<AppState>, MemoryDb) {
    let config = Config::test_default();
    let db = MemoryDb::new();

    let razorpay = razorpay_url.map(|url| {
        let (key_id, key_secret) = config.razorpay_credentials().unwrap();
        RazorpayClient::new(url, key_id, key_secret)
    });

    let state = Arc::new(AppState {
        config,
        profiles: Arc::new(db.clone()),
        bookings: Arc::new(db.clone()),
        razorpay,
        catalog,
    });

    (create_router(state.clone()), state, db)
}

/// Checkout completion for `order_id`, signed the way the gateway signs it.
#[allow(dead_code)]
pub fn signed_confirmation(order_id: &str, payment_id: &str) -> PaymentConfirmation {
    PaymentConfirmation {
        razorpay_order_id: order_id.to_string(),
        razorpay_payment_id: payment_id.to_string(),
        razorpay_signature: sign_payment(TEST_KEY_SECRET.as_bytes(), order_id, payment_id)
            .unwrap(),
    }
}

/// How `FakeGateway` behaves.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    /// Orders succeed, signatures are checked with the test secret
    Honest,
    /// Orders succeed, every verification says `valid: false`
    AlwaysInvalid,
    FailOrders,
    /// Orders come back with an amount that does not match the price
    WrongAmount,
    /// Verification requests fail in transport
    VerifyError,
}

/// In-process payment gateway double.
#[allow(dead_code)]
pub struct FakeGateway {
    mode: Mutex<GatewayMode>,
    pub order_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
    pub last_request: Mutex<Option<OrderRequest>>,
}

#[allow(dead_code)]
impl FakeGateway {
    pub fn new(mode: GatewayMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            order_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn set_mode(&self, mode: GatewayMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn orders(&self) -> usize {
        self.order_calls.load(Ordering::SeqCst)
    }

    pub fn verifications(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    fn mode(&self) -> GatewayMode {
        *self.mode.lock().unwrap()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(&self, request: &OrderRequest) -> Result<CreatedOrder, GatewayError> {
        let n = self.order_calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_request.lock().unwrap() = Some(request.clone());

        let amount = match self.mode() {
            GatewayMode::FailOrders => {
                return Err(GatewayError::Rejected("gateway unavailable".to_string()))
            }
            GatewayMode::WrongAmount => u64::from(request.amount),
            _ => u64::from(request.amount) * 100,
        };

        Ok(CreatedOrder {
            order: PaymentOrder {
                id: format!("order_{}", n),
                amount,
                currency: CURRENCY.to_string(),
                receipt: Some(request.receipt.clone()),
            },
            key_id: "rzp_test_key".to_string(),
        })
    }

    async fn verify_payment(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<bool, GatewayError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        match self.mode() {
            GatewayMode::AlwaysInvalid => Ok(false),
            GatewayMode::VerifyError => Err(GatewayError::Transport("timed out".to_string())),
            _ => Ok(verify_payment_signature(
                TEST_KEY_SECRET.as_bytes(),
                &confirmation.razorpay_order_id,
                &confirmation.razorpay_payment_id,
                &confirmation.razorpay_signature,
            )),
        }
    }
}

/// Booking store whose writes always fail.
#[allow(dead_code)]
pub struct FailingBookingStore;

#[async_trait]
impl BookingStore for FailingBookingStore {
    async fn insert_booking(&self, _booking: &Booking) -> Result<BookingInsert, AppError> {
        Err(AppError::Database("write quota exceeded".to_string()))
    }

    async fn find_by_payment_order(&self, _order_id: &str) -> Result<Option<Booking>, AppError> {
        Ok(None)
    }

    async fn list_bookings_for_user(
        &self,
        _user_id: &str,
        _limit: u32,
        _offset: u32,
    ) -> Result<Vec<Booking>, AppError> {
        Ok(vec![])
    }
}
