// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Trusted payment function.
//!
//! One endpoint, dispatched on the `action` field of the JSON body:
//! - `create_order`: create a gateway order for a whole-rupee amount
//! - `verify_payment`: check a checkout signature with the key secret
//!
//! Replies always use the `{success, ...}` envelope. Bad input is a 400;
//! misconfiguration, gateway failures and anything unexpected are a 500
//! with the error message, and a rejected access token is a 401. The key
//! secret never leaves this module.

use crate::middleware::auth::{authenticate, AuthUser};
use crate::models::{PaymentConfirmation, PaymentOrder};
use crate::services::razorpay::OrderNotes;
use crate::services::RazorpayClient;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::post,
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub const FUNCTION_PATH: &str = "/functions/v1/razorpay";

/// Payment function route (requires an authenticated caller).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(FUNCTION_PATH, post(razorpay_function))
}

#[derive(Deserialize)]
struct ActionEnvelope {
    #[serde(default)]
    action: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct CreateOrderRequest {
    /// Whole rupees
    #[validate(range(min = 1))]
    amount: u32,
    #[validate(length(min = 1, max = 40))]
    receipt: String,
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[validate(email)]
    email: String,
    #[validate(length(min = 1, max = 20))]
    contact: String,
    /// When present, the amount is checked against the catalog price
    #[serde(default)]
    slot_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct VerifyPaymentRequest {
    #[validate(length(min = 1))]
    razorpay_order_id: String,
    #[validate(length(min = 1))]
    razorpay_payment_id: String,
    #[validate(length(min = 1))]
    razorpay_signature: String,
}

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct FunctionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<PaymentOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
}

/// Failure envelope: `{success: false, error}`.
#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct FunctionErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for FunctionError {
    fn into_response(self) -> Response {
        let status = match &self {
            FunctionError::BadRequest(_) => StatusCode::BAD_REQUEST,
            FunctionError::Unauthorized => StatusCode::UNAUTHORIZED,
            FunctionError::Internal(msg) => {
                tracing::error!(error = %msg, "Payment function error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = FunctionErrorBody {
            success: false,
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Same checks as `require_auth`, but a rejection is reported in the
/// function's own envelope so callers can read it like any other error.
pub async fn require_function_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, &jar, &request) {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => FunctionError::Unauthorized.into_response(),
    }
}

type FunctionResult = std::result::Result<Json<FunctionResponse>, FunctionError>;

async fn razorpay_function(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> FunctionResult {
    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| FunctionError::Internal(format!("Invalid JSON body: {}", e)))?;

    let envelope: ActionEnvelope = serde_json::from_value(value.clone())
        .map_err(|e| FunctionError::Internal(format!("Invalid request body: {}", e)))?;

    match envelope.action.as_deref() {
        Some("create_order") => create_order(&state, &user, parse_request(value)?).await,
        Some("verify_payment") => verify_payment(&state, &user, parse_request(value)?),
        other => {
            tracing::warn!(user_id = %user.user_id, action = ?other, "Unknown payment action");
            Err(FunctionError::BadRequest("Invalid action".to_string()))
        }
    }
}

fn parse_request<T>(value: serde_json::Value) -> std::result::Result<T, FunctionError>
where
    T: for<'de> Deserialize<'de> + Validate,
{
    let request: T = serde_json::from_value(value)
        .map_err(|e| FunctionError::BadRequest(format!("Invalid request: {}", e)))?;
    request
        .validate()
        .map_err(|e| FunctionError::BadRequest(format!("Invalid request: {}", e)))?;
    Ok(request)
}

fn gateway(state: &AppState) -> std::result::Result<&RazorpayClient, FunctionError> {
    state.razorpay.as_ref().ok_or_else(|| {
        FunctionError::Internal("Payment gateway is not configured".to_string())
    })
}

async fn create_order(
    state: &AppState,
    user: &AuthUser,
    request: CreateOrderRequest,
) -> FunctionResult {
    let client = gateway(state)?;

    if let (Some(slot_id), Some(catalog)) = (request.slot_id.as_deref(), state.catalog.as_ref()) {
        let slot = catalog
            .slot(slot_id)
            .await
            .ok_or_else(|| FunctionError::BadRequest(format!("Unknown slot: {}", slot_id)))?;

        if slot.price != request.amount {
            tracing::warn!(
                user_id = %user.user_id,
                slot_id,
                requested = request.amount,
                price = slot.price,
                "Order amount does not match slot price"
            );
            return Err(FunctionError::BadRequest(
                "Amount does not match slot price".to_string(),
            ));
        }
    }

    let notes = OrderNotes {
        name: request.name,
        email: request.email,
        contact: request.contact,
    };

    let order = client
        .create_order(u64::from(request.amount), &request.receipt, &notes)
        .await
        .map_err(|e| FunctionError::Internal(e.to_string()))?;

    tracing::info!(
        user_id = %user.user_id,
        order_id = %order.id,
        receipt = %request.receipt,
        "Order created for user"
    );

    Ok(Json(FunctionResponse {
        success: true,
        order: Some(order),
        key_id: Some(client.key_id().to_string()),
        valid: None,
    }))
}

fn verify_payment(state: &AppState, user: &AuthUser, request: VerifyPaymentRequest) -> FunctionResult {
    let client = gateway(state)?;

    let confirmation = PaymentConfirmation {
        razorpay_order_id: request.razorpay_order_id,
        razorpay_payment_id: request.razorpay_payment_id,
        razorpay_signature: request.razorpay_signature,
    };
    let valid = client.verify_payment(&confirmation);

    if valid {
        tracing::info!(user_id = %user.user_id, order_id = %confirmation.razorpay_order_id, "Payment signature verified");
    } else {
        tracing::warn!(user_id = %user.user_id, order_id = %confirmation.razorpay_order_id, "Payment signature mismatch");
    }

    Ok(Json(FunctionResponse {
        success: true,
        order: None,
        key_id: None,
        valid: Some(valid),
    }))
}
