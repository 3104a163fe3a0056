// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client side of the payment function boundary.
//!
//! The booking coordinator talks to a `PaymentGateway`. In production that
//! is `FunctionGatewayClient`, which invokes the trusted payment function
//! over HTTP with the caller's access token. The key secret never reaches
//! this side.

use crate::models::{ContactInfo, CreatedOrder, PaymentConfirmation, PaymentOrder};
use crate::services::session::SessionStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Data the coordinator sends when asking for a new order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    /// Whole currency units
    pub amount: u32,
    pub receipt: String,
    pub slot_id: String,
    pub contact: ContactInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("Payment service unreachable: {0}")]
    Transport(String),

    #[error("Payment service rejected the request: {0}")]
    Rejected(String),

    #[error("Malformed payment service response: {0}")]
    Malformed(String),
}

/// Order creation and payment verification, as seen by the client.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a gateway order. Not idempotent: each call is a new order.
    async fn create_order(&self, request: &OrderRequest) -> Result<CreatedOrder, GatewayError>;

    /// Ask the trusted side whether a checkout completion is genuine.
    /// `Ok(true)` only on an explicit `valid: true`.
    async fn verify_payment(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<bool, GatewayError>;
}

#[derive(Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum FunctionRequest<'a> {
    CreateOrder {
        amount: u32,
        receipt: &'a str,
        name: &'a str,
        email: &'a str,
        contact: &'a str,
        slot_id: &'a str,
    },
    VerifyPayment {
        razorpay_order_id: &'a str,
        razorpay_payment_id: &'a str,
        razorpay_signature: &'a str,
    },
}

#[derive(Deserialize)]
struct CreateOrderReply {
    success: bool,
    #[serde(default)]
    order: Option<PaymentOrder>,
    #[serde(default)]
    key_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct VerifyReply {
    success: bool,
    #[serde(default)]
    valid: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

/// Calls the payment function over HTTP.
#[derive(Clone)]
pub struct FunctionGatewayClient {
    http: reqwest::Client,
    function_url: String,
    api_key: String,
    session: Arc<SessionStore>,
}

impl FunctionGatewayClient {
    /// `function_url` is the full URL of the payment function.
    pub fn new(function_url: &str, api_key: &str, session: Arc<SessionStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            function_url: function_url.to_string(),
            api_key: api_key.to_string(),
            session,
        }
    }

    async fn invoke<T: for<'de> Deserialize<'de>>(
        &self,
        request: &FunctionRequest<'_>,
    ) -> Result<T, GatewayError> {
        let token = self
            .session
            .fresh_access_token()
            .await
            .unwrap_or_else(|| self.api_key.clone());

        let response = self
            .http
            .post(&self.function_url)
            .bearer_auth(token)
            .header("apikey", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        // Error replies still carry the {success, error} envelope
        serde_json::from_str(&body).map_err(|e| {
            GatewayError::Malformed(format!("HTTP {} with unreadable body: {}", status, e))
        })
    }
}

#[async_trait]
impl PaymentGateway for FunctionGatewayClient {
    async fn create_order(&self, request: &OrderRequest) -> Result<CreatedOrder, GatewayError> {
        let reply: CreateOrderReply = self
            .invoke(&FunctionRequest::CreateOrder {
                amount: request.amount,
                receipt: &request.receipt,
                name: &request.contact.name,
                email: &request.contact.email,
                contact: &request.contact.phone,
                slot_id: &request.slot_id,
            })
            .await?;

        if !reply.success {
            return Err(GatewayError::Rejected(
                reply
                    .error
                    .unwrap_or_else(|| "Failed to create order".to_string()),
            ));
        }

        match (reply.order, reply.key_id) {
            (Some(order), Some(key_id)) => Ok(CreatedOrder { order, key_id }),
            _ => Err(GatewayError::Malformed(
                "missing order or key_id".to_string(),
            )),
        }
    }

    async fn verify_payment(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<bool, GatewayError> {
        let reply: VerifyReply = self
            .invoke(&FunctionRequest::VerifyPayment {
                razorpay_order_id: &confirmation.razorpay_order_id,
                razorpay_payment_id: &confirmation.razorpay_payment_id,
                razorpay_signature: &confirmation.razorpay_signature,
            })
            .await?;

        if !reply.success {
            return Err(GatewayError::Rejected(
                reply
                    .error
                    .unwrap_or_else(|| "Verification request failed".to_string()),
            ));
        }

        Ok(reply.valid == Some(true))
    }
}
