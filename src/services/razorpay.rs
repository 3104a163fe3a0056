// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Razorpay API client for the trusted side of the payment flow.
//!
//! Handles:
//! - Order creation (amounts converted to paise here, never by the caller)
//! - Payment signature verification with the key secret
//!
//! The key secret lives only in this client. It is never serialized.

use crate::error::AppError;
use crate::models::{PaymentConfirmation, PaymentOrder};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Only currency the academy charges in.
pub const CURRENCY: &str = "INR";

/// Minor units per major unit (paise per rupee).
pub const MINOR_UNITS: u64 = 100;

/// Convert whole rupees to paise.
pub fn to_minor_units(amount: u64) -> u64 {
    amount * MINOR_UNITS
}

/// Notes attached to an order for reconciliation in the gateway dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct OrderNotes {
    pub name: String,
    pub email: String,
    pub contact: String,
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: u64,
    currency: &'a str,
    receipt: &'a str,
    notes: &'a OrderNotes,
}

/// Error envelope returned by the gateway on 4xx/5xx.
#[derive(Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetail,
}

#[derive(Deserialize)]
struct GatewayErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

/// Razorpay API client.
#[derive(Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("base_url", &self.base_url)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl RazorpayClient {
    /// Create a new client with API credentials.
    pub fn new(base_url: &str, key_id: &str, key_secret: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
        }
    }

    /// Public key id, safe to hand to the checkout widget.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Create an order for `amount` whole rupees.
    ///
    /// Every call creates a new gateway order; callers must not retry blindly.
    pub async fn create_order(
        &self,
        amount: u64,
        receipt: &str,
        notes: &OrderNotes,
    ) -> Result<PaymentOrder, AppError> {
        if amount == 0 {
            return Err(AppError::BadRequest(
                "Amount must be a positive number of rupees".to_string(),
            ));
        }

        let url = format!("{}/orders", self.base_url);
        let body = CreateOrderBody {
            amount: to_minor_units(amount),
            currency: CURRENCY,
            receipt,
            notes,
        };

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Order request failed: {}", e)))?;

        let order: PaymentOrder = self.check_response_json(response).await?;

        tracing::info!(
            order_id = %order.id,
            amount = order.amount,
            receipt,
            "Gateway order created"
        );

        Ok(order)
    }

    /// Check a checkout completion against the key secret.
    pub fn verify_payment(&self, confirmation: &PaymentConfirmation) -> bool {
        verify_payment_signature(
            self.key_secret.as_bytes(),
            &confirmation.razorpay_order_id,
            &confirmation.razorpay_payment_id,
            &confirmation.razorpay_signature,
        )
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 {
                tracing::error!("Gateway rejected API credentials");
                return Err(AppError::Gateway("Gateway authentication failed".to_string()));
            }

            let detail = serde_json::from_str::<GatewayErrorBody>(&body)
                .map(|b| format!("{}: {}", b.error.code, b.error.description))
                .unwrap_or(body);

            return Err(AppError::Gateway(format!("HTTP {}: {}", status, detail)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Malformed gateway response: {}", e)))
    }
}

/// Hex HMAC-SHA256 of `order_id|payment_id`, as the gateway signs it.
pub fn sign_payment(secret: &[u8], order_id: &str, payment_id: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// True only if `signature` is exactly the expected hex digest.
pub fn verify_payment_signature(
    secret: &[u8],
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    match sign_payment(secret, order_id, payment_id) {
        Some(expected) => expected.as_bytes().ct_eq(signature.as_bytes()).into(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test_key_secret";

    #[test]
    fn test_signature_round_trip() {
        let sig = sign_payment(SECRET, "order_ABC", "pay_XYZ").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(verify_payment_signature(SECRET, "order_ABC", "pay_XYZ", &sig));
    }

    #[test]
    fn test_single_character_mutation_fails() {
        let sig = sign_payment(SECRET, "order_ABC", "pay_XYZ").unwrap();

        for i in 0..sig.len() {
            let mut bytes = sig.clone().into_bytes();
            bytes[i] = if bytes[i] == b'0' { b'1' } else { b'0' };
            let mutated = String::from_utf8(bytes).unwrap();
            assert!(
                !verify_payment_signature(SECRET, "order_ABC", "pay_XYZ", &mutated),
                "mutation at {} accepted",
                i
            );
        }
    }

    #[test]
    fn test_wrong_inputs_fail() {
        let sig = sign_payment(SECRET, "order_ABC", "pay_XYZ").unwrap();
        assert!(!verify_payment_signature(b"other", "order_ABC", "pay_XYZ", &sig));
        assert!(!verify_payment_signature(SECRET, "order_ABD", "pay_XYZ", &sig));
        assert!(!verify_payment_signature(SECRET, "order_ABC", "pay_XYZ", ""));
        assert!(!verify_payment_signature(
            SECRET,
            "order_ABC",
            "pay_XYZ",
            &sig.to_uppercase()
        ));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(500), 50_000);
        assert_eq!(to_minor_units(1), 100);
    }

    #[test]
    fn test_debug_hides_secret() {
        let client = RazorpayClient::new("http://localhost", "rzp_test", "super_secret");
        assert!(!format!("{:?}", client).contains("super_secret"));
    }
}
