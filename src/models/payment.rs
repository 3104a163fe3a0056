// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment order and checkout types.

use serde::{Deserialize, Serialize};

/// Gateway order created for a single payment attempt. Never stored on its
/// own; its id ends up on the resulting booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub id: String,
    /// Minor currency units
    pub amount: u64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
}

/// An order plus the public key id the checkout widget needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedOrder {
    pub order: PaymentOrder,
    pub key_id: String,
}

/// Identifiers the checkout widget hands back on completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// Contact details attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    /// Digits only
    pub phone: String,
    pub email: String,
}
