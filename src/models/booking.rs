//! Booking model for storage and API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Booking lifecycle status. Only `Confirmed` is ever written by the
/// booking flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

/// A persisted reservation, stored in the `bookings` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub center_name: String,
    pub sport_type: String,
    pub booking_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    /// Whole currency units
    pub amount: u32,
    pub status: BookingStatus,
    /// Gateway order id; unique per booking (idempotency key)
    pub payment_order_id: String,
    pub payment_id: String,
    pub slot_id: String,
    /// RFC3339
    pub created_at: String,
}
