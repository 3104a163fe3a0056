//! Storage boundary for profiles and bookings.
//!
//! The booking flow and session store only see the traits below. Firestore
//! backs them in production; `MemoryDb` backs tests and local runs.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{Booking, Profile, ProfileUpdate};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const PROFILES: &str = "profiles";
    /// Keyed by gateway order id
    pub const BOOKINGS: &str = "bookings";
}

/// Outcome of an idempotent booking insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingInsert {
    Inserted,
    /// A booking for the same gateway order already exists; nothing was written.
    Duplicate(Booking),
}

/// Profile records, one per identity, keyed by identity id.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, AppError>;

    /// Insert a new profile. Fails with `AppError::Conflict` if one exists.
    async fn insert_profile(&self, profile: &Profile) -> Result<(), AppError>;

    /// Apply a partial update and return the stored result.
    /// Fails with `AppError::NotFound` if there is no profile.
    async fn update_profile(&self, id: &str, update: &ProfileUpdate)
        -> Result<Profile, AppError>;
}

/// Append-mostly booking records.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert a booking unless one already exists for its payment order.
    async fn insert_booking(&self, booking: &Booking) -> Result<BookingInsert, AppError>;

    async fn find_by_payment_order(&self, order_id: &str) -> Result<Option<Booking>, AppError>;

    /// Bookings for a user, newest first.
    async fn list_bookings_for_user(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Booking>, AppError>;
}
