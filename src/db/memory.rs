// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store used for tests and local development.

use crate::db::{BookingInsert, BookingStore, ProfileStore};
use crate::error::AppError;
use crate::models::{Booking, Profile, ProfileUpdate};
use crate::time_utils::now_rfc3339;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// DashMap-backed store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryDb {
    profiles: Arc<DashMap<String, Profile>>,
    /// Keyed by payment order id
    bookings: Arc<DashMap<String, Booking>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bookings.
    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    /// Remove a profile (simulates a partially failed sign-up).
    pub fn remove_profile(&self, id: &str) {
        self.profiles.remove(id);
    }
}

#[async_trait]
impl ProfileStore for MemoryDb {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, AppError> {
        Ok(self.profiles.get(id).map(|p| p.clone()))
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<(), AppError> {
        match self.profiles.entry(profile.id.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!("Profile {}", profile.id))),
            Entry::Vacant(slot) => {
                slot.insert(profile.clone());
                Ok(())
            }
        }
    }

    async fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
    ) -> Result<Profile, AppError> {
        let mut profile = self
            .profiles
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Profile {}", id)))?;
        update.apply_to(&mut profile, &now_rfc3339());
        Ok(profile.clone())
    }
}

#[async_trait]
impl BookingStore for MemoryDb {
    async fn insert_booking(&self, booking: &Booking) -> Result<BookingInsert, AppError> {
        match self.bookings.entry(booking.payment_order_id.clone()) {
            Entry::Occupied(existing) => Ok(BookingInsert::Duplicate(existing.get().clone())),
            Entry::Vacant(slot) => {
                slot.insert(booking.clone());
                Ok(BookingInsert::Inserted)
            }
        }
    }

    async fn find_by_payment_order(&self, order_id: &str) -> Result<Option<Booking>, AppError> {
        Ok(self.bookings.get(order_id).map(|b| b.clone()))
    }

    async fn list_bookings_for_user(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Booking>, AppError> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|b| b.user_id == user_id)
            .map(|b| b.clone())
            .collect();

        bookings.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(bookings
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}
