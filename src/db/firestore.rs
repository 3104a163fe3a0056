// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Profiles (one document per identity id)
//! - Bookings (one document per gateway order id)

use crate::db::{collections, BookingInsert, BookingStore, ProfileStore};
use crate::error::AppError;
use crate::models::{Booking, Profile, ProfileUpdate};
use crate::time_utils::now_rfc3339;
use async_trait::async_trait;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .document_id(&profile.id)
            .object(profile)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for FirestoreDb {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create-only: an existing document is reported as a conflict and left
    /// untouched, so a lazy repair never overwrites a concurrent sign-up.
    async fn insert_profile(&self, profile: &Profile) -> Result<(), AppError> {
        let result: Result<Profile, _> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::PROFILES)
            .document_id(&profile.id)
            .object(profile)
            .execute()
            .await;

        match result {
            Ok(_) => {
                tracing::info!(user_id = %profile.id, "Profile created");
                Ok(())
            }
            Err(e) if is_already_exists(&e) => {
                Err(AppError::Conflict(format!("Profile {}", profile.id)))
            }
            Err(e) => Err(AppError::Database(format!("Failed to create profile: {}", e))),
        }
    }

    async fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
    ) -> Result<Profile, AppError> {
        // Fetch-modify-write to preserve fields not in the update
        let mut profile = self
            .get_profile(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile {}", id)))?;

        update.apply_to(&mut profile, &now_rfc3339());
        self.upsert_profile(&profile).await?;
        Ok(profile)
    }
}

#[async_trait]
impl BookingStore for FirestoreDb {
    /// The document id is the gateway order id and the write is create-only,
    /// so of two racing verification callbacks exactly one stores a booking
    /// and the other gets it back as a duplicate.
    async fn insert_booking(&self, booking: &Booking) -> Result<BookingInsert, AppError> {
        let order_id = booking.payment_order_id.as_str();

        let result: Result<Booking, _> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::BOOKINGS)
            .document_id(order_id)
            .object(booking)
            .execute()
            .await;

        match result {
            Ok(_) => {
                tracing::info!(
                    order_id,
                    booking_id = %booking.id,
                    user_id = %booking.user_id,
                    "Booking stored"
                );
                Ok(BookingInsert::Inserted)
            }
            Err(e) if is_already_exists(&e) => {
                let existing = self.find_by_payment_order(order_id).await?.ok_or_else(|| {
                    AppError::Database(format!("Booking for order {} vanished", order_id))
                })?;
                tracing::info!(
                    order_id,
                    booking_id = %existing.id,
                    "Booking already recorded for order (idempotent skip)"
                );
                Ok(BookingInsert::Duplicate(existing))
            }
            Err(e) => Err(AppError::Database(format!("Failed to store booking: {}", e))),
        }
    }

    async fn find_by_payment_order(&self, order_id: &str) -> Result<Option<Booking>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::BOOKINGS)
            .obj()
            .one(order_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_bookings_for_user(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Booking>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::BOOKINGS)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .order_by([("created_at", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .offset(offset)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// Firestore reports a create over an existing document as a data conflict.
fn is_already_exists(err: &firestore::errors::FirestoreError) -> bool {
    matches!(err, firestore::errors::FirestoreError::DataConflictError(_))
}
