// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile repository: the bridge between callers and the profile store.
//!
//! Reads collapse every failure to `None`; writes collapse to a success
//! flag plus a message for the user.

use crate::contact::normalize_phone;
use crate::contact::PHONE_DIGITS;
use crate::db::ProfileStore;
use crate::error::AppError;
use crate::models::{Identity, Profile, ProfileUpdate};
use crate::time_utils::now_rfc3339;
use std::sync::Arc;

/// Result of a profile write as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileWrite {
    pub success: bool,
    pub message: String,
}

impl ProfileWrite {
    fn ok() -> Self {
        Self {
            success: true,
            message: "Profile updated successfully!".to_string(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Clone)]
pub struct ProfileRepository {
    store: Arc<dyn ProfileStore>,
}

impl ProfileRepository {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// Fetch a profile. Missing rows and read errors both yield `None`.
    pub async fn fetch_profile(&self, identity_id: &str) -> Option<Profile> {
        match self.store.get_profile(identity_id).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(user_id = identity_id, error = %e, "Profile fetch failed");
                None
            }
        }
    }

    /// Apply a partial update after normalizing it.
    pub async fn update_profile(&self, identity_id: &str, update: &ProfileUpdate) -> ProfileWrite {
        let update = match normalize_update(update) {
            Ok(update) => update,
            Err(message) => return ProfileWrite::failed(message),
        };

        match self.store.update_profile(identity_id, &update).await {
            Ok(_) => ProfileWrite::ok(),
            Err(AppError::NotFound(_)) => ProfileWrite::failed("Profile not found"),
            Err(e) => {
                tracing::error!(user_id = identity_id, error = %e, "Profile update failed");
                ProfileWrite::failed("An error occurred while updating your profile")
            }
        }
    }

    /// Create the profile for a new identity. Conflicts mean it already exists.
    pub async fn create_profile(&self, profile: &Profile) -> Result<(), AppError> {
        match self.store.insert_profile(profile).await {
            Err(e) if e.is_conflict() => {
                tracing::debug!(user_id = %profile.id, "Profile already exists");
                Ok(())
            }
            other => other,
        }
    }

    /// Return the identity's profile, creating it from the identity's
    /// sign-up metadata if the row is missing.
    pub async fn ensure_profile(&self, identity: &Identity) -> Result<Profile, AppError> {
        if let Some(profile) = self.store.get_profile(&identity.id).await? {
            return Ok(profile);
        }

        tracing::warn!(
            user_id = %identity.id,
            "Authenticated identity has no profile, repairing"
        );
        self.create_profile(&Profile::for_identity(identity, &now_rfc3339()))
            .await?;

        self.store
            .get_profile(&identity.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile {}", identity.id)))
    }

    /// `ensure_profile` with failures collapsed to `None`.
    pub async fn load_or_repair(&self, identity: &Identity) -> Option<Profile> {
        match self.ensure_profile(identity).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::error!(user_id = %identity.id, error = %e, "Profile unavailable");
                None
            }
        }
    }
}

/// Validate and normalize a user-supplied update.
pub fn normalize_update(update: &ProfileUpdate) -> Result<ProfileUpdate, &'static str> {
    if update.is_empty() {
        return Err("Nothing to update");
    }

    let name = match &update.name {
        Some(name) if name.trim().is_empty() => return Err("Name cannot be empty"),
        Some(name) => Some(name.trim().to_string()),
        None => None,
    };

    let phone = match &update.phone {
        Some(raw) => {
            let phone = normalize_phone(raw);
            if phone.len() < PHONE_DIGITS {
                return Err("Please enter a valid phone number");
            }
            Some(phone)
        }
        None => None,
    };

    Ok(ProfileUpdate { name, phone })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use crate::models::Role;

    fn identity() -> Identity {
        Identity {
            id: "u1".to_string(),
            email: "asha@example.com".to_string(),
            name: "Asha Rao".to_string(),
            phone: Some("9876543210".to_string()),
        }
    }

    #[tokio::test]
    async fn test_update_then_fetch_round_trip() {
        let db = MemoryDb::new();
        let repo = ProfileRepository::new(Arc::new(db));
        repo.create_profile(&Profile::for_identity(&identity(), "2026-10-19T10:00:00.000Z"))
            .await
            .unwrap();

        let write = repo
            .update_profile(
                "u1",
                &ProfileUpdate {
                    name: Some("Asha R.".to_string()),
                    phone: Some("91234-56789".to_string()),
                },
            )
            .await;
        assert!(write.success, "{}", write.message);

        let profile = repo.fetch_profile("u1").await.unwrap();
        assert_eq!(profile.name, "Asha R.");
        assert_eq!(profile.phone.as_deref(), Some("9123456789"));
        assert_eq!(profile.role, Role::User);
    }

    #[tokio::test]
    async fn test_update_missing_profile_reports_failure() {
        let repo = ProfileRepository::new(Arc::new(MemoryDb::new()));
        let write = repo
            .update_profile(
                "ghost",
                &ProfileUpdate {
                    name: Some("Ghost".to_string()),
                    phone: None,
                },
            )
            .await;
        assert!(!write.success);
        assert_eq!(write.message, "Profile not found");
    }

    #[tokio::test]
    async fn test_invalid_update_never_reaches_store() {
        let repo = ProfileRepository::new(Arc::new(MemoryDb::new()));
        let write = repo
            .update_profile(
                "u1",
                &ProfileUpdate {
                    name: None,
                    phone: Some("12345".to_string()),
                },
            )
            .await;
        assert!(!write.success);
        assert_eq!(write.message, "Please enter a valid phone number");
    }

    #[tokio::test]
    async fn test_ensure_profile_repairs_missing_row() {
        let db = MemoryDb::new();
        let repo = ProfileRepository::new(Arc::new(db.clone()));

        let profile = repo.ensure_profile(&identity()).await.unwrap();
        assert_eq!(profile.id, "u1");
        assert_eq!(profile.name, "Asha Rao");
        assert_eq!(profile.role, Role::User);

        // Second call reads the same row
        let again = repo.ensure_profile(&identity()).await.unwrap();
        assert_eq!(again, profile);
    }
}
