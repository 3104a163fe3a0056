//! Profile model for storage and API.

use serde::{Deserialize, Serialize};

use crate::models::Identity;

/// Authorization role. Only ever read from the stored profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// User profile stored in the `profiles` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Identity ID (also used as document ID)
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Role,
    /// When the profile was created (RFC3339)
    pub created_at: String,
    /// Last profile change (RFC3339)
    pub updated_at: String,
}

impl Profile {
    /// Build the initial profile for a freshly created identity.
    pub fn for_identity(identity: &Identity, now: &str) -> Self {
        Self {
            id: identity.id.clone(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            phone: identity.phone.clone(),
            role: Role::User,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// User-editable subset of a profile. Role is deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none()
    }

    /// Apply the present fields to `profile`.
    pub fn apply_to(&self, profile: &mut Profile, now: &str) {
        if let Some(name) = &self.name {
            profile.name = name.clone();
        }
        if let Some(phone) = &self.phone {
            profile.phone = Some(phone.clone());
        }
        profile.updated_at = now.to_string();
    }
}
