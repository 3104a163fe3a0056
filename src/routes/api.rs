// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Booking, BookingStatus, Profile, ProfileUpdate, Role};
use crate::services::profile::{normalize_update, ProfileRepository};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, patch},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/profile", patch(update_profile))
        .route("/api/bookings", get(get_bookings))
}

// ─── Profile ─────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfileResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "\"user\" | \"admin\""))]
    pub role: Role,
    pub created_at: String,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            name: profile.name,
            email: profile.email,
            phone: profile.phone,
            role: profile.role,
            created_at: profile.created_at,
        }
    }
}

/// Get the caller's profile, creating it if sign-up left it missing.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ProfileResponse>> {
    let repo = ProfileRepository::new(state.profiles.clone());
    let profile = repo.ensure_profile(&user.to_identity()).await?;
    Ok(Json(profile.into()))
}

/// Apply `{name?, phone?}` and return the stored profile.
async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>> {
    let update = normalize_update(&update).map_err(|msg| AppError::BadRequest(msg.to_string()))?;

    tracing::info!(user_id = %user.user_id, "Updating profile");
    let profile = state.profiles.update_profile(&user.user_id, &update).await?;
    Ok(Json(profile.into()))
}

// ─── Booking History ─────────────────────────────────────────

#[derive(Deserialize)]
struct BookingsQuery {
    /// Pagination: page number (1-indexed)
    #[serde(default = "default_page")]
    page: u32,
    /// Pagination: items per page
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_page() -> u32 {
    1
}
fn default_per_page() -> u32 {
    20
}

const MAX_PER_PAGE: u32 = 100;

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BookingSummary {
    pub id: String,
    pub center_name: String,
    pub sport_type: String,
    pub booking_date: String,
    pub start_time: String,
    pub end_time: String,
    pub amount: u32,
    #[cfg_attr(
        feature = "binding-generation",
        ts(type = "\"pending\" | \"confirmed\" | \"cancelled\"")
    )]
    pub status: BookingStatus,
    pub created_at: String,
}

impl From<Booking> for BookingSummary {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            center_name: b.center_name,
            sport_type: b.sport_type,
            booking_date: b.booking_date.format("%Y-%m-%d").to_string(),
            start_time: b.start_time,
            end_time: b.end_time,
            amount: b.amount,
            status: b.status,
            created_at: b.created_at,
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BookingsResponse {
    pub bookings: Vec<BookingSummary>,
    pub page: u32,
    pub per_page: u32,
    /// True if another page may follow
    pub has_more: bool,
}

/// The caller's bookings, newest first.
async fn get_bookings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<BookingsQuery>,
) -> Result<Json<BookingsResponse>> {
    if params.page < 1 {
        return Err(AppError::BadRequest("Page must be greater than 0".to_string()));
    }

    let limit = params.per_page.clamp(1, MAX_PER_PAGE);
    let offset = (params.page - 1)
        .checked_mul(limit)
        .ok_or_else(|| AppError::BadRequest("Page number causes overflow".to_string()))?;

    tracing::debug!(
        user_id = %user.user_id,
        page = params.page,
        per_page = limit,
        "Fetching bookings"
    );

    // Fetch one extra item to determine if another page is available
    let mut bookings = state
        .bookings
        .list_bookings_for_user(&user.user_id, limit.saturating_add(1), offset)
        .await?;

    let has_more = bookings.len() > limit as usize;
    bookings.truncate(limit as usize);

    Ok(Json(BookingsResponse {
        bookings: bookings.into_iter().map(BookingSummary::from).collect(),
        page: params.page,
        per_page: limit,
        has_more,
    }))
}
