// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Slotbook: sports-facility slot booking with gateway-verified payments
//!
//! This crate provides the session store and booking coordinator used by
//! clients, plus the backend API: the trusted payment function and the
//! authenticated profile and booking-history routes.

pub mod client;
pub mod config;
pub mod contact;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{BookingStore, ProfileStore};
use services::{RazorpayClient, SlotCatalog};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub profiles: Arc<dyn ProfileStore>,
    pub bookings: Arc<dyn BookingStore>,
    /// None when gateway credentials are not configured
    pub razorpay: Option<RazorpayClient>,
    /// Enables server-side price checks when present
    pub catalog: Option<Arc<dyn SlotCatalog>>,
}
