// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Slotbook API Server
//!
//! Serves the trusted payment function and the authenticated profile and
//! booking-history API.

use slotbook::{
    config::Config,
    db::{BookingStore, FirestoreDb, MemoryDb, ProfileStore},
    services::{RazorpayClient, SlotCatalog, StaticCatalog},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Slotbook API");

    // Storage: Firestore when a project is configured, otherwise in-memory
    let (profiles, bookings): (Arc<dyn ProfileStore>, Arc<dyn BookingStore>) =
        match &config.gcp_project_id {
            Some(project_id) => {
                let db = FirestoreDb::new(project_id).await?;
                tracing::info!(project = %project_id, "Firestore connected");
                (Arc::new(db.clone()), Arc::new(db))
            }
            None => {
                tracing::warn!("GCP_PROJECT_ID not set, using in-memory store");
                let db = MemoryDb::new();
                (Arc::new(db.clone()), Arc::new(db))
            }
        };

    // Load slot catalog for server-side price checks
    let catalog: Option<Arc<dyn SlotCatalog>> = match &config.catalog_path {
        Some(path) => {
            tracing::info!(path = %path, "Loading slot catalog");
            let catalog = StaticCatalog::load_from_file(path)?;
            tracing::info!(count = catalog.slot_count(), "Slot catalog loaded");
            Some(Arc::new(catalog))
        }
        None => None,
    };

    let razorpay = match config.razorpay_credentials() {
        Some((key_id, key_secret)) => {
            tracing::info!(key_id, "Payment gateway configured");
            Some(RazorpayClient::new(
                &config.razorpay_api_url,
                key_id,
                key_secret,
            ))
        }
        None => {
            tracing::warn!("Gateway credentials missing, payment function will fail closed");
            None
        }
    };

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        profiles,
        bookings,
        razorpay,
        catalog,
    });

    // Build router
    let app = slotbook::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("slotbook=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
