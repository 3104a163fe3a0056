// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client-side wiring.
//!
//! One `ClientContext` owns the live session for a process or tab and is
//! passed to whatever drives the booking screens.

use crate::config::{Config, ConfigError};
use crate::db::{BookingStore, ProfileStore};
use crate::routes::payment::FUNCTION_PATH;
use crate::services::booking::BookingCoordinator;
use crate::services::identity::GoTrueClient;
use crate::services::notify::Notifier;
use crate::services::payment::FunctionGatewayClient;
use crate::services::profile::ProfileRepository;
use crate::services::session::{SessionListener, SessionStore};
use crate::services::{SlotCatalog, SlotHolds};
use std::sync::Arc;
use std::time::Duration;

/// Storage and presentation collaborators supplied by the embedding app.
pub struct ClientDeps {
    pub profiles: Arc<dyn ProfileStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub catalog: Arc<dyn SlotCatalog>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct ClientContext {
    pub session: Arc<SessionStore>,
    pub coordinator: BookingCoordinator,
    listener: Option<SessionListener>,
}

impl ClientContext {
    /// Build the context. Requires `AUTH_URL` and `AUTH_API_KEY`; the
    /// payment function is reached under the same base URL.
    pub fn from_config(config: &Config, deps: ClientDeps) -> Result<Self, ConfigError> {
        let auth_url = config
            .auth_url
            .as_deref()
            .ok_or(ConfigError::Missing("AUTH_URL"))?;
        let api_key = config
            .auth_api_key
            .as_deref()
            .ok_or(ConfigError::Missing("AUTH_API_KEY"))?;

        let session = SessionStore::new(
            Arc::new(GoTrueClient::new(auth_url, api_key)),
            ProfileRepository::new(deps.profiles),
            deps.notifier.clone(),
        );

        let function_url = format!("{}{}", auth_url.trim_end_matches('/'), FUNCTION_PATH);
        let gateway = FunctionGatewayClient::new(&function_url, api_key, session.clone());

        let coordinator = BookingCoordinator::new(
            deps.catalog,
            Arc::new(gateway),
            deps.bookings,
            SlotHolds::new(Duration::from_secs(config.slot_hold_secs)),
            deps.notifier,
        );

        Ok(Self {
            session,
            coordinator,
            listener: None,
        })
    }

    /// Start mirroring the identity provider. Calling again restarts the
    /// subscription.
    pub async fn start(&mut self) {
        self.listener = Some(self.session.initialize().await);
    }

    /// Stop mirroring; the last snapshot stays readable.
    pub fn stop(&mut self) {
        self.listener = None;
    }

    pub fn is_running(&self) -> bool {
        self.listener.is_some()
    }
}
