// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity and session types mirrored from the identity provider.

use serde::{Deserialize, Serialize};

/// Authenticated principal, owned by the identity provider.
///
/// The copy held here is read-only; it is replaced wholesale whenever the
/// provider reports a new auth state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    /// Display name from sign-up metadata (may be empty)
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Raw token material issued by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMaterial {
    pub access_token: String,
    /// Absent when the session was not meant to be remembered
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds)
    pub expires_at: i64,
}

/// A live provider session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub identity: Identity,
    pub tokens: TokenMaterial,
}

/// Kind of auth-state change reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// One auth-state change: the kind plus the full replacement session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn new(kind: AuthEventKind, session: Option<Session>) -> Self {
        Self { kind, session }
    }
}
