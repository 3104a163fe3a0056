// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider boundary.
//!
//! Credentials are verified by the provider, never locally. Every change
//! of auth state is published on a broadcast channel so the session store
//! can mirror it.

use crate::models::{AuthEvent, AuthEventKind, Identity, Session, TokenMaterial};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Buffered auth events per subscriber before it is considered lagging.
const EVENT_BUFFER: usize = 32;

/// Margin before expiry at which a stored session is refreshed (1 minute).
const SESSION_REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Message from the provider, passed through verbatim.
    #[error("{0}")]
    Rejected(String),

    #[error("Identity provider unreachable: {0}")]
    Transport(String),

    #[error("Malformed identity provider response: {0}")]
    Malformed(String),
}

/// Extra attributes recorded on the identity at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Operations the session store needs from the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Subscribe to auth-state changes. Events sent after this call are
    /// buffered for the receiver.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    /// Current session snapshot, refreshed if close to expiry.
    async fn get_session(&self) -> Result<Option<Session>, ProviderError>;

    /// Verify credentials. `remember` is handed to the provider's own
    /// session persistence.
    async fn sign_in(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<Session, ProviderError>;

    /// Create an identity. The account is not usable until the email is verified.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<Identity, ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Send a password reset email.
    async fn reset_password(&self, email: &str) -> Result<(), ProviderError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// GoTrue REST client
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

impl GoTrueUser {
    fn into_identity(self) -> Identity {
        let phone = self
            .user_metadata
            .phone
            .or(self.phone)
            .filter(|p| !p.is_empty());
        Identity {
            id: self.id,
            email: self.email.unwrap_or_default(),
            name: self.user_metadata.name.unwrap_or_default(),
            phone,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: GoTrueUser,
}

impl TokenResponse {
    fn into_session(self, remember: bool) -> Session {
        Session {
            identity: self.user.into_identity(),
            tokens: TokenMaterial {
                access_token: self.access_token,
                refresh_token: remember.then_some(self.refresh_token),
                expires_at: Utc::now().timestamp() + self.expires_in,
            },
        }
    }
}

/// Sign-up returns the bare user when email confirmation is required, or a
/// full token response when the project auto-confirms.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    WithSession { user: GoTrueUser },
    UserOnly(GoTrueUser),
}

/// Error body shapes used by the provider.
#[derive(Debug, Default, Deserialize)]
struct GoTrueErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl GoTrueErrorBody {
    fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}

/// HTTP client for a GoTrue-compatible identity provider.
#[derive(Clone)]
pub struct GoTrueClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    session: Arc<Mutex<Option<Session>>>,
    events: broadcast::Sender<AuthEvent>,
}

impl GoTrueClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            session: Arc::new(Mutex::new(None)),
            events,
        }
    }

    fn stored_session(&self) -> Option<Session> {
        self.session.lock().ok().and_then(|s| s.clone())
    }

    fn store_and_publish(&self, kind: AuthEventKind, session: Option<Session>) {
        if let Ok(mut stored) = self.session.lock() {
            *stored = session.clone();
        }
        // No receivers is fine
        let _ = self.events.send(AuthEvent::new(kind, session));
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Exchange the stored refresh token for a new session.
    pub async fn refresh_session(&self) -> Result<Option<Session>, ProviderError> {
        let Some(refresh_token) = self
            .stored_session()
            .and_then(|s| s.tokens.refresh_token)
        else {
            return Ok(None);
        };

        let response = self
            .http
            .post(self.url("token?grant_type=refresh_token"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        match Self::check_response_json::<TokenResponse>(response).await {
            Ok(tokens) => {
                let session = tokens.into_session(true);
                tracing::debug!(user_id = %session.identity.id, "Session refreshed");
                self.store_and_publish(AuthEventKind::TokenRefreshed, Some(session.clone()));
                Ok(Some(session))
            }
            Err(ProviderError::Rejected(msg)) => {
                // Refresh token revoked or reused: the session is gone
                tracing::info!(error = %msg, "Session refresh rejected, signing out locally");
                self.store_and_publish(AuthEventKind::SignedOut, None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn check_response(response: reqwest::Response) -> Result<String, ProviderError> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            return Ok(body);
        }

        if status.is_server_error() {
            return Err(ProviderError::Transport(format!("HTTP {}", status)));
        }

        let message = serde_json::from_str::<GoTrueErrorBody>(&body)
            .ok()
            .and_then(GoTrueErrorBody::into_message)
            .unwrap_or_else(|| format!("Request failed with status {}", status));
        Err(ProviderError::Rejected(message))
    }

    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let body = Self::check_response(response).await?;
        serde_json::from_str(&body).map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl IdentityProvider for GoTrueClient {
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn get_session(&self) -> Result<Option<Session>, ProviderError> {
        let Some(session) = self.stored_session() else {
            return Ok(None);
        };

        if Utc::now().timestamp() + SESSION_REFRESH_MARGIN_SECS < session.tokens.expires_at {
            return Ok(Some(session));
        }

        if session.tokens.refresh_token.is_none() {
            // Not remembered: the session ends with its access token
            self.store_and_publish(AuthEventKind::SignedOut, None);
            return Ok(None);
        }

        self.refresh_session().await
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<Session, ProviderError> {
        let response = self
            .http
            .post(self.url("token?grant_type=password"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let session = Self::check_response_json::<TokenResponse>(response)
            .await?
            .into_session(remember);

        tracing::info!(user_id = %session.identity.id, remember, "Signed in");
        self.store_and_publish(AuthEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<Identity, ProviderError> {
        let response = self
            .http
            .post(self.url("signup"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": metadata,
            }))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let user = match Self::check_response_json::<SignUpResponse>(response).await? {
            SignUpResponse::WithSession { user } => user,
            SignUpResponse::UserOnly(user) => user,
        };

        let identity = user.into_identity();
        tracing::info!(user_id = %identity.id, "Identity created, verification pending");
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let token = self.stored_session().map(|s| s.tokens.access_token);

        // Local state is cleared regardless of what the provider says
        self.store_and_publish(AuthEventKind::SignedOut, None);

        let Some(token) = token else {
            return Ok(());
        };

        let response = self
            .http
            .post(self.url("logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Self::check_response(response).await.map(|_| ())
    }

    async fn reset_password(&self, email: &str) -> Result<(), ProviderError> {
        let response = self
            .http
            .post(self.url("recover"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Self::check_response(response).await.map(|_| ())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory provider for tests and offline development
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct MockAccount {
    identity: Identity,
    password: String,
}

/// In-memory identity provider.
///
/// Accounts are created verified. Access tokens are opaque strings.
#[derive(Clone)]
pub struct MockIdentityProvider {
    accounts: Arc<Mutex<HashMap<String, MockAccount>>>,
    session: Arc<Mutex<Option<Session>>>,
    events: broadcast::Sender<AuthEvent>,
    fail_sign_out: bool,
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            accounts: Arc::new(Mutex::new(HashMap::new())),
            session: Arc::new(Mutex::new(None)),
            events,
            fail_sign_out: false,
        }
    }

    /// Make `sign_out` report a transport error (local state still clears).
    pub fn with_failing_sign_out(mut self) -> Self {
        self.fail_sign_out = true;
        self
    }

    /// Register an account directly.
    pub fn add_account(&self, identity: Identity, password: &str) {
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.insert(
                identity.email.to_lowercase(),
                MockAccount {
                    identity,
                    password: password.to_string(),
                },
            );
        }
    }

    /// Start with an existing session, as if restored from storage.
    pub fn with_session(self, session: Session) -> Self {
        if let Ok(mut stored) = self.session.lock() {
            *stored = Some(session);
        }
        self
    }

    /// Publish an event as if it came from another tab or a token refresh.
    pub fn emit(&self, kind: AuthEventKind, session: Option<Session>) {
        if let Ok(mut stored) = self.session.lock() {
            *stored = session.clone();
        }
        let _ = self.events.send(AuthEvent::new(kind, session));
    }

    pub fn session_for(identity: &Identity) -> Session {
        Session {
            identity: identity.clone(),
            tokens: TokenMaterial {
                access_token: format!("token-{}", identity.id),
                refresh_token: Some(format!("refresh-{}", identity.id)),
                expires_at: Utc::now().timestamp() + 3600,
            },
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn get_session(&self) -> Result<Option<Session>, ProviderError> {
        Ok(self.session.lock().ok().and_then(|s| s.clone()))
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
        _remember: bool,
    ) -> Result<Session, ProviderError> {
        let account = self
            .accounts
            .lock()
            .ok()
            .and_then(|a| a.get(&email.to_lowercase()).cloned())
            .filter(|a| a.password == password)
            .ok_or_else(|| ProviderError::Rejected("Invalid login credentials".to_string()))?;

        let session = Self::session_for(&account.identity);
        self.emit(AuthEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<Identity, ProviderError> {
        let key = email.to_lowercase();
        let mut accounts = self
            .accounts
            .lock()
            .map_err(|_| ProviderError::Transport("account store poisoned".to_string()))?;

        if accounts.contains_key(&key) {
            return Err(ProviderError::Rejected("User already registered".to_string()));
        }

        let identity = Identity {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: metadata.name.clone(),
            phone: metadata.phone.clone(),
        };
        accounts.insert(
            key,
            MockAccount {
                identity: identity.clone(),
                password: password.to_string(),
            },
        );
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.emit(AuthEventKind::SignedOut, None);
        if self.fail_sign_out {
            return Err(ProviderError::Transport("connection reset".to_string()));
        }
        Ok(())
    }

    async fn reset_password(&self, email: &str) -> Result<(), ProviderError> {
        tracing::debug!(email, "Mock password reset requested");
        Ok(())
    }
}
