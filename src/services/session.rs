// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity session store.
//!
//! Holds the single live view of who is signed in, mirrored from the
//! identity provider's event stream, plus the profile loaded for that
//! identity. Snapshots are published on a `watch` channel so any number of
//! views can follow them.
//!
//! Lifecycle: `SessionStore::new` starts in the loading state,
//! `initialize` subscribes to the provider and resolves the first
//! snapshot, and dropping the returned `SessionListener` tears the
//! subscription down.

use crate::contact::{normalize_phone, PHONE_DIGITS};
use crate::models::{AuthEvent, AuthEventKind, Identity, Profile, ProfileUpdate, Session};
use crate::services::identity::{IdentityProvider, ProviderError, SignUpMetadata};
use crate::services::notify::{Notice, Notifier};
use crate::services::profile::ProfileRepository;
use crate::time_utils::now_rfc3339;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Point-in-time view of the auth state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    /// True until the first provider snapshot resolves
    pub is_loading: bool,
}

impl AuthSnapshot {
    fn loading() -> Self {
        Self {
            session: None,
            profile: None,
            is_loading: true,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(|s| &s.identity)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

/// Outcome of a protected-route check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// Auth state not yet known; show a loading state
    Pending,
    Granted,
    RedirectToLogin,
}

/// Outcome of an admin-route check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAccess {
    Pending,
    Granted,
    Denied,
}

pub fn route_access(snapshot: &AuthSnapshot) -> RouteAccess {
    if snapshot.is_loading {
        RouteAccess::Pending
    } else if snapshot.is_authenticated() {
        RouteAccess::Granted
    } else {
        RouteAccess::RedirectToLogin
    }
}

/// Admin access is decided from the profile role only. The identity
/// carries no role, so an authenticated user without a loaded profile is
/// still pending.
pub fn admin_access(snapshot: &AuthSnapshot) -> AdminAccess {
    if snapshot.is_loading || (snapshot.is_authenticated() && snapshot.profile.is_none()) {
        return AdminAccess::Pending;
    }

    match &snapshot.profile {
        Some(profile) if profile.is_admin() => AdminAccess::Granted,
        _ => AdminAccess::Denied,
    }
}

/// Admin gate that tells the user about a denial once per session rather
/// than on every check.
pub struct AdminGuard {
    notifier: Arc<dyn Notifier>,
    last_denied: Mutex<Option<String>>,
}

impl AdminGuard {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            last_denied: Mutex::new(None),
        }
    }

    pub fn check(&self, snapshot: &AuthSnapshot) -> AdminAccess {
        let access = admin_access(snapshot);
        if access != AdminAccess::Denied {
            return access;
        }

        let key = snapshot
            .identity()
            .map(|i| i.id.clone())
            .unwrap_or_default();

        if let Ok(mut last) = self.last_denied.lock() {
            if last.as_deref() != Some(key.as_str()) {
                *last = Some(key);
                self.notifier
                    .notify(Notice::error("You don't have admin access"));
            }
        }

        access
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("You must be logged in")]
    NotAuthenticated,

    #[error("{0}")]
    ProfileUpdate(String),

    #[error("{0}")]
    Validation(String),
}

impl AuthError {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Provider(_) => "provider_error",
            AuthError::NotAuthenticated => "not_authenticated",
            AuthError::ProfileUpdate(_) => "profile_update_failed",
            AuthError::Validation(_) => "validation_error",
        }
    }
}

/// Where the caller goes after a successful sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignupOutcome {
    /// The identity exists but cannot be used until the email is verified
    VerificationPending { email: String },
}

/// Keeps the provider subscription alive. Dropping it stops mirroring.
pub struct SessionListener {
    task: JoinHandle<()>,
}

impl Drop for SessionListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct SessionStore {
    state: watch::Sender<AuthSnapshot>,
    /// Serializes event application so snapshots never interleave
    apply_lock: tokio::sync::Mutex<()>,
    provider: Arc<dyn IdentityProvider>,
    profiles: ProfileRepository,
    notifier: Arc<dyn Notifier>,
}

impl SessionStore {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        profiles: ProfileRepository,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(AuthSnapshot::loading());
        Arc::new(Self {
            state,
            apply_lock: tokio::sync::Mutex::new(()),
            provider,
            profiles,
            notifier,
        })
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    /// Follow snapshot changes.
    pub fn watch(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity().cloned()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.state.borrow().profile.clone()
    }

    /// Access token of the live session, for calls to trusted functions.
    pub fn access_token(&self) -> Option<String> {
        self.state
            .borrow()
            .session
            .as_ref()
            .map(|s| s.tokens.access_token.clone())
    }

    /// Access token for a trusted function call, refreshed through the
    /// provider when it is close to expiry.
    ///
    /// A refreshed session is applied here as well as through the event
    /// stream, so the snapshot is current even without a running listener.
    pub async fn fresh_access_token(&self) -> Option<String> {
        match self.provider.get_session().await {
            Ok(Some(session)) => {
                let token = session.tokens.access_token.clone();
                if self.access_token().as_deref() != Some(token.as_str()) {
                    self.apply(AuthEvent::new(AuthEventKind::TokenRefreshed, Some(session)))
                        .await;
                }
                Some(token)
            }
            Ok(None) => {
                if self.is_authenticated() {
                    self.apply(AuthEvent::new(AuthEventKind::SignedOut, None))
                        .await;
                }
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session refresh failed, using cached access token");
                self.access_token()
            }
        }
    }

    /// Start mirroring the provider.
    ///
    /// The event subscription is taken before the current session is
    /// requested, so nothing fired in between is lost.
    pub async fn initialize(self: &Arc<Self>) -> SessionListener {
        let mut events = self.provider.subscribe();

        let initial = match self.provider.get_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Initial session fetch failed, treating as signed out");
                None
            }
        };
        self.apply(AuthEvent::new(AuthEventKind::InitialSession, initial))
            .await;

        let store = Arc::clone(self);
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => store.apply(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Auth events dropped, resyncing session");
                        let session = store.provider.get_session().await.unwrap_or_default();
                        store
                            .apply(AuthEvent::new(AuthEventKind::InitialSession, session))
                            .await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("Auth event stream closed");
        });

        SessionListener { task }
    }

    /// Replace the session wholesale, then load the profile for it.
    async fn apply(&self, event: AuthEvent) {
        let _guard = self.apply_lock.lock().await;

        let identity = event.session.as_ref().map(|s| s.identity.clone());
        tracing::debug!(
            kind = ?event.kind,
            user_id = identity.as_ref().map(|i| i.id.as_str()),
            "Applying auth event"
        );

        self.state.send_modify(|snapshot| {
            let same_identity = snapshot.identity().map(|i| &i.id) == identity.as_ref().map(|i| &i.id);
            snapshot.session = event.session;
            snapshot.is_loading = false;
            if !same_identity {
                snapshot.profile = None;
            }
        });

        let Some(identity) = identity else {
            return;
        };

        if let Some(profile) = self.profiles.load_or_repair(&identity).await {
            self.store_profile(&identity.id, profile);
        }
    }

    /// Store a profile only if it still belongs to the signed-in identity.
    fn store_profile(&self, identity_id: &str, profile: Profile) {
        self.state.send_if_modified(|snapshot| {
            if snapshot.identity().map(|i| i.id.as_str()) != Some(identity_id) {
                return false;
            }
            snapshot.profile = Some(profile);
            true
        });
    }

    /// Sign in through the provider. `remember` is the provider's concern.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<Session, AuthError> {
        match self.provider.sign_in(email, password, remember).await {
            Ok(session) => {
                self.apply(AuthEvent::new(AuthEventKind::SignedIn, Some(session.clone())))
                    .await;
                self.notifier.notify(Notice::success("Login successful!"));
                Ok(session)
            }
            Err(e) => {
                tracing::info!(error = %e, "Login failed");
                self.notifier.notify(Notice::error(e.to_string()));
                Err(AuthError::Provider(e))
            }
        }
    }

    /// Create an identity, then its profile as a separate step.
    ///
    /// A failed profile insert does not fail the sign-up: the profile is
    /// created from the identity's metadata on the first authenticated load.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        name: &str,
        phone: Option<&str>,
    ) -> Result<SignupOutcome, AuthError> {
        let metadata = match signup_metadata(name, phone) {
            Ok(metadata) => metadata,
            Err(message) => {
                self.notifier.notify(Notice::error(message));
                return Err(AuthError::Validation(message.to_string()));
            }
        };

        let identity = match self.provider.sign_up(email, password, &metadata).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::info!(error = %e, "Sign-up failed");
                self.notifier.notify(Notice::error(e.to_string()));
                return Err(AuthError::Provider(e));
            }
        };

        let profile_identity = Identity {
            id: identity.id.clone(),
            email: email.to_string(),
            name: metadata.name,
            phone: metadata.phone,
        };
        let profile = Profile::for_identity(&profile_identity, &now_rfc3339());
        if let Err(e) = self.profiles.create_profile(&profile).await {
            tracing::warn!(
                user_id = %identity.id,
                error = %e,
                "Profile creation after sign-up failed, will repair on first login"
            );
        }

        self.notifier.notify(Notice::success(
            "Account created successfully! Please check your email for verification.",
        ));
        Ok(SignupOutcome::VerificationPending {
            email: email.to_string(),
        })
    }

    /// Sign out. Provider failures are logged, never surfaced.
    pub async fn logout(&self) {
        if let Err(e) = self.provider.sign_out().await {
            tracing::warn!(error = %e, "Provider sign-out failed, clearing local session anyway");
        }
        self.apply(AuthEvent::new(AuthEventKind::SignedOut, None))
            .await;
        self.notifier.notify(Notice::success("Logged out successfully"));
    }

    /// Write a partial profile update, then re-read the stored profile.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, AuthError> {
        let Some(identity) = self.identity() else {
            self.notifier
                .notify(Notice::error(AuthError::NotAuthenticated.to_string()));
            return Err(AuthError::NotAuthenticated);
        };

        let write = self.profiles.update_profile(&identity.id, update).await;
        if !write.success {
            self.notifier.notify(Notice::error(write.message.clone()));
            return Err(AuthError::ProfileUpdate(write.message));
        }

        match self.profiles.fetch_profile(&identity.id).await {
            Some(profile) => {
                self.store_profile(&identity.id, profile.clone());
                self.notifier.notify(Notice::success(write.message));
                Ok(profile)
            }
            None => {
                let message = "Profile updated but could not be reloaded".to_string();
                self.notifier.notify(Notice::error(message.clone()));
                Err(AuthError::ProfileUpdate(message))
            }
        }
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        match self.provider.reset_password(email).await {
            Ok(()) => {
                self.notifier
                    .notify(Notice::success("Password reset email sent"));
                Ok(())
            }
            Err(e) => {
                self.notifier.notify(Notice::error(e.to_string()));
                Err(AuthError::Provider(e))
            }
        }
    }
}

fn signup_metadata(name: &str, phone: Option<&str>) -> Result<SignUpMetadata, &'static str> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Please fill in all required fields");
    }

    let phone = match phone.map(normalize_phone) {
        Some(p) if p.is_empty() => None,
        Some(p) if p.len() < PHONE_DIGITS => return Err("Please enter a valid phone number"),
        other => other,
    };

    Ok(SignUpMetadata {
        name: name.to_string(),
        phone,
    })
}
