// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication middleware.
//!
//! Access tokens are issued by the identity provider and signed with the
//! shared HS256 secret. Only tokens for the `authenticated` audience are
//! accepted.

use crate::models::Identity;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Audience claim carried by signed-in users' tokens.
pub const AUTHENTICATED_AUDIENCE: &str = "authenticated";

/// Cookie holding the access token for browser clients.
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (identity id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    pub aud: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Authenticated user extracted from JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
}

impl AuthUser {
    /// The identity as described by the token, used to repair a missing profile.
    pub fn to_identity(&self) -> Identity {
        Identity {
            id: self.user_id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            phone: self.phone.clone(),
        }
    }
}

/// Middleware that requires valid JWT authentication.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_user = authenticate(&state, &jar, &request).ok_or(StatusCode::UNAUTHORIZED)?;
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Resolve the caller from the access token, if it carries a valid one.
///
/// Shared by middlewares that differ only in how they report a rejection.
pub fn authenticate(state: &AppState, jar: &CookieJar, request: &Request) -> Option<AuthUser> {
    // Try cookie first, then header
    let token = match jar.get(ACCESS_TOKEN_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))?
            .to_string(),
    };

    let claims = decode_token(&token, &state.config.auth_jwt_secret)
        .map_err(|e| tracing::debug!(error = %e, "Rejected access token"))
        .ok()?;

    if claims.sub.is_empty() {
        return None;
    }

    Some(AuthUser {
        user_id: claims.sub,
        email: claims.email.unwrap_or_default(),
        name: claims.user_metadata.name.unwrap_or_default(),
        phone: claims.user_metadata.phone,
    })
}

/// Validate an access token and return its claims.
pub fn decode_token(token: &str, secret: &[u8]) -> jsonwebtoken::errors::Result<Claims> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[AUTHENTICATED_AUDIENCE]);

    decode::<Claims>(token, &key, &validation).map(|data| data.claims)
}

/// Create an access token for an identity, as the identity provider would.
pub fn create_jwt(identity: &Identity, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: identity.id.clone(),
        iat: now,
        exp: now + 60 * 60, // 1 hour
        aud: AUTHENTICATED_AUDIENCE.to_string(),
        email: Some(identity.email.clone()),
        user_metadata: UserMetadata {
            name: Some(identity.name.clone()),
            phone: identity.phone.clone(),
        },
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}
