//! Application configuration loaded from environment variables.
//!
//! The payment gateway secret is only ever read here and handed to the
//! server-side gateway adapter. It is never serialized into a response.

use std::env;

const DEFAULT_RAZORPAY_API_URL: &str = "https://api.razorpay.com/v1";
const DEFAULT_SLOT_HOLD_SECS: u64 = 600;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL (used for logging and redirects)
    pub frontend_url: String,
    /// GCP project ID for Firestore. None runs against the in-memory store.
    pub gcp_project_id: Option<String>,
    /// Server port
    pub port: u16,
    /// Identity provider base URL (client side)
    pub auth_url: Option<String>,
    /// Identity provider public api key (client side)
    pub auth_api_key: Option<String>,
    /// Payment gateway REST base URL
    pub razorpay_api_url: String,
    /// Gateway key id (shared with the checkout widget)
    pub razorpay_key_id: Option<String>,
    /// Slot catalog used for server-side price checks
    pub catalog_path: Option<String>,
    /// Lifetime of a slot reservation hold
    pub slot_hold_secs: u64,

    // --- Secrets ---
    /// Gateway key secret (server only)
    pub razorpay_key_secret: Option<String>,
    /// HS256 secret for identity provider access tokens
    pub auth_jwt_secret: Vec<u8>,
}

impl Config {
    /// Fixed configuration for tests.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: None,
            port: 8080,
            auth_url: Some("http://localhost:9999".to_string()),
            auth_api_key: Some("test_anon_key".to_string()),
            razorpay_api_url: DEFAULT_RAZORPAY_API_URL.to_string(),
            razorpay_key_id: Some("rzp_test_key".to_string()),
            catalog_path: None,
            slot_hold_secs: DEFAULT_SLOT_HOLD_SECS,
            razorpay_key_secret: Some("test_key_secret".to_string()),
            auth_jwt_secret: b"test_jwt_secret_32_bytes_minimum!".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Gateway credentials are optional: without them the payment function
    /// fails closed instead of refusing to start.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: optional("GCP_PROJECT_ID"),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            auth_url: optional("AUTH_URL"),
            auth_api_key: optional("AUTH_API_KEY"),
            razorpay_api_url: env::var("RAZORPAY_API_URL")
                .unwrap_or_else(|_| DEFAULT_RAZORPAY_API_URL.to_string()),
            razorpay_key_id: optional("RAZORPAY_KEY_ID"),
            catalog_path: optional("CATALOG_PATH"),
            slot_hold_secs: match env::var("SLOT_HOLD_SECS") {
                Ok(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::Invalid("SLOT_HOLD_SECS"))?,
                Err(_) => DEFAULT_SLOT_HOLD_SECS,
            },

            razorpay_key_secret: optional("RAZORPAY_KEY_SECRET"),
            auth_jwt_secret: env::var("AUTH_JWT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("AUTH_JWT_SECRET"))?
                .into_bytes(),
        })
    }

    /// Gateway credentials, if both halves are configured.
    pub fn razorpay_credentials(&self) -> Option<(&str, &str)> {
        match (&self.razorpay_key_id, &self.razorpay_key_secret) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

/// Read an optional variable, treating blank values as unset.
fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
