//! Sheets API credentials
//!
//! Either a bearer token read verbatim from a file, or a Google service
//! account key that is traded for short-lived access tokens with the OAuth
//! JWT bearer grant. Service account tokens are cached until shortly before
//! they expire.

use std::fs;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{AuthConfig, AuthMode};
use crate::error::HabitError;

/// Read/write access to spreadsheets
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Token endpoint used when the key file does not name one
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Longest assertion lifetime Google accepts
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens this close to expiry are refreshed
const REFRESH_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// The fields of a downloaded service account key file that we use
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// JWT claims for the bearer grant
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Service account that signs its own assertions
pub struct ServiceAccount {
    client_email: String,
    key_id: Option<String>,
    token_uri: String,
    encoding_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccount {
    /// Parse a key file's JSON
    pub fn from_json(json: &str) -> Result<Self, HabitError> {
        let key: ServiceAccountKey = serde_json::from_str(json)
            .map_err(|e| HabitError::Config(format!("invalid service account key: {}", e)))?;
        Self::from_key(key)
    }

    pub fn from_key(key: ServiceAccountKey) -> Result<Self, HabitError> {
        debug!(client_email = %key.client_email, "ServiceAccount::from_key: called");
        if key.key_type != "service_account" {
            return Err(HabitError::Config(format!(
                "credentials type '{}' is not service_account",
                key.key_type
            )));
        }

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| HabitError::Config(format!("invalid service account private key: {}", e)))?;

        Ok(Self {
            client_email: key.client_email,
            key_id: key.private_key_id,
            token_uri: key.token_uri,
            encoding_key,
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Exchange assertions somewhere other than the key file's endpoint
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    /// Signed JWT for the Sheets scope, issued at `now`
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String, HabitError> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: self.client_email.clone(),
            scope: SHEETS_SCOPE.to_string(),
            aud: self.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();
        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| HabitError::Config(format!("sign service account assertion: {}", e)))
    }

    /// Current access token, exchanging a fresh assertion when needed
    pub async fn token(&self, client: &Client) -> Result<String, HabitError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        debug!(account = %self.client_email, "ServiceAccount::token: exchanging assertion");
        let assertion = self.assertion(now)?;
        let response = client
            .post(self.token_uri.as_str())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| HabitError::Connection(format!("token exchange: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Token exchange failed");
            return Err(HabitError::Connection(format!(
                "token exchange failed ({}): {}",
                status,
                body.trim()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| HabitError::Connection(format!("invalid token response: {}", e)))?;
        let expires_at = now + Duration::seconds(token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS));
        info!(%expires_at, "Obtained service account token");

        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at,
        });
        Ok(token.access_token)
    }
}

/// Whatever produces the bearer token for API calls
pub enum Credentials {
    AccessToken(String),
    ServiceAccount(ServiceAccount),
}

impl Credentials {
    /// Read the credentials file named by `auth`
    pub fn load(auth: &AuthConfig) -> Result<Self, HabitError> {
        let path = auth.expanded_key_path();
        debug!(path = %path.display(), mode = ?auth.mode, "Credentials::load: called");

        let content = fs::read_to_string(&path)
            .map_err(|e| HabitError::Config(format!("read credentials {}: {}", path.display(), e)))?;

        match auth.mode {
            AuthMode::AccessToken => {
                let token = content.trim();
                if token.is_empty() {
                    return Err(HabitError::Config(format!("credentials file {} is empty", path.display())));
                }
                Ok(Self::AccessToken(token.to_string()))
            }
            AuthMode::ServiceAccount => {
                let account = ServiceAccount::from_json(&content)?;
                info!(account = %account.client_email(), "Loaded service account key");
                Ok(Self::ServiceAccount(account))
            }
        }
    }

    /// Token for the `Authorization: Bearer` header
    pub async fn bearer(&self, client: &Client) -> Result<String, HabitError> {
        match self {
            Self::AccessToken(token) => Ok(token.clone()),
            Self::ServiceAccount(account) => account.token(client).await,
        }
    }
}
