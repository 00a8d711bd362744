//! Service account authentication for Google APIs.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use log::debug;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{DriveError, Result};
use crate::models::{ServiceAccountCredentials, TokenResponse};

/// Google OAuth2 token endpoint.
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Read-only Drive scope, used when no scopes are configured.
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

/// Lifetime requested for each JWT assertion.
const ASSERTION_TTL_SECS: u64 = 3600;

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    sub: String,   // Subject; the service account acts as itself
    scope: String, // Space-separated OAuth scopes
    aud: String,   // Audience (token endpoint)
    exp: u64,      // Expiration time
    iat: u64,      // Issued at
}

impl Claims {
    fn new(credentials: &ServiceAccountCredentials, scopes: &[String], aud: &str, now: u64) -> Self {
        Self {
            iss: credentials.client_email.clone(),
            sub: credentials.client_email.clone(),
            scope: scopes.join(" "),
            aud: aud.to_string(),
            iat: now,
            exp: now + ASSERTION_TTL_SECS,
        }
    }
}

/// Cached access token with expiration.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

enum TokenSource {
    ServiceAccount {
        credentials: ServiceAccountCredentials,
        scopes: Vec<String>,
    },
    Static,
}

/// Authenticator for Google APIs.
///
/// Normally backed by service account credentials; a pre-issued bearer
/// token can be used instead via [`Authenticator::from_access_token`].
#[derive(Clone)]
pub struct Authenticator {
    source: Arc<TokenSource>,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl Authenticator {
    /// Create a new authenticator from a service account JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P, scopes: Vec<String>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content, scopes)
    }

    /// Create a new authenticator from a service account JSON blob.
    pub fn from_json(json: &str, scopes: Vec<String>) -> Result<Self> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(json)?;
        Ok(Self::new(credentials, scopes))
    }

    /// Create a new authenticator from credentials.
    pub fn new(credentials: ServiceAccountCredentials, scopes: Vec<String>) -> Self {
        Self {
            source: Arc::new(TokenSource::ServiceAccount {
                credentials,
                scopes,
            }),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Use an already issued bearer token. It is never refreshed.
    pub fn from_access_token(token: impl Into<String>) -> Self {
        let cached = CachedToken {
            access_token: token.into(),
            expires_at: SystemTime::UNIX_EPOCH,
        };
        Self {
            source: Arc::new(TokenSource::Static),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(Some(cached))),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        // Check if we have a valid cached token
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if matches!(*self.source, TokenSource::Static) {
                    return Ok(token.access_token.clone());
                }
                // Add 60 second buffer before expiration
                let buffer = Duration::from_secs(60);
                if token.expires_at > SystemTime::now() + buffer {
                    return Ok(token.access_token.clone());
                }
            }
        }

        // Refresh the token
        let new_token = self.refresh_token().await?;

        // Cache the new token
        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    /// Refresh the access token using JWT assertion.
    async fn refresh_token(&self) -> Result<CachedToken> {
        let (credentials, scopes) = match self.source.as_ref() {
            TokenSource::ServiceAccount {
                credentials,
                scopes,
            } => (credentials, scopes),
            TokenSource::Static => {
                return Err(DriveError::AuthError(
                    "static access token cannot be refreshed".to_string(),
                ))
            }
        };

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| DriveError::AuthError(format!("system clock error: {e}")))?
            .as_secs();

        let token_uri = credentials.token_uri.as_deref().unwrap_or(TOKEN_URI);
        let claims = Claims::new(credentials, scopes, token_uri, now);

        // Create JWT
        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())?;
        let jwt = encode(&header, &claims, &key)?;

        // Exchange JWT for access token
        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", &jwt),
        ];

        debug!("Requesting access token for {}", credentials.client_email);
        let response = self
            .client
            .post(token_uri)
            .form(&params)
            .send()
            .await
            .map_err(DriveError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::AuthError(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| DriveError::TokenRefreshError(e.to_string()))?;

        let expires_at = SystemTime::now() + Duration::from_secs(token_response.expires_in);

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }
}
