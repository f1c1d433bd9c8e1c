//! Service-account authentication (OAuth2 JWT bearer grant).
//!
//! A signed RS256 assertion is exchanged at the key's token endpoint for an
//! access token. The token is cached and reused until it is within a minute
//! of expiring.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use ring::rand::SystemRandom;
use ring::signature::{RSA_PKCS1_SHA256, RsaKeyPair};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::GoogleApiError;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each assertion (Google's maximum).
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens this close to expiry are refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Fields of a service-account JSON key file.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_owned()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Reads and parses a key file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GoogleApiError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|e| match e {
            GoogleApiError::Json(err) => {
                GoogleApiError::InvalidCredentials(format!("{}: {err}", path.display()))
            }
            other => other,
        })
    }

    /// Parses a key from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, GoogleApiError> {
        let key: Self = serde_json::from_str(json)?;
        if key.client_email.is_empty() {
            return Err(GoogleApiError::InvalidCredentials(
                "client_email is empty".to_owned(),
            ));
        }
        Ok(key)
    }

    fn key_pair(&self) -> Result<RsaKeyPair, GoogleApiError> {
        let (label, der) = pem_to_der(&self.private_key)?;
        let parsed = if label == "RSA PRIVATE KEY" {
            RsaKeyPair::from_der(&der)
        } else {
            RsaKeyPair::from_pkcs8(&der)
        };
        parsed.map_err(|e| GoogleApiError::InvalidCredentials(format!("private_key: {e}")))
    }
}

/// Decodes a single PEM block, returning its label and DER bytes.
fn pem_to_der(pem: &str) -> Result<(String, Vec<u8>), GoogleApiError> {
    let invalid = || GoogleApiError::InvalidCredentials("private_key is not PEM".to_owned());

    let label = pem
        .lines()
        .map(str::trim)
        .find_map(|line| {
            line.strip_prefix("-----BEGIN ")
                .and_then(|rest| rest.strip_suffix("-----"))
        })
        .ok_or_else(invalid)?
        .to_owned();

    let body: String = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect();

    let der = STANDARD.decode(body).map_err(|_| invalid())?;
    Ok((label, der))
}

#[derive(Serialize)]
struct JwtHeader<'a> {
    alg: &'static str,
    typ: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<&'a str>,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now + Duration::seconds(EXPIRY_MARGIN_SECS)
    }
}

/// Access-token provider for one service account and one scope set.
pub struct ServiceAccountAuth {
    http: reqwest::Client,
    key: ServiceAccountKey,
    key_pair: RsaKeyPair,
    scopes: Vec<String>,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    /// Creates a provider. The private key is parsed up front so a bad key
    /// fails here instead of on first use.
    pub fn new(
        http: reqwest::Client,
        key: ServiceAccountKey,
        scopes: &[&str],
    ) -> Result<Self, GoogleApiError> {
        let key_pair = key.key_pair()?;
        Ok(Self {
            http,
            key,
            key_pair,
            scopes: scopes.iter().map(|s| (*s).to_owned()).collect(),
            cached: Mutex::new(None),
        })
    }

    /// Returns a valid access token, minting a new one when needed.
    pub async fn access_token(&self) -> Result<String, GoogleApiError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.access_token.clone());
        }

        debug!(
            "Requesting access token for {} ({})",
            self.key.client_email,
            self.scopes.join(" ")
        );

        let assertion = self.signed_assertion(now)?;
        let resp = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(GoogleApiError::TokenRequest(format!(
                "HTTP {}: {body}",
                status.as_u16()
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        let expires_in = token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        let expires_at = Duration::try_seconds(expires_in)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                GoogleApiError::TokenRequest(format!("expires_in out of range: {expires_in}"))
            })?;
        let fresh = CachedToken {
            access_token: token.access_token,
            expires_at,
        };
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);

        Ok(access_token)
    }

    /// Builds the `header.claims.signature` assertion for the token request.
    fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String, GoogleApiError> {
        let header = JwtHeader {
            alg: "RS256",
            typ: "JWT",
            kid: self.key.private_key_id.as_deref(),
        };
        let iat = now.timestamp();
        let claims = JwtClaims {
            iss: &self.key.client_email,
            scope: self.scopes.join(" "),
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );

        let mut signature = vec![0; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(
                &RSA_PKCS1_SHA256,
                &SystemRandom::new(),
                signing_input.as_bytes(),
                &mut signature,
            )
            .map_err(|_| GoogleApiError::Signing)?;

        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }
}

impl std::fmt::Debug for ServiceAccountAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountAuth")
            .field("client_email", &self.key.client_email)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}
