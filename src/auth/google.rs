//! Google as external identity provider: ID token verification against
//! Google's published keys and the OAuth2 authorization-code exchange used by
//! the browser redirect flow.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{
    accounts::repo_types::ExternalProfile,
    error::{AuthError, AuthResult},
};

const CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];
const KEYS_TTL: Duration = Duration::from_secs(60 * 60);

/// Payload of a verified Google ID token.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalClaims {
    pub sub: String,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub picture: Option<String>,
}

impl ExternalClaims {
    /// Requires email, first and last name; runs before any directory write.
    pub fn into_profile(self) -> AuthResult<ExternalProfile> {
        fn required(value: Option<String>, field: &'static str) -> AuthResult<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(AuthError::IncompleteProfile(field))
        }

        let email = required(self.email, "email")?.to_lowercase();
        let first_name = required(self.given_name, "first name")?;
        let last_name = required(self.family_name, "last name")?;
        Ok(ExternalProfile {
            provider_id: self.sub,
            email,
            first_name,
            last_name,
            picture: self.picture,
            email_verified: self.email_verified,
        })
    }
}

/// OAuth client registration used for the authorization-code exchange.
#[derive(Debug, Clone, Copy)]
pub struct OAuthClient<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub redirect_uri: &'a str,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Validates signature, issuer, audience and expiry.
    async fn verify_id_token(&self, id_token: &str, audience: &str) -> AuthResult<ExternalClaims>;

    /// Trades an authorization code for the ID token it grants.
    async fn exchange_code(&self, code: &str, client: OAuthClient<'_>) -> AuthResult<String>;
}

pub fn authorization_url(client_id: &str, redirect_uri: &str, state: &str) -> String {
    format!(
        "{AUTH_URL}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode("openid email profile"),
        urlencoding::encode(state),
    )
}

pub struct GoogleIdentityProvider {
    http: reqwest::Client,
    keys: RwLock<Option<(JwkSet, Instant)>>,
}

impl GoogleIdentityProvider {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            keys: RwLock::new(None),
        }
    }

    async fn signing_keys(&self) -> anyhow::Result<JwkSet> {
        if let Some((keys, fetched_at)) = self.keys.read().await.as_ref() {
            if fetched_at.elapsed() < KEYS_TTL {
                return Ok(keys.clone());
            }
        }

        let keys: JwkSet = self
            .http
            .get(CERTS_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(count = keys.keys.len(), "fetched google signing keys");
        *self.keys.write().await = Some((keys.clone(), Instant::now()));
        Ok(keys)
    }
}

fn reject(reason: &str) -> AuthError {
    warn!(reason, "external token rejected");
    AuthError::InvalidExternalToken
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    async fn verify_id_token(&self, id_token: &str, audience: &str) -> AuthResult<ExternalClaims> {
        let header = decode_header(id_token).map_err(|_| reject("malformed header"))?;
        let kid = header.kid.ok_or_else(|| reject("missing kid"))?;

        let keys = self.signing_keys().await.map_err(|e| {
            warn!(error = %e, "google keys unavailable");
            AuthError::InvalidExternalToken
        })?;
        let jwk = keys.find(&kid).ok_or_else(|| reject("unknown kid"))?;
        let key = DecodingKey::from_jwk(jwk).map_err(|_| reject("unusable jwk"))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience]);
        validation.set_issuer(&ISSUERS);
        let data = decode::<ExternalClaims>(id_token, &key, &validation).map_err(|e| {
            warn!(error = %e, "google id token failed validation");
            AuthError::InvalidExternalToken
        })?;
        Ok(data.claims)
    }

    async fn exchange_code(&self, code: &str, client: OAuthClient<'_>) -> AuthResult<String> {
        #[derive(serde::Serialize)]
        struct TokenRequest<'a> {
            code: &'a str,
            client_id: &'a str,
            client_secret: &'a str,
            redirect_uri: &'a str,
            grant_type: &'a str,
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            id_token: Option<String>,
        }

        let response = self
            .http
            .post(TOKEN_URL)
            .form(&TokenRequest {
                code,
                client_id: client.client_id,
                client_secret: client.client_secret,
                redirect_uri: client.redirect_uri,
                grant_type: "authorization_code",
            })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "google token exchange failed");
                AuthError::InvalidExternalToken
            })?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "google token exchange rejected");
            return Err(AuthError::InvalidExternalToken);
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|_| reject("invalid token response"))?;
        tokens.id_token.ok_or_else(|| reject("no id_token in response"))
    }
}

/// Accepts `valid:<sub>:<email>` tokens for audience `test-client-id`, and
/// codes of the form `code-<sub>:<email>`.
#[cfg(test)]
pub(crate) struct StubProvider;

#[cfg(test)]
#[async_trait]
impl IdentityProvider for StubProvider {
    async fn verify_id_token(&self, id_token: &str, audience: &str) -> AuthResult<ExternalClaims> {
        let parts: Vec<&str> = id_token.split(':').collect();
        if audience != "test-client-id" || parts.len() != 3 || parts[0] != "valid" {
            return Err(AuthError::InvalidExternalToken);
        }
        Ok(ExternalClaims {
            sub: parts[1].into(),
            email: Some(parts[2].to_string()).filter(|e| !e.is_empty()),
            email_verified: true,
            given_name: Some("Bea".into()),
            family_name: Some("Xu".into()),
            picture: Some("https://img/bea.png".into()),
        })
    }

    async fn exchange_code(&self, code: &str, _client: OAuthClient<'_>) -> AuthResult<String> {
        code.strip_prefix("code-")
            .map(|rest| format!("valid:{rest}"))
            .ok_or(AuthError::InvalidExternalToken)
    }
}
