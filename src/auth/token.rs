//! Token primitives shared by the device-code and client-secret flows.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::debug;
use zeroize::Zeroize;

use crate::error::AuthError;
use crate::secrets::SecureString;

/// Tokens are considered expired this many seconds before their real expiry.
const REFRESH_BEFORE_EXPIRY_SECONDS: i64 = 300;

/// A bearer token together with its expiry.
#[derive(Debug, Clone)]
pub struct AccessToken {
    token: SecureString,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: SecureString, expires_at: DateTime<Utc>) -> Self {
        Self { token, expires_at }
    }

    pub fn from_response(response: &TokenResponse) -> Self {
        Self::new(
            SecureString::new(response.access_token.clone()),
            Utc::now() + Duration::seconds(response.expires_in as i64),
        )
    }

    /// The raw bearer value.
    pub fn secret(&self) -> &str {
        self.token.as_str()
    }

    /// True once the token is inside the refresh window.
    pub fn is_expired(&self) -> bool {
        Utc::now() + Duration::seconds(REFRESH_BEFORE_EXPIRY_SECONDS) >= self.expires_at
    }
}

/// Anything that can produce bearer tokens for a set of scopes.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken, AuthError>;
}

/// Last token issued by a credential, keyed by the scope string it was requested for.
#[derive(Debug)]
pub(crate) struct CachedToken {
    pub scopes: String,
    pub token: AccessToken,
    pub refresh_token: Option<SecureString>,
}

impl CachedToken {
    pub fn valid_for(&self, scopes: &str) -> Option<AccessToken> {
        (self.scopes == scopes && !self.token.is_expired()).then(|| self.token.clone())
    }
}

/// Successful response from the v2.0 token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
    pub refresh_token: Option<String>,
}

impl Drop for TokenResponse {
    fn drop(&mut self) {
        self.access_token.zeroize();
        if let Some(ref mut rt) = self.refresh_token {
            rt.zeroize();
        }
    }
}

/// Error body returned by the token and device-code endpoints.
#[derive(Debug, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: String,
}

impl From<TokenErrorResponse> for AuthError {
    fn from(e: TokenErrorResponse) -> Self {
        AuthError::TokenRequestFailed {
            error: e.error,
            description: e.error_description,
        }
    }
}

/// Result of one token endpoint round trip.
pub(crate) enum TokenOutcome {
    Issued(TokenResponse),
    Rejected(TokenErrorResponse),
}

/// Token endpoint URL for a tenant.
pub fn token_endpoint(authority_host: &str, tenant: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/token",
        authority_host.trim_end_matches('/'),
        tenant
    )
}

/// Device authorization endpoint URL for a tenant.
pub fn devicecode_endpoint(authority_host: &str, tenant: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/devicecode",
        authority_host.trim_end_matches('/'),
        tenant
    )
}

/// Space-separated scope parameter.
pub fn scope_param(scopes: &[String]) -> String {
    scopes.join(" ")
}

/// POST a form to a token endpoint and classify the response.
pub(crate) async fn request_token(
    http: &reqwest::Client,
    url: &str,
    params: &[(&str, &str)],
) -> Result<TokenOutcome, AuthError> {
    let response = http.post(url).form(params).send().await?;
    let status = response.status();

    if status.is_success() {
        let token: TokenResponse = response.json().await?;
        debug!("Token issued, expires in {} seconds", token.expires_in);
        return Ok(TokenOutcome::Issued(token));
    }

    let body = response.text().await.unwrap_or_default();
    let rejection = serde_json::from_str::<TokenErrorResponse>(&body).unwrap_or_else(|_| {
        TokenErrorResponse {
            error: format!("http_{}", status.as_u16()),
            error_description: body,
        }
    });
    debug!("Token endpoint rejected request: {}", rejection.error);
    Ok(TokenOutcome::Rejected(rejection))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_construction() {
        assert_eq!(
            token_endpoint("https://login.microsoftonline.com/", "common"),
            "https://login.microsoftonline.com/common/oauth2/v2.0/token"
        );
        assert_eq!(
            devicecode_endpoint("https://login.microsoftonline.com", "organizations"),
            "https://login.microsoftonline.com/organizations/oauth2/v2.0/devicecode"
        );
    }

    #[test]
    fn test_expiry_window() {
        let fresh = AccessToken::new("a".to_string().into(), Utc::now() + Duration::hours(1));
        assert!(!fresh.is_expired());

        // Inside the refresh window counts as expired.
        let stale = AccessToken::new("b".to_string().into(), Utc::now() + Duration::minutes(2));
        assert!(stale.is_expired());
    }

    #[test]
    fn test_cached_token_is_scope_sensitive() {
        let cached = CachedToken {
            scopes: "User.Read Mail.Read".into(),
            token: AccessToken::new("tok".to_string().into(), Utc::now() + Duration::hours(1)),
            refresh_token: None,
        };
        assert!(cached.valid_for("User.Read Mail.Read").is_some());
        assert!(cached.valid_for("User.Read").is_none());
    }

    #[test]
    fn test_token_error_converts_to_auth_error() {
        let err: AuthError = TokenErrorResponse {
            error: "invalid_client".into(),
            error_description: "AADSTS7000215: Invalid client secret provided.".into(),
        }
        .into();
        assert!(err.to_string().contains("invalid_client"));
    }
}
