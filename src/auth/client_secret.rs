//! Client-credential (app-only) authentication.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::token::{
    request_token, scope_param, token_endpoint, AccessToken, CachedToken, TokenCredential,
    TokenOutcome,
};
use crate::config::Settings;
use crate::error::AuthError;
use crate::secrets::SecureString;

/// Authenticates as the application itself with a client id / secret pair.
///
/// The secret is not validated at construction; a missing or wrong secret only
/// surfaces on the first token request.
pub struct ClientSecretCredential {
    http_client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: Option<SecureString>,
    cache: Mutex<Option<CachedToken>>,
}

impl ClientSecretCredential {
    pub fn new(
        http_client: reqwest::Client,
        authority_host: &str,
        tenant_id: &str,
        client_id: &str,
        client_secret: Option<SecureString>,
    ) -> Self {
        Self {
            http_client,
            token_url: token_endpoint(authority_host, tenant_id),
            client_id: client_id.to_string(),
            client_secret,
            cache: Mutex::new(None),
        }
    }

    pub fn from_settings(http_client: reqwest::Client, settings: &Settings) -> Self {
        Self::new(
            http_client,
            &settings.authority_host,
            &settings.tenant_id,
            &settings.client_id,
            settings.client_secret.clone(),
        )
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken, AuthError> {
        if scopes.is_empty() {
            return Err(AuthError::NoScopes);
        }
        let secret = self
            .client_secret
            .as_ref()
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::MissingClientSecret)?;

        let scope = scope_param(scopes);
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.as_ref().and_then(|c| c.valid_for(&scope)) {
            debug!("Using cached app-only token");
            return Ok(token);
        }

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", secret.as_str()),
            ("scope", scope.as_str()),
        ];

        match request_token(&self.http_client, &self.token_url, &params).await? {
            TokenOutcome::Issued(response) => {
                let token = AccessToken::from_response(&response);
                info!("Acquired app-only token, expires at {}", token.expires_at);
                *cache = Some(CachedToken {
                    scopes: scope,
                    token: token.clone(),
                    refresh_token: None,
                });
                Ok(token)
            }
            TokenOutcome::Rejected(rejection) => Err(rejection.into()),
        }
    }
}
