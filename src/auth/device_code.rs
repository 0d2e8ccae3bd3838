//! Device-code (interactive user) authentication.
//!
//! The operator is shown a short code and a URL, signs in on any device, and the
//! credential polls the token endpoint until sign-in completes. Issued tokens are
//! cached and renewed through the refresh token, so the operator is only prompted
//! again when the refresh token is rejected.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::token::{
    devicecode_endpoint, request_token, scope_param, token_endpoint, AccessToken, CachedToken,
    TokenCredential, TokenOutcome, TokenResponse,
};
use crate::config::Settings;
use crate::error::AuthError;
use crate::secrets::SecureString;

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Polling interval increase requested by `slow_down`.
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Device authorization response shown to the operator.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCodeInfo {
    pub user_code: String,
    pub device_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default)]
    pub message: String,
}

fn default_interval() -> u64 {
    5
}

impl DeviceCodeInfo {
    /// Operator-facing instructions, falling back to a built message.
    pub fn instructions(&self) -> String {
        if self.message.is_empty() {
            format!(
                "To sign in, use a web browser to open the page {} and enter the code {} to authenticate.",
                self.verification_uri, self.user_code
            )
        } else {
            self.message.clone()
        }
    }
}

/// Shows a device code to the operator. The flow awaits it before polling.
#[async_trait]
pub trait DeviceCodePrompt: Send + Sync {
    async fn prompt(&self, info: &DeviceCodeInfo);
}

/// User credential backed by the device-code flow.
pub struct DeviceCodeCredential {
    http_client: reqwest::Client,
    devicecode_url: String,
    token_url: String,
    client_id: String,
    slow_down_step: Duration,
    prompt: Arc<dyn DeviceCodePrompt>,
    cache: Mutex<Option<CachedToken>>,
}

impl DeviceCodeCredential {
    pub fn new(
        http_client: reqwest::Client,
        settings: &Settings,
        prompt: Arc<dyn DeviceCodePrompt>,
    ) -> Self {
        Self {
            http_client,
            devicecode_url: devicecode_endpoint(&settings.authority_host, &settings.auth_tenant),
            token_url: token_endpoint(&settings.authority_host, &settings.auth_tenant),
            client_id: settings.client_id.clone(),
            slow_down_step: SLOW_DOWN_STEP,
            prompt,
            cache: Mutex::new(None),
        }
    }

    async fn request_device_code(&self, scope: &str) -> Result<DeviceCodeInfo, AuthError> {
        let params = [("client_id", self.client_id.as_str()), ("scope", scope)];

        let response = self
            .http_client
            .post(&self.devicecode_url)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Device code request failed: HTTP {} - {}", status, body);
            let reason = serde_json::from_str::<super::token::TokenErrorResponse>(&body)
                .map(|e| format!("{}: {}", e.error, e.error_description))
                .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()));
            return Err(AuthError::DeviceCodeRequestFailed(reason));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::DeviceCodeRequestFailed(e.to_string()))
    }

    /// Poll until the operator completes sign-in or the code expires.
    async fn poll_for_token(&self, info: &DeviceCodeInfo) -> Result<TokenResponse, AuthError> {
        let deadline = Instant::now() + Duration::from_secs(info.expires_in);
        let mut interval = Duration::from_secs(info.interval);

        let params = [
            ("grant_type", DEVICE_CODE_GRANT),
            ("client_id", self.client_id.as_str()),
            ("device_code", info.device_code.as_str()),
        ];

        loop {
            tokio::time::sleep(interval).await;
            if Instant::now() >= deadline {
                return Err(AuthError::DeviceCodeExpired);
            }

            match request_token(&self.http_client, &self.token_url, &params).await? {
                TokenOutcome::Issued(response) => return Ok(response),
                TokenOutcome::Rejected(rejection) => match rejection.error.as_str() {
                    "authorization_pending" => debug!("Waiting for device code sign-in"),
                    "slow_down" => {
                        interval += self.slow_down_step;
                        debug!("Slowing device code polling to {:?}", interval);
                    }
                    "authorization_declined" | "access_denied" => {
                        return Err(AuthError::AuthorizationDeclined)
                    }
                    "expired_token" | "code_expired" => return Err(AuthError::DeviceCodeExpired),
                    _ => return Err(rejection.into()),
                },
            }
        }
    }

    async fn refresh(
        &self,
        refresh_token: &SecureString,
        scope: &str,
    ) -> Result<Option<TokenResponse>, AuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("scope", scope),
        ];

        match request_token(&self.http_client, &self.token_url, &params).await? {
            TokenOutcome::Issued(response) => Ok(Some(response)),
            TokenOutcome::Rejected(rejection) => {
                warn!(
                    "Refresh token rejected ({}), falling back to device code sign-in",
                    rejection.error
                );
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl TokenCredential for DeviceCodeCredential {
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken, AuthError> {
        if scopes.is_empty() {
            return Err(AuthError::NoScopes);
        }

        let scope = scope_param(scopes);
        // offline_access makes the endpoint return a refresh token.
        let requested = format!("{} offline_access", scope);

        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.as_ref().and_then(|c| c.valid_for(&scope)) {
            return Ok(token);
        }

        let previous_refresh = cache.as_ref().and_then(|c| c.refresh_token.clone());
        let refreshed = match &previous_refresh {
            Some(refresh_token) => self.refresh(refresh_token, &requested).await?,
            None => None,
        };

        let response = match refreshed {
            Some(response) => {
                debug!("Access token refreshed");
                response
            }
            None => {
                let info = self.request_device_code(&requested).await?;
                self.prompt.prompt(&info).await;
                let response = self.poll_for_token(&info).await?;
                info!("Device code sign-in completed");
                response
            }
        };

        let token = AccessToken::from_response(&response);
        let refresh_token = response
            .refresh_token
            .clone()
            .map(SecureString::new)
            .or(previous_refresh);

        *cache = Some(CachedToken {
            scopes: scope,
            token: token.clone(),
            refresh_token,
        });
        Ok(token)
    }
}
