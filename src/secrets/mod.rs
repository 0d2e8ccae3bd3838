//! Secret handling: zeroized strings and the Azure Key Vault secret store.
//!
//! Settings loading reads exactly one secret (the Graph client secret) from Key Vault,
//! authenticating with the service principal found in the process environment.

pub mod secure;

pub use secure::SecureString;

use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error};

use crate::auth::client_secret::ClientSecretCredential;
use crate::auth::token::TokenCredential;
use crate::config::DEFAULT_AUTHORITY_HOST;
use crate::error::SecretStoreError;

/// Name of the secret holding the app registration's client secret.
pub const GRAPH_SECRET_NAME: &str = "clientSecretForGraph";

/// Key Vault data-plane API version.
const KEY_VAULT_API_VERSION: &str = "7.4";

/// Scope for Key Vault data-plane tokens.
const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";

/// Read-only access to a named secret in a named vault.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(
        &self,
        vault_name: &str,
        secret_name: &str,
    ) -> Result<SecureString, SecretStoreError>;
}

/// Azure Key Vault secret store.
pub struct KeyVaultSecretStore {
    http_client: reqwest::Client,
    credential: Option<Arc<dyn TokenCredential>>,
    vault_uri_override: Option<String>,
}

impl KeyVaultSecretStore {
    /// Without a credential the store is still usable; lookups then fail with
    /// [`SecretStoreError::NoAmbientCredential`].
    pub fn new(http_client: reqwest::Client, credential: Option<Arc<dyn TokenCredential>>) -> Self {
        Self {
            http_client,
            credential,
            vault_uri_override: None,
        }
    }

    /// Build a store authenticated by the ambient service principal
    /// (`AZURE_TENANT_ID`, `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET`).
    pub fn from_env(http_client: reqwest::Client) -> Self {
        let credential = match (
            env::var("AZURE_TENANT_ID"),
            env::var("AZURE_CLIENT_ID"),
            env::var("AZURE_CLIENT_SECRET"),
        ) {
            (Ok(tenant), Ok(client_id), Ok(secret)) => {
                let authority = env::var("AZURE_AUTHORITY_HOST")
                    .unwrap_or_else(|_| DEFAULT_AUTHORITY_HOST.to_string());
                Some(Arc::new(ClientSecretCredential::new(
                    http_client.clone(),
                    &authority,
                    &tenant,
                    &client_id,
                    Some(SecureString::new(secret)),
                )) as Arc<dyn TokenCredential>)
            }
            _ => {
                debug!("No ambient service principal in environment");
                None
            }
        };

        Self::new(http_client, credential)
    }

    #[cfg(test)]
    pub fn with_vault_uri(mut self, uri: &str) -> Self {
        self.vault_uri_override = Some(uri.trim_end_matches('/').to_string());
        self
    }

    fn vault_uri(&self, vault_name: &str) -> String {
        match &self.vault_uri_override {
            Some(uri) => uri.clone(),
            None => format!("https://{}.vault.azure.net", vault_name),
        }
    }
}

#[async_trait]
impl SecretStore for KeyVaultSecretStore {
    async fn get_secret(
        &self,
        vault_name: &str,
        secret_name: &str,
    ) -> Result<SecureString, SecretStoreError> {
        let credential = self
            .credential
            .as_ref()
            .ok_or(SecretStoreError::NoAmbientCredential)?;

        let token = credential
            .get_token(&[KEY_VAULT_SCOPE.to_string()])
            .await?;

        let url = format!(
            "{}/secrets/{}?api-version={}",
            self.vault_uri(vault_name),
            urlencoding::encode(secret_name),
            KEY_VAULT_API_VERSION
        );
        debug!("Fetching secret {} from vault {}", secret_name, vault_name);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token.secret())
            .send()
            .await?;

        let status = response.status();
        match status.as_u16() {
            200 => {
                let bundle: SecretBundle = response
                    .json()
                    .await
                    .map_err(|e| SecretStoreError::InvalidResponse(e.to_string()))?;
                Ok(SecureString::new(bundle.value))
            }
            401 => Err(SecretStoreError::Unauthorized),
            403 => Err(SecretStoreError::Forbidden(secret_name.to_string())),
            404 => Err(SecretStoreError::NotFound(secret_name.to_string())),
            _ => {
                let body = response.text().await.unwrap_or_default();
                error!("Key Vault request failed: HTTP {} - {}", status, body);
                Err(SecretStoreError::InvalidResponse(format!("HTTP {}", status)))
            }
        }
    }
}

#[derive(Deserialize)]
struct SecretBundle {
    value: String,
}
