//! Configuration loading and management.
//!
//! Settings are layered JSON: the required `appsettings.json`, an optional
//! `appsettings.local.json`, an optional per-user `secrets.json`, and finally the
//! Graph client secret from Key Vault. Later layers override earlier ones.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::secrets::{SecretStore, SecureString, GRAPH_SECRET_NAME};

/// Top-level section holding the settings.
pub const SETTINGS_SECTION: &str = "Settings";

/// Azure AD authority used when `authorityHost` is not configured.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Graph endpoint used when `graphEndpoint` is not configured.
pub const DEFAULT_GRAPH_ENDPOINT: &str = "https://graph.microsoft.com/v1.0";

const BASE_FILE: &str = "appsettings.json";
const LOCAL_FILE: &str = "appsettings.local.json";
const USER_SECRETS_FILE: &str = "secrets.json";

/// Application settings. Immutable once loaded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<SecureString>,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default = "default_auth_tenant")]
    pub auth_tenant: String,
    #[serde(default)]
    pub graph_user_scopes: Vec<String>,
    #[serde(default)]
    pub key_vault_name: Option<String>,
    #[serde(default = "default_authority_host")]
    pub authority_host: String,
    #[serde(default = "default_graph_endpoint")]
    pub graph_endpoint: String,
}

fn default_auth_tenant() -> String {
    "common".to_string()
}

fn default_authority_host() -> String {
    DEFAULT_AUTHORITY_HOST.to_string()
}

fn default_graph_endpoint() -> String {
    DEFAULT_GRAPH_ENDPOINT.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            tenant_id: String::new(),
            auth_tenant: default_auth_tenant(),
            graph_user_scopes: Vec::new(),
            key_vault_name: None,
            authority_host: default_authority_host(),
            graph_endpoint: default_graph_endpoint(),
        }
    }
}

impl Settings {
    /// Validate that required configuration is present.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "clientId not configured. Update appsettings.json".to_string(),
            ));
        }
        Ok(())
    }

    /// Key Vault name, if one is configured.
    pub fn vault_name(&self) -> Option<&str> {
        self.key_vault_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// Where the configuration layers are read from.
#[derive(Debug, Clone)]
pub struct ConfigSources {
    pub base: PathBuf,
    pub local: PathBuf,
    pub user_secrets: Option<PathBuf>,
}

impl ConfigSources {
    /// `appsettings*.json` in the working directory plus the per-user secrets file.
    pub fn default_paths() -> Self {
        let user_secrets = ProjectDirs::from("com", "contoso", "graph-tutorial")
            .map(|dirs| dirs.config_dir().join(USER_SECRETS_FILE));

        Self {
            base: PathBuf::from(BASE_FILE),
            local: PathBuf::from(LOCAL_FILE),
            user_secrets,
        }
    }

    /// Both `appsettings*.json` files inside `dir`, without user secrets.
    #[cfg(test)]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            base: dir.join(BASE_FILE),
            local: dir.join(LOCAL_FILE),
            user_secrets: None,
        }
    }
}

/// Load settings from every file layer, then overwrite the client secret from
/// the secret store when a vault is configured.
pub async fn load_settings(
    sources: &ConfigSources,
    secret_store: &dyn SecretStore,
) -> Result<Settings, ConfigError> {
    let mut settings = load_file_layers(sources)?;

    match settings.vault_name() {
        Some(vault) => {
            let secret = secret_store.get_secret(vault, GRAPH_SECRET_NAME).await?;
            info!("Client secret loaded from key vault {}", vault);
            settings.client_secret = Some(secret);
        }
        None => warn!("No keyVaultName configured, keeping client secret from configuration files"),
    }

    Ok(settings)
}

/// Merge the JSON layers and bind the `Settings` section.
fn load_file_layers(sources: &ConfigSources) -> Result<Settings, ConfigError> {
    let mut merged = read_json(&sources.base)?
        .ok_or_else(|| ConfigError::MissingFile(sources.base.clone()))?;

    let optional = std::iter::once(&sources.local).chain(sources.user_secrets.as_ref());
    for path in optional {
        if let Some(layer) = read_json(path)? {
            debug!("Applying configuration overrides from {}", path.display());
            merge(&mut merged, layer);
        }
    }

    let section = match merged.get_mut(SETTINGS_SECTION) {
        Some(section) if section.is_object() => section.take(),
        _ => return Err(ConfigError::MissingSection(SETTINGS_SECTION)),
    };

    // The section is merged from every layer, so no single file is to blame.
    let settings: Settings = serde_json::from_value(section).map_err(|e| {
        ConfigError::Invalid(format!("merged '{}' section: {}", SETTINGS_SECTION, e))
    })?;
    settings.validate()?;
    Ok(settings)
}

/// Read a JSON file, returning `None` when it does not exist.
fn read_json(path: &Path) -> Result<Option<Value>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Deep-merge `overlay` into `base`. Objects merge key by key; anything else replaces.
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
