//! Error types for the graph-tutorial application.
//!
//! Uses `thiserror` for library-style errors with automatic `Display` and `Error` implementations.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An operation ran before the credential or client it needs was built.
    #[error("{0}")]
    NotInitialized(&'static str),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading settings. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("required configuration file {} not found", .0.display())]
    MissingFile(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("required configuration section '{0}' not found")]
    MissingSection(&'static str),

    #[error("invalid settings: {0}")]
    Invalid(String),

    #[error("secret store lookup failed: {0}")]
    SecretStore(#[from] SecretStoreError),
}

/// Authentication-related errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Device code request failed: {0}")]
    DeviceCodeRequestFailed(String),

    #[error("Token request failed: {error}: {description}")]
    TokenRequestFailed { error: String, description: String },

    #[error("The device code expired before sign-in completed")]
    DeviceCodeExpired,

    #[error("The user declined the sign-in request")]
    AuthorizationDeclined,

    #[error("No client secret is configured for app-only authentication")]
    MissingClientSecret,

    #[error("Argument 'scopes' cannot be empty")]
    NoScopes,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Graph API errors.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Graph request failed (HTTP {status}): {code}: {message}")]
    Graph {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Failed to parse API response: {0}")]
    ParseFailed(String),

    #[error("Unauthorized (401): {0}")]
    Unauthorized(String),

    #[error("Forbidden (403): {0}")]
    Forbidden(String),

    #[error("Not found (404): {0}")]
    NotFound(String),

    #[error("Rate limited (429): retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),
}

/// Secret store errors.
#[derive(Error, Debug)]
pub enum SecretStoreError {
    #[error("no ambient credential: set AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET")]
    NoAmbientCredential,

    #[error("secret '{0}' not found")]
    NotFound(String),

    #[error("unauthorized to read secrets")]
    Unauthorized,

    #[error("forbidden to read secret '{0}'")]
    Forbidden(String),

    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl AppError {
    /// Returns a user-friendly hint for display next to the raw message.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Config(_) => "Configuration error. Please check appsettings.json.",
            Self::NotInitialized(_) => "Graph has not been initialized for this operation.",
            // Token failures surface wrapped in ApiError when a Graph call needed one.
            Self::Auth(e) | Self::Api(ApiError::Auth(e)) => auth_hint(e),
            Self::Api(ApiError::Unauthorized(_)) => "Authentication expired. Sign in again.",
            Self::Api(ApiError::Forbidden(_)) => "Insufficient permissions for this operation.",
            Self::Api(ApiError::RateLimited { .. }) => "Too many requests. Please wait a moment.",
            Self::Api(ApiError::Network(_)) => "Network error. Check your connection.",
            _ => "An error occurred. Please try again.",
        }
    }

    /// Returns true for failures reported by the identity provider or Graph.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Api(_))
    }
}

fn auth_hint(error: &AuthError) -> &'static str {
    match error {
        AuthError::DeviceCodeExpired => "Sign-in timed out. Please try again.",
        AuthError::AuthorizationDeclined => "Sign-in was cancelled.",
        AuthError::MissingClientSecret => {
            "App-only auth needs a client secret. Check the key vault settings."
        }
        _ => "Sign-in failed. Please try again.",
    }
}
