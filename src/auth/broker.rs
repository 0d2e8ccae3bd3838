//! Process-wide credential lifecycle.
//!
//! Holds at most one user credential and at most one app credential. Each lives in a
//! [`Slot`] that moves from `Uninitialized` to `Initialized` exactly once.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use super::client_secret::ClientSecretCredential;
use super::device_code::{DeviceCodeCredential, DeviceCodePrompt};
use crate::config::Settings;
use crate::error::AppError;

pub(crate) const SETTINGS_NOT_INITIALIZED: &str = "Settings cannot be null";

enum SlotState<T> {
    Uninitialized,
    Initialized(Arc<T>),
}

/// A value that is constructed at most once and then shared.
///
/// The initializer runs under the slot's lock.
pub(crate) struct Slot<T> {
    state: Mutex<SlotState<T>>,
}

impl<T> Slot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Uninitialized),
        }
    }

    pub fn get(&self) -> Option<Arc<T>> {
        match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            SlotState::Uninitialized => None,
            SlotState::Initialized(value) => Some(Arc::clone(value)),
        }
    }

    /// Return the stored value, building it with `init` on first use.
    pub fn get_or_init(&self, init: impl FnOnce() -> Arc<T>) -> Arc<T> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            SlotState::Initialized(value) => Arc::clone(value),
            SlotState::Uninitialized => {
                let value = init();
                *state = SlotState::Initialized(Arc::clone(&value));
                value
            }
        }
    }
}

/// Builds and owns the two credentials.
pub struct CredentialBroker {
    http_client: reqwest::Client,
    user: Slot<DeviceCodeCredential>,
    app: Slot<ClientSecretCredential>,
}

impl CredentialBroker {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            user: Slot::new(),
            app: Slot::new(),
        }
    }

    /// Build the device-code credential once. Later calls return the same instance
    /// and ignore `prompt`.
    pub fn ensure_user_credential(
        &self,
        settings: Option<&Settings>,
        prompt: Arc<dyn DeviceCodePrompt>,
    ) -> Result<Arc<DeviceCodeCredential>, AppError> {
        let settings = settings.ok_or(AppError::NotInitialized(SETTINGS_NOT_INITIALIZED))?;
        Ok(self.user.get_or_init(|| {
            info!("Creating device code credential for tenant {}", settings.auth_tenant);
            Arc::new(DeviceCodeCredential::new(
                self.http_client.clone(),
                settings,
                prompt,
            ))
        }))
    }

    /// Build the client-secret credential once. The secret is not checked here.
    pub fn ensure_app_credential(
        &self,
        settings: Option<&Settings>,
    ) -> Result<Arc<ClientSecretCredential>, AppError> {
        let settings = settings.ok_or(AppError::NotInitialized(SETTINGS_NOT_INITIALIZED))?;
        Ok(self.app.get_or_init(|| {
            info!("Creating client secret credential for tenant {}", settings.tenant_id);
            Arc::new(ClientSecretCredential::from_settings(
                self.http_client.clone(),
                settings,
            ))
        }))
    }
}
