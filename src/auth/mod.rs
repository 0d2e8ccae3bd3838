//! Azure AD authentication module.
//!
//! Provides the device-code user credential, the client-secret app credential,
//! and the broker that builds each of them at most once.

pub mod broker;
pub mod client_secret;
pub mod device_code;
pub mod token;
