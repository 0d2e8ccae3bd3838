//! Secure string wrapper that is zeroized on drop.
//!
//! Client secrets and bearer tokens live in this type so they are cleared from
//! memory when no longer needed and never show up in `Debug` output.

use serde::{Deserialize, Deserializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secure string wrapper that zeroizes its contents on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureString(String);

impl SecureString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecureString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_string_debug() {
        let secret = SecureString::new("super_secret_token".to_string());
        let debug_output = format!("{:?}", secret);
        assert_eq!(debug_output, "[REDACTED]");
        assert!(!debug_output.contains("super_secret"));
    }

    #[test]
    fn test_secure_string_access() {
        let secret = SecureString::new("my_token".to_string());
        assert_eq!(secret.as_str(), "my_token");
        assert!(!secret.is_empty());
    }

    #[test]
    fn test_deserialize_from_json() {
        let secret: Option<SecureString> = serde_json::from_str("\"s3cr3t\"").unwrap();
        assert_eq!(secret.unwrap().as_str(), "s3cr3t");

        let missing: Option<SecureString> = serde_json::from_str("null").unwrap();
        assert!(missing.is_none());
    }
}
