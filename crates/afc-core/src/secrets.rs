use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use zeroize::Zeroizing;

/// Base64-encoded AES key used to decrypt the knowledge file.
pub const ENCRYPTION_KEY: &str = "ENCRYPTION_KEY";
/// Credential for the hosted model API.
pub const API_KEY: &str = "GOOGLE_API_KEY";
/// Shared password that unlocks the knowledge file.
pub const PASSWORD: &str = "PASSWORD";

/// Every secret that must resolve before the assistant may start.
pub const REQUIRED_SECRETS: [&str; 3] = [ENCRYPTION_KEY, API_KEY, PASSWORD];

/// Errors raised while resolving secrets. All of them are fatal: the caller
/// must stop before prompting for a password.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required secret: {name}")]
    MissingSecret { name: String },
    #[error("invalid key encoding: {reason}")]
    InvalidKeyEncoding { reason: String },
    #[error("invalid key length: expected 16, 24 or 32 bytes, got {len}")]
    InvalidKeyLength { len: usize },
    /// The backing store itself failed (unreadable file, keychain error).
    #[error("secret source failure: {reason}")]
    Source { reason: String },
}

impl ConfigError {
    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingSecret { name: name.into() }
    }
}

/// Raw AES key bytes. Zeroized on drop and never printed.
#[derive(Clone)]
pub struct KeyMaterial {
    bytes: Zeroizing<Vec<u8>>,
}

impl KeyMaterial {
    /// AES-128, AES-192 and AES-256 key sizes.
    pub const VALID_LENGTHS: [usize; 3] = [16, 24, 32];

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ConfigError> {
        let bytes = Zeroizing::new(bytes);
        if !Self::VALID_LENGTHS.contains(&bytes.len()) {
            return Err(ConfigError::InvalidKeyLength { len: bytes.len() });
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Short, non-reversible identifier for cache keys and logs.
    pub fn fingerprint(&self) -> String {
        blake3::hash(&self.bytes).to_hex()[..16].to_string()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("len", &self.bytes.len())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Everything the assistant needs from configuration, resolved once at
/// startup and handed to the gate and pipeline constructors.
#[derive(Debug)]
pub struct SecretBundle {
    pub encryption_key: KeyMaterial,
    pub api_key: SecretString,
    pub expected_password: SecretString,
}

impl SecretBundle {
    pub fn new(
        encryption_key: KeyMaterial,
        api_key: impl Into<String>,
        expected_password: impl Into<String>,
    ) -> Self {
        Self {
            encryption_key,
            api_key: SecretString::from(api_key.into()),
            expected_password: SecretString::from(expected_password.into()),
        }
    }

    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    pub fn expected_password(&self) -> &str {
        self.expected_password.expose_secret()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_material_accepts_aes_lengths_only() {
        for len in KeyMaterial::VALID_LENGTHS {
            let key = KeyMaterial::from_bytes(vec![7u8; len]).expect("valid length");
            assert_eq!(key.len(), len);
        }

        let err = KeyMaterial::from_bytes(vec![7u8; 31]).expect_err("31 bytes is not AES");
        assert_eq!(err, ConfigError::InvalidKeyLength { len: 31 });
    }

    #[test]
    fn fingerprint_is_stable_and_distinct() {
        let a = KeyMaterial::from_bytes(vec![1u8; 32]).unwrap();
        let b = KeyMaterial::from_bytes(vec![2u8; 32]).unwrap();

        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }

    #[test]
    fn debug_output_never_contains_secrets() {
        let bundle = SecretBundle::new(
            KeyMaterial::from_bytes(vec![0xAB; 16]).unwrap(),
            "api-key-value",
            "hunter2",
        );
        let rendered = format!("{bundle:?}");

        assert!(!rendered.contains("api-key-value"));
        assert!(!rendered.contains("hunter2"));
        assert_eq!(bundle.api_key(), "api-key-value");
        assert_eq!(bundle.expected_password(), "hunter2");
    }
}
