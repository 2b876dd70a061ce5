use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use afc_core::{
    knowledge::{GateError, KnowledgeDocument},
    secrets::{KeyMaterial, SecretBundle},
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument, warn};

use crate::cache::DecryptCache;

/// Exact string equality, evaluated without an early exit on the first
/// differing byte. Lengths are not hidden.
pub fn authenticate(candidate: &str, expected: &str) -> bool {
    constant_time_eq(candidate.as_bytes(), expected.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Password check in front of the encrypted knowledge file.
///
/// The file is only read after the password matches; the decrypted text is
/// memoized in a [`DecryptCache`] that can be shared between gates.
pub struct DecryptionGate {
    expected_password: SecretString,
    key: KeyMaterial,
    blob_path: PathBuf,
    cache: DecryptCache,
}

impl DecryptionGate {
    pub fn new(secrets: &SecretBundle, blob_path: impl Into<PathBuf>) -> Self {
        Self {
            expected_password: SecretString::from(secrets.expected_password().to_owned()),
            key: secrets.encryption_key.clone(),
            blob_path: blob_path.into(),
            cache: DecryptCache::new(),
        }
    }

    pub fn with_cache(mut self, cache: DecryptCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn blob_path(&self) -> &Path {
        &self.blob_path
    }

    pub fn authenticate(&self, candidate: &str) -> bool {
        authenticate(candidate, self.expected_password.expose_secret())
    }

    /// Check `candidate` and, on a match, return the decrypted document.
    /// A wrong password never touches the file.
    #[instrument(skip_all, fields(path = %self.blob_path.display()))]
    pub fn unlock(&self, candidate: &str) -> Result<Arc<KnowledgeDocument>, GateError> {
        if !self.authenticate(candidate) {
            warn!("password rejected");
            return Err(GateError::WrongPassword);
        }

        let document = self.cache.get_or_decrypt(&self.blob_path, &self.key)?;
        info!(bytes = document.len(), "knowledge document unlocked");
        Ok(document)
    }
}
