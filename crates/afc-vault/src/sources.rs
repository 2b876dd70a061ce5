use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use afc_core::secrets::{
    ConfigError, KeyMaterial, SecretBundle, API_KEY, ENCRYPTION_KEY, PASSWORD,
};
use base64::{engine::general_purpose, Engine as _};
use tracing::{debug, instrument};

/// One layer of secret configuration. Layers are consulted in order by
/// [`SecretLoader`]; `Ok(None)` means "not here, ask the next layer".
pub trait SecretSource: Send + Sync {
    /// Layer name for logs. Never log the values themselves.
    fn name(&self) -> &'static str;

    fn lookup(&self, key: &str) -> Result<Option<String>, ConfigError>;
}

/// Flat TOML secrets file (`ENCRYPTION_KEY = "..."`). A missing file is an
/// empty layer; a file that exists but does not parse is an error.
pub struct SecretsFile {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl SecretsFile {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let values = read_secrets_table(&path)?;
        debug!(path = %path.display(), entries = values.len(), "loaded secrets file");
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SecretSource for SecretsFile {
    fn name(&self) -> &'static str {
        "secrets-file"
    }

    fn lookup(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(self.values.get(key).cloned())
    }
}

fn read_secrets_table(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(err) => return Err(source_err(format!("{}: {err}", path.display()))),
    };

    let table: toml::Table = toml::from_str(&contents)
        .map_err(|e| source_err(format!("{}: {e}", path.display())))?;

    let mut values = HashMap::new();
    for (key, value) in table {
        match value {
            toml::Value::String(s) => {
                values.insert(key, s);
            }
            // Only top-level keys are secrets.
            toml::Value::Table(_) => debug!(%key, "ignoring nested table in secrets file"),
            _ => {
                return Err(source_err(format!(
                    "{}: `{key}` must be a string",
                    path.display()
                )))
            }
        }
    }
    Ok(values)
}

/// OS keyring-backed layer. Each secret is an entry under `service` whose
/// account name is the secret name.
pub struct KeyringSource {
    service: String,
}

impl KeyringSource {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Store a secret in the keyring (used by `secrets set`), then read it
    /// back through a fresh entry so a store that drops writes is reported.
    pub fn store(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let entry = keyring::Entry::new(&self.service, key)
            .map_err(|e| source_err(format!("keyring: {e}")))?;
        entry
            .set_password(value)
            .map_err(|e| source_err(format!("keyring: {e}")))?;

        let read_back = keyring::Entry::new(&self.service, key)
            .and_then(|entry| entry.get_password());
        confirm_stored(key, value, read_back)
    }
}

fn confirm_stored(
    key: &str,
    expected: &str,
    read_back: Result<String, keyring::Error>,
) -> Result<(), ConfigError> {
    match read_back {
        Ok(stored) if stored == expected => Ok(()),
        Ok(_) => Err(source_err(format!(
            "keyring: {key} read back with a different value"
        ))),
        Err(keyring::Error::NoEntry) => Err(source_err(format!(
            "keyring: {key} was not persisted by the platform store"
        ))),
        Err(err) => Err(source_err(format!("keyring: {err}"))),
    }
}

impl SecretSource for KeyringSource {
    fn name(&self) -> &'static str {
        "keyring"
    }

    fn lookup(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let entry = keyring::Entry::new(&self.service, key)
            .map_err(|e| source_err(format!("keyring: {e}")))?;
        match entry.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(source_err(format!("keyring: {err}"))),
        }
    }
}

/// Process environment fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSource;

impl SecretSource for EnvSource {
    fn name(&self) -> &'static str {
        "env"
    }

    fn lookup(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(env::VarError::NotUnicode(_)) => {
                Err(source_err(format!("environment variable {key} is not unicode")))
            }
        }
    }
}

/// In-memory layer for tests and embedding.
#[derive(Default, Clone)]
pub struct InMemorySource {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, value: &str) -> Self {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(key.to_string(), value.to_string());
        }
        self
    }
}

impl SecretSource for InMemorySource {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn lookup(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let map = self
            .inner
            .lock()
            .map_err(|err| source_err(format!("lock poisoned: {err}")))?;
        Ok(map.get(key).cloned())
    }
}

/// Resolves the secret bundle from ordered layers, first non-empty value wins.
#[derive(Default)]
pub struct SecretLoader {
    layers: Vec<Box<dyn SecretSource>>,
}

impl SecretLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a lower-priority layer.
    pub fn with_layer(mut self, source: impl SecretSource + 'static) -> Self {
        self.layers.push(Box::new(source));
        self
    }

    /// Resolve one secret. Whitespace-only values count as absent; any other
    /// value is returned exactly as stored.
    pub fn resolve(&self, key: &str) -> Result<Option<String>, ConfigError> {
        for layer in &self.layers {
            if let Some(value) = layer.lookup(key)? {
                if !value.trim().is_empty() {
                    debug!(secret = key, layer = layer.name(), "resolved secret");
                    return Ok(Some(value));
                }
            }
        }
        Ok(None)
    }

    fn require(&self, key: &str) -> Result<String, ConfigError> {
        self.resolve(key)?.ok_or_else(|| ConfigError::missing(key))
    }

    /// Fails closed: every secret must resolve and the key must decode.
    #[instrument(skip_all, fields(layers = self.layers.len()))]
    pub fn load(&self) -> Result<SecretBundle, ConfigError> {
        let encoded_key = zeroize::Zeroizing::new(self.require(ENCRYPTION_KEY)?);
        let api_key = self.require(API_KEY)?.trim().to_string();
        // Compared byte for byte against what the user types.
        let password = self.require(PASSWORD)?;

        let encryption_key = decode_key(&encoded_key)?;
        debug!(key = ?encryption_key, "secret bundle ready");
        Ok(SecretBundle::new(encryption_key, api_key, password))
    }
}

/// Decode a standard, padded base64 key into AES key material.
pub fn decode_key(encoded: &str) -> Result<KeyMaterial, ConfigError> {
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| ConfigError::InvalidKeyEncoding {
            reason: e.to_string(),
        })?;
    KeyMaterial::from_bytes(bytes)
}

/// Base64 form of a key, as expected in `ENCRYPTION_KEY`.
pub fn encode_key(key: &KeyMaterial) -> String {
    general_purpose::STANDARD.encode(key.as_bytes())
}

fn source_err(reason: impl Into<String>) -> ConfigError {
    ConfigError::Source {
        reason: reason.into(),
    }
}
