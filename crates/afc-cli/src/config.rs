use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use afc_agent::{
    openai::{DEFAULT_API_BASE, DEFAULT_MODEL},
    pipeline::DEFAULT_TIMEOUT,
    prompt::NOT_IN_KNOWLEDGE_BASE,
};
use color_eyre::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "afc-assist";
const DEFAULT_KNOWLEDGE_FILE: &str = "afc_data.enc";

/// User-level configuration loaded from `~/.config/afc-assist/config.toml`
/// (platform-specific). Secrets never live here.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Encrypted knowledge file (nonce ‖ ciphertext ‖ tag).
    pub knowledge_path: Option<PathBuf>,
    /// Flat TOML secrets file; defaults to `secrets.toml` in the config dir.
    pub secrets_path: Option<PathBuf>,
    /// Store consulted before the environment.
    pub secret_store: Option<SecretStoreKind>,
    pub llm: Option<LlmConfig>,
    pub prompt: Option<PromptConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SecretStoreKind {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct LlmConfig {
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct PromptConfig {
    /// Exact reply for questions the knowledge text does not cover.
    pub sentinel: Option<String>,
}

impl Config {
    pub fn knowledge_path(&self) -> PathBuf {
        self.knowledge_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_KNOWLEDGE_FILE))
    }

    pub fn secrets_path(&self) -> Result<PathBuf> {
        match &self.secrets_path {
            Some(path) => Ok(path.clone()),
            None => Ok(default_dir()?.join("secrets.toml")),
        }
    }

    pub fn secret_store(&self) -> SecretStoreKind {
        self.secret_store.unwrap_or_default()
    }

    pub fn model(&self) -> String {
        self.llm
            .as_ref()
            .and_then(|c| c.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    pub fn endpoint(&self) -> String {
        self.llm
            .as_ref()
            .and_then(|c| c.endpoint.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
    }

    pub fn timeout(&self) -> Duration {
        self.llm
            .as_ref()
            .and_then(|c| c.timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn sentinel(&self) -> String {
        self.prompt
            .as_ref()
            .and_then(|c| c.sentinel.clone())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| NOT_IN_KNOWLEDGE_BASE.to_string())
    }
}

/// Load config from `path` or the default location; if missing, return defaults.
pub fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_from_path(path),
        None => load_from_path(default_path()?),
    }
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)?;
    Ok(cfg)
}

fn default_dir() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join(APP_DIR))
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    Ok(default_dir()?.join("config.toml"))
}

/// Write `config` to `path` unless a file is already there.
pub fn write_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}

/// Defaults written by `config init`, spelled out so users can edit them.
pub fn starter_config() -> Config {
    Config {
        knowledge_path: Some(PathBuf::from(DEFAULT_KNOWLEDGE_FILE)),
        secrets_path: None,
        secret_store: Some(SecretStoreKind::File),
        llm: Some(LlmConfig {
            model: Some(DEFAULT_MODEL.to_string()),
            endpoint: Some(DEFAULT_API_BASE.to_string()),
            timeout_secs: Some(DEFAULT_TIMEOUT.as_secs()),
        }),
        prompt: Some(PromptConfig {
            sentinel: Some(NOT_IN_KNOWLEDGE_BASE.to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_default_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_from_path(dir.path().join("config.toml")).expect("load");
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.knowledge_path(), PathBuf::from("afc_data.enc"));
        assert_eq!(cfg.secret_store(), SecretStoreKind::File);
        assert_eq!(cfg.model(), DEFAULT_MODEL);
        assert_eq!(cfg.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(cfg.sentinel(), NOT_IN_KNOWLEDGE_BASE);
    }

    #[test]
    fn parses_custom_config() {
        let contents = r#"
            knowledge_path = "/srv/afc/afc_data.enc"
            secrets_path = "/srv/afc/secrets.toml"
            secret_store = "keyring"
            [llm]
            model = "gemini-2.0-flash"
            endpoint = "http://localhost:8080/v1"
            timeout_secs = 15
            [prompt]
            sentinel = "Not in the manual."
        "#;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).expect("write temp config");

        let cfg = load(Some(&path)).expect("load");
        assert_eq!(
            cfg,
            Config {
                knowledge_path: Some(PathBuf::from("/srv/afc/afc_data.enc")),
                secrets_path: Some(PathBuf::from("/srv/afc/secrets.toml")),
                secret_store: Some(SecretStoreKind::Keyring),
                llm: Some(LlmConfig {
                    model: Some("gemini-2.0-flash".into()),
                    endpoint: Some("http://localhost:8080/v1".into()),
                    timeout_secs: Some(15),
                }),
                prompt: Some(PromptConfig {
                    sentinel: Some("Not in the manual.".into()),
                }),
            }
        );
        assert_eq!(cfg.timeout(), Duration::from_secs(15));
        assert_eq!(cfg.secrets_path().unwrap(), PathBuf::from("/srv/afc/secrets.toml"));
    }

    #[test]
    fn zero_timeout_and_blank_sentinel_fall_back_to_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [llm]
            timeout_secs = 0
            [prompt]
            sentinel = "  "
        "#,
        )
        .expect("parse");
        assert_eq!(cfg.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(cfg.sentinel(), NOT_IN_KNOWLEDGE_BASE);
    }

    #[test]
    fn rejects_unknown_secret_store() {
        let err = toml::from_str::<Config>("secret_store = \"vault\"");
        assert!(err.is_err());
    }

    #[test]
    fn write_creates_file_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let cfg = starter_config();

        write_if_missing(&cfg, &path).expect("write should succeed");
        fs::write(&path, "knowledge_path = \"edited.enc\"\n").expect("user edit");
        let second = write_if_missing(&cfg, &path).expect("second write ok");

        assert_eq!(second, path);
        let loaded = load_from_path(&path).expect("load");
        assert_eq!(loaded.knowledge_path(), PathBuf::from("edited.enc"));
    }

    #[test]
    fn starter_config_round_trips_through_toml() {
        let cfg = starter_config();
        let body = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&body).expect("parse");
        assert_eq!(parsed, cfg);
    }
}
