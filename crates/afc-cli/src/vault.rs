use std::sync::Arc;

use afc_agent::{
    openai::{OpenAiAgent, OpenAiSettings},
    pipeline::AnsweringPipeline,
    prompt::PromptTemplate,
};
use afc_core::{
    agent::{Agent, EchoAgent},
    secrets::SecretBundle,
};
use afc_vault::{
    gate::DecryptionGate,
    sources::{EnvSource, KeyringSource, SecretLoader, SecretsFile},
};
use color_eyre::Result;
use tracing::debug;

use crate::config::{Config, SecretStoreKind};

/// Keychain service name for `secret_store = "keyring"`.
pub const KEYRING_SERVICE: &str = "afc-assist";

/// Configured store first, then the process environment.
pub fn secret_loader(config: &Config) -> Result<SecretLoader> {
    let loader = match config.secret_store() {
        SecretStoreKind::File => {
            let file = SecretsFile::load(config.secrets_path()?)?;
            debug!(path = %file.path().display(), "using secrets file");
            SecretLoader::new().with_layer(file)
        }
        SecretStoreKind::Keyring => {
            debug!(service = KEYRING_SERVICE, "using keychain secrets");
            SecretLoader::new().with_layer(KeyringSource::new(KEYRING_SERVICE))
        }
    };
    Ok(loader.with_layer(EnvSource))
}

/// Resolve every required secret; fails before any prompt is shown.
pub fn load_secrets(config: &Config) -> Result<SecretBundle> {
    Ok(secret_loader(config)?.load()?)
}

pub fn gate(config: &Config, secrets: &SecretBundle) -> DecryptionGate {
    DecryptionGate::new(secrets, config.knowledge_path())
}

/// Answering pipeline for the configured model, or an echo of the composed
/// prompt when `dry_run` is set.
pub fn pipeline(config: &Config, secrets: &SecretBundle, dry_run: bool) -> AnsweringPipeline {
    let agent: Arc<dyn Agent + Send + Sync> = if dry_run {
        Arc::new(EchoAgent)
    } else {
        let settings = OpenAiSettings::new(secrets.api_key())
            .with_model(config.model())
            .with_api_base(config.endpoint());
        let agent = OpenAiAgent::new(settings);
        debug!(model = agent.model(), "using hosted model");
        Arc::new(agent)
    };

    AnsweringPipeline::new(agent)
        .with_template(PromptTemplate::default().with_sentinel(config.sentinel()))
        .with_timeout(config.timeout())
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use afc_core::secrets::{KeyMaterial, ENCRYPTION_KEY};
    use afc_vault::sources::encode_key;

    use super::*;

    fn file_config(dir: &Path, secrets: &str) -> Config {
        let secrets_path = dir.join("secrets.toml");
        fs::write(&secrets_path, secrets).expect("write secrets");
        Config {
            knowledge_path: Some(dir.join("afc_data.enc")),
            secrets_path: Some(secrets_path),
            ..Config::default()
        }
    }

    #[test]
    fn loads_bundle_from_secrets_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let key = KeyMaterial::from_bytes(vec![7; 32]).unwrap();
        let cfg = file_config(
            dir.path(),
            &format!(
                "ENCRYPTION_KEY = \"{}\"\nGOOGLE_API_KEY = \"api\"\nPASSWORD = \"hunter2\"\n",
                encode_key(&key)
            ),
        );

        let secrets = load_secrets(&cfg).expect("secrets");
        assert_eq!(secrets.encryption_key.as_bytes(), key.as_bytes());
        assert_eq!(secrets.api_key(), "api");
        assert_eq!(secrets.expected_password(), "hunter2");
    }

    #[test]
    fn malformed_key_in_file_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = file_config(
            dir.path(),
            "ENCRYPTION_KEY = \"not base64!\"\nGOOGLE_API_KEY = \"api\"\nPASSWORD = \"pw\"\n",
        );

        let err = load_secrets(&cfg).expect_err("bad key");
        assert!(err.to_string().contains("invalid key encoding"), "{err}");
    }

    #[test]
    fn loader_resolves_single_secret_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = file_config(dir.path(), "ENCRYPTION_KEY = \" abc= \"\n");

        let loader = secret_loader(&cfg).expect("loader");
        assert_eq!(
            loader.resolve(ENCRYPTION_KEY).unwrap().as_deref(),
            Some(" abc= ")
        );
    }

    #[test]
    fn configured_password_with_spaces_unlocks_verbatim() {
        let dir = tempfile::tempdir().expect("tempdir");
        let key = KeyMaterial::from_bytes(vec![9; 32]).unwrap();
        let cfg = file_config(
            dir.path(),
            &format!(
                "ENCRYPTION_KEY = \"{}\"\nGOOGLE_API_KEY = \"api\"\nPASSWORD = \" pass phrase \"\n",
                encode_key(&key)
            ),
        );
        fs::write(
            cfg.knowledge_path(),
            afc_vault::blob::seal(b"Fault X: reset the reader.", &key).unwrap(),
        )
        .expect("write blob");

        let secrets = load_secrets(&cfg).expect("secrets");
        let gate = gate(&cfg, &secrets);

        let document = gate.unlock(" pass phrase ").expect("exact password unlocks");
        assert_eq!(document.as_str(), "Fault X: reset the reader.");
        assert_eq!(
            gate.unlock("pass phrase").expect_err("trimmed password"),
            afc_core::knowledge::GateError::WrongPassword
        );
    }

    #[tokio::test]
    async fn dry_run_pipeline_echoes_prompt_with_configured_sentinel() {
        let cfg: Config = toml::from_str(
            r#"
            [prompt]
            sentinel = "Not in the manual."
        "#,
        )
        .expect("parse");
        let secrets = SecretBundle::new(
            KeyMaterial::from_bytes(vec![1; 16]).unwrap(),
            "api",
            "pw",
        );

        let pipeline = pipeline(&cfg, &secrets, true);
        assert_eq!(pipeline.agent_name(), "echo");
        let answer = pipeline.answer("Where is gate 3?", "Gate 3 is north.").await;
        assert!(answer.contains("Not in the manual."));
        assert!(answer.contains("Gate 3 is north."));
    }

    #[test]
    fn gate_points_at_configured_knowledge_path() {
        let cfg = Config {
            knowledge_path: Some("/srv/afc/afc_data.enc".into()),
            ..Config::default()
        };
        let secrets = SecretBundle::new(
            KeyMaterial::from_bytes(vec![1; 16]).unwrap(),
            "api",
            "pw",
        );
        let gate = gate(&cfg, &secrets);
        assert_eq!(gate.blob_path(), Path::new("/srv/afc/afc_data.enc"));
    }
}
