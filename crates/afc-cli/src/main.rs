mod cli;
mod config;
mod input;
mod vault;

use std::{
    io,
    path::{Path, PathBuf},
};

use afc_agent::pipeline::AnsweringPipeline;
use afc_core::{
    knowledge::KnowledgeDocument,
    secrets::{ConfigError, ENCRYPTION_KEY, PASSWORD},
};
use afc_vault::{
    blob,
    gate::DecryptionGate,
    sources::{decode_key, KeyringSource},
};
use clap::Parser;
use color_eyre::Result;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Command, ConfigCommand, SecretsCommand};

/// Entry point wiring the CLI to the gate and the answering pipeline.
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load(cli.config.as_deref())?;
    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(&config, cli.password_stdin).await?,
        Command::Ask { question, dry_run } => {
            run_ask(question, dry_run, &config, cli.password_stdin).await?
        }
        Command::Check => run_check(&config, cli.password_stdin)?,
        Command::Seal { input, output } => run_seal(&input, output, &config)?,
        Command::Secrets(SecretsCommand::Set { name }) => set_secret(&name, &config)?,
        Command::Version => print_version(),
        Command::Config(ConfigCommand::Init) => init_config(cli.config.as_deref())?,
    }

    Ok(())
}

fn init_tracing() {
    // Answers go to stdout; keep logs on stderr and quiet unless asked.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("afc-assist {}", env!("CARGO_PKG_VERSION"));
}

fn init_config(explicit: Option<&Path>) -> Result<()> {
    let target = match explicit {
        Some(path) => path.to_path_buf(),
        None => config::default_path()?,
    };
    let path = config::write_if_missing(&config::starter_config(), &target)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

/// Unlock once, then answer until the user quits. Answering failures are
/// printed and the session continues.
async fn run_chat(config: &config::Config, password_stdin: bool) -> Result<()> {
    let secrets = vault::load_secrets(config)?;
    let gate = vault::gate(config, &secrets);
    let pipeline = vault::pipeline(config, &secrets, false);

    let document = unlock_with_prompt(&gate, password_stdin)?;
    eprintln!("Knowledge base unlocked. Ask a question, or enter a blank line to quit.");

    while let Some(question) = input::read_question()? {
        let answer = answer_question(&pipeline, &document, &question).await;
        println!("{answer}\n");
    }
    Ok(())
}

async fn run_ask(
    words: Vec<String>,
    dry_run: bool,
    config: &config::Config,
    password_stdin: bool,
) -> Result<()> {
    let secrets = vault::load_secrets(config)?;
    let gate = vault::gate(config, &secrets);
    let pipeline = vault::pipeline(config, &secrets, dry_run);

    let document = unlock_with_prompt(&gate, password_stdin)?;

    let question = match input::normalize_question(&words.join(" ")) {
        Some(question) => question,
        None => input::read_question()?
            .ok_or_else(|| color_eyre::eyre::eyre!("no question given"))?,
    };

    let answer = answer_question(&pipeline, &document, &question).await;
    println!("{answer}");
    Ok(())
}

fn run_check(config: &config::Config, password_stdin: bool) -> Result<()> {
    let secrets = vault::load_secrets(config)?;
    println!("Secrets: ok");
    let gate = vault::gate(config, &secrets);
    let password = input::read_password(password_stdin)?;
    let bytes = check_knowledge(&gate, &password)?;
    println!("Knowledge: ok ({bytes} bytes)");
    Ok(())
}

/// Unlock the knowledge file and report its decrypted size.
fn check_knowledge(gate: &DecryptionGate, password: &str) -> Result<usize> {
    let document = gate.unlock(password)?;
    Ok(document.len())
}

fn unlock_with_prompt(
    gate: &DecryptionGate,
    password_stdin: bool,
) -> Result<std::sync::Arc<KnowledgeDocument>> {
    let password = input::read_password(password_stdin)?;
    Ok(gate.unlock(&password)?)
}

async fn answer_question(
    pipeline: &AnsweringPipeline,
    document: &KnowledgeDocument,
    question: &str,
) -> String {
    pipeline.answer(question, document.as_str()).await
}

/// Encrypt a plaintext knowledge file. Only the encryption key is needed.
fn run_seal(input: &Path, output: Option<PathBuf>, config: &config::Config) -> Result<()> {
    let loader = vault::secret_loader(config)?;
    let encoded = loader
        .resolve(ENCRYPTION_KEY)?
        .ok_or_else(|| ConfigError::missing(ENCRYPTION_KEY))?;
    let key = decode_key(&encoded)?;

    let output = output.unwrap_or_else(|| config.knowledge_path());
    let bytes = blob::seal_file(input, &output, &key)?;
    info!(key = ?key, "sealed knowledge file");
    println!("Sealed {bytes} bytes into {}", output.display());
    Ok(())
}

fn set_secret(name: &str, config: &config::Config) -> Result<()> {
    let raw = input::read_secret_value(name)?;
    let value = if name == PASSWORD { raw.as_str() } else { raw.trim() };
    if value.trim().is_empty() {
        color_eyre::eyre::bail!("{name} must not be blank");
    }
    if name == ENCRYPTION_KEY {
        decode_key(value)?;
    }

    KeyringSource::new(vault::KEYRING_SERVICE).store(name, value)?;
    println!("Stored {name} in the OS keychain");
    if config.secret_store() != config::SecretStoreKind::Keyring {
        warn!("secret_store is not \"keyring\"; the stored value will not be read");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::Arc};

    use afc_core::{
        agent::EchoAgent,
        knowledge::{DecryptError, GateError},
        secrets::{KeyMaterial, SecretBundle},
    };

    use super::*;

    fn sealed_gate(dir: &Path, text: &str) -> DecryptionGate {
        let secrets = SecretBundle::new(
            KeyMaterial::from_bytes(vec![0x42; 32]).unwrap(),
            "api",
            "hunter2",
        );
        let path = dir.join("afc_data.enc");
        fs::write(&path, blob::seal(text.as_bytes(), &secrets.encryption_key).unwrap())
            .expect("write blob");
        DecryptionGate::new(&secrets, path)
    }

    #[test]
    fn check_reports_decrypted_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        let gate = sealed_gate(dir.path(), "Fault X: reset the reader.");

        let bytes = check_knowledge(&gate, "hunter2").expect("check should succeed");
        assert_eq!(bytes, "Fault X: reset the reader.".len());
    }

    #[test]
    fn check_fails_on_wrong_password() {
        let dir = tempfile::tempdir().expect("tempdir");
        let gate = sealed_gate(dir.path(), "Fault X: reset the reader.");

        let err = check_knowledge(&gate, "hunter3").expect_err("wrong password");
        assert_eq!(
            err.downcast_ref::<GateError>(),
            Some(&GateError::WrongPassword)
        );
    }

    #[test]
    fn check_fails_when_knowledge_file_is_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let gate = sealed_gate(dir.path(), "text");
        fs::remove_file(gate.blob_path()).expect("remove blob");

        let err = check_knowledge(&gate, "hunter2").expect_err("missing file");
        assert!(matches!(
            err.downcast_ref::<GateError>(),
            Some(GateError::Decrypt(DecryptError::FileNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn answer_with_echo_agent_embeds_unlocked_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let gate = sealed_gate(dir.path(), "Fault X: reset the reader.");
        let document = gate.unlock("hunter2").expect("unlock");
        let pipeline = AnsweringPipeline::new(Arc::new(EchoAgent));

        let answer = answer_question(&pipeline, &document, "How do I resolve Fault X?").await;
        assert!(answer.contains("Fault X: reset the reader."));
        assert!(answer.contains("How do I resolve Fault X?"));
    }

    #[test]
    fn init_config_writes_to_explicit_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("afc").join("config.toml");

        init_config(Some(&path)).expect("init");
        let cfg = config::load_from_path(&path).expect("load");
        assert_eq!(cfg, config::starter_config());
    }
}
