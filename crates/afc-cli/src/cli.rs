use std::path::PathBuf;

use afc_core::secrets::REQUIRED_SECRETS;
use clap::{builder::PossibleValuesParser, Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "afc-assist",
    about = "Password-gated Q&A over an encrypted AFC fault knowledge base",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true, env = "AFC_ASSIST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Read the password from one line of stdin instead of prompting.
    #[arg(long, global = true)]
    pub password_stdin: bool,

    /// Optional subcommand; defaults to an interactive chat session.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Unlock once, then answer questions until an empty line or `exit`.
    Chat,
    /// Unlock and answer a single question.
    Ask {
        /// Question text; prompted for when omitted.
        question: Vec<String>,
        /// Print the composed prompt instead of calling the model.
        #[arg(long)]
        dry_run: bool,
    },
    /// Verify secrets, password and decryption without calling the model.
    Check,
    /// Encrypt a plaintext knowledge file with the configured key.
    Seal {
        /// Plaintext (UTF-8) knowledge file.
        input: PathBuf,
        /// Destination; defaults to the configured knowledge path.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Manage secrets held in the OS keychain.
    #[command(subcommand)]
    Secrets(SecretsCommand),
    /// Print version and exit.
    Version,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SecretsCommand {
    /// Prompt for a secret value and store it in the keychain.
    Set {
        #[arg(value_parser = PossibleValuesParser::new(REQUIRED_SECRETS))]
        name: String,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
