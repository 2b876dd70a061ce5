//! Terminal input: the access password and questions.

use std::io::{self, BufRead, IsTerminal};

use color_eyre::{eyre::eyre, Result};
use dialoguer::{Input, Password};
use zeroize::Zeroizing;

const EXIT_WORDS: [&str; 2] = ["exit", "quit"];

/// Prompt for the access password, or take one line from stdin.
pub fn read_password(from_stdin: bool) -> Result<Zeroizing<String>> {
    if from_stdin {
        return read_password_line(io::stdin().lock());
    }
    if !io::stdin().is_terminal() {
        return Err(eyre!(
            "No password provided and no TTY available. Use --password-stdin."
        ));
    }
    let password = Password::new()
        .with_prompt("Password")
        .allow_empty_password(true)
        .interact()
        .map_err(|e| eyre!("Failed to read password: {e}"))?;
    Ok(Zeroizing::new(password))
}

/// First line of `reader` without its line ending. Other whitespace is kept.
pub fn read_password_line(mut reader: impl BufRead) -> Result<Zeroizing<String>> {
    let mut line = Zeroizing::new(String::new());
    reader
        .read_line(&mut line)
        .map_err(|e| eyre!("Failed to read password from stdin: {e}"))?;
    let end = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(end);
    Ok(line)
}

/// Prompt for a secret value twice, for `secrets set`.
pub fn read_secret_value(name: &str) -> Result<Zeroizing<String>> {
    if !io::stdin().is_terminal() {
        return Err(eyre!("Setting {name} requires a TTY"));
    }
    let value = Password::new()
        .with_prompt(format!("Value for {name}"))
        .with_confirmation("Confirm value", "Values do not match")
        .interact()
        .map_err(|e| eyre!("Failed to read {name}: {e}"))?;
    Ok(Zeroizing::new(value))
}

/// Prompt for one question, or read the next stdin line when piped.
/// `None` ends the session.
pub fn read_question() -> Result<Option<String>> {
    if !io::stdin().is_terminal() {
        return read_question_line(io::stdin().lock());
    }
    let raw: String = Input::new()
        .with_prompt("Question")
        .allow_empty(true)
        .interact_text()
        .map_err(|e| eyre!("Failed to read question: {e}"))?;
    Ok(normalize_question(&raw))
}

/// Next question from `reader`; end of input ends the session.
pub fn read_question_line(mut reader: impl BufRead) -> Result<Option<String>> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| eyre!("Failed to read question: {e}"))?;
    if read == 0 {
        return Ok(None);
    }
    Ok(normalize_question(&line))
}

/// Trimmed question text; blank input and the exit words yield `None`.
pub fn normalize_question(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || EXIT_WORDS.iter().any(|w| trimmed.eq_ignore_ascii_case(w)) {
        return None;
    }
    Some(trimmed.to_string())
}
