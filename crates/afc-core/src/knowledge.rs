use std::fmt;

use thiserror::Error;
use zeroize::Zeroizing;

/// Plaintext knowledge text, the only grounding context for answers.
/// Lives in memory only and is wiped when the last reference drops.
#[derive(Clone, PartialEq, Eq)]
pub struct KnowledgeDocument {
    text: Zeroizing<String>,
}

impl KnowledgeDocument {
    pub fn new(text: String) -> Self {
        Self {
            text: Zeroizing::new(text),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Debug for KnowledgeDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnowledgeDocument")
            .field("len", &self.text.len())
            .finish_non_exhaustive()
    }
}

/// Failures while turning the encrypted file into text. None of these ever
/// fall back to unencrypted or default content.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecryptError {
    #[error("file not found: {path}")]
    FileNotFound { path: String },
    #[error("failed to read encrypted file: {reason}")]
    Io { reason: String },
    /// Tag mismatch: wrong key, corrupted file, or tampering.
    #[error("authentication/decryption failure")]
    Authentication,
    #[error("invalid padding")]
    InvalidPadding,
    #[error("invalid encoding")]
    InvalidEncoding,
    #[error("decryption cache failure: {reason}")]
    Cache { reason: String },
}

/// Outcome of unlocking the knowledge document with a candidate password.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("incorrect password")]
    WrongPassword,
    #[error(transparent)]
    Decrypt(#[from] DecryptError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_document_text() {
        let doc = KnowledgeDocument::new("Fault X: reset the reader.".into());
        let rendered = format!("{doc:?}");
        assert!(!rendered.contains("reset the reader"));
        assert!(rendered.contains("26"));
        assert_eq!(doc.as_str(), "Fault X: reset the reader.");
    }

    #[test]
    fn gate_error_passes_decrypt_message_through() {
        let err = GateError::from(DecryptError::Authentication);
        assert_eq!(err.to_string(), "authentication/decryption failure");
        assert_eq!(GateError::WrongPassword.to_string(), "incorrect password");
    }
}
