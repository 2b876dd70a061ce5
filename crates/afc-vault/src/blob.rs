use std::{fs, io::Write, path::Path};

use aes_gcm::{
    aead::{consts::U16, Aead, KeyInit},
    aes::{Aes128, Aes192, Aes256},
    AesGcm, Nonce,
};
use afc_core::{
    knowledge::{DecryptError, KnowledgeDocument},
    secrets::KeyMaterial,
};
use rand::{rngs::OsRng, RngCore};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, instrument};
use zeroize::Zeroizing;

/// Bytes of nonce at the start of every blob.
pub const NONCE_LEN: usize = 16;
/// GCM authentication tag appended by the cipher.
pub const TAG_LEN: usize = 16;
/// PKCS#7 block size (the AES block).
const BLOCK_LEN: usize = 16;

type Aes128Gcm16 = AesGcm<Aes128, U16>;
type Aes192Gcm16 = AesGcm<Aes192, U16>;
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// AES-GCM with a 16-byte nonce, sized by the key.
enum BlobCipher {
    Aes128(Aes128Gcm16),
    Aes192(Aes192Gcm16),
    Aes256(Aes256Gcm16),
}

impl BlobCipher {
    fn for_key(key: &KeyMaterial) -> Option<Self> {
        let bytes = key.as_bytes();
        match bytes.len() {
            16 => Aes128Gcm16::new_from_slice(bytes).ok().map(Self::Aes128),
            24 => Aes192Gcm16::new_from_slice(bytes).ok().map(Self::Aes192),
            32 => Aes256Gcm16::new_from_slice(bytes).ok().map(Self::Aes256),
            _ => None,
        }
    }

    fn encrypt(
        &self,
        nonce: &[u8; NONCE_LEN],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, aes_gcm::Error> {
        let nonce = Nonce::<U16>::from_slice(nonce);
        match self {
            Self::Aes128(cipher) => cipher.encrypt(nonce, plaintext),
            Self::Aes192(cipher) => cipher.encrypt(nonce, plaintext),
            Self::Aes256(cipher) => cipher.encrypt(nonce, plaintext),
        }
    }

    fn decrypt(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, aes_gcm::Error> {
        let nonce = Nonce::<U16>::from_slice(nonce);
        match self {
            Self::Aes128(cipher) => cipher.decrypt(nonce, ciphertext),
            Self::Aes192(cipher) => cipher.decrypt(nonce, ciphertext),
            Self::Aes256(cipher) => cipher.decrypt(nonce, ciphertext),
        }
    }
}

/// Errors from producing an encrypted knowledge file.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SealError {
    #[error("knowledge file is not valid UTF-8 text")]
    NotText,
    #[error("encryption failed")]
    Cipher,
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

/// Read and decrypt the knowledge file at `path`.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn decrypt(path: &Path, key: &KeyMaterial) -> Result<KnowledgeDocument, DecryptError> {
    let blob = read_blob(path)?;
    let document = open(&blob, key)?;
    debug!(bytes = document.len(), "decrypted knowledge file");
    Ok(document)
}

/// Decrypt an in-memory blob: nonce ‖ ciphertext ‖ tag, PKCS#7 padded text.
pub fn open(blob: &[u8], key: &KeyMaterial) -> Result<KnowledgeDocument, DecryptError> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(DecryptError::Authentication);
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);

    // KeyMaterial only admits AES key sizes, so this is unreachable in practice.
    let cipher = BlobCipher::for_key(key).ok_or(DecryptError::Authentication)?;
    let padded = Zeroizing::new(
        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| DecryptError::Authentication)?,
    );

    let text =
        std::str::from_utf8(unpad(&padded)?).map_err(|_| DecryptError::InvalidEncoding)?;
    Ok(KnowledgeDocument::new(text.to_owned()))
}

/// Encrypt `plaintext` into the blob format read by [`open`], with a fresh
/// random nonce.
pub fn seal(plaintext: &[u8], key: &KeyMaterial) -> Result<Vec<u8>, SealError> {
    let cipher = BlobCipher::for_key(key).ok_or(SealError::Cipher)?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let padded = pad(plaintext);
    let ciphertext = cipher
        .encrypt(&nonce, &padded)
        .map_err(|_| SealError::Cipher)?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Encrypt a plaintext knowledge file and write it atomically to `output`.
/// Returns the number of plaintext bytes sealed.
#[instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
pub fn seal_file(input: &Path, output: &Path, key: &KeyMaterial) -> Result<usize, SealError> {
    let plaintext = Zeroizing::new(fs::read(input).map_err(storage_err)?);
    if std::str::from_utf8(&plaintext).is_err() {
        return Err(SealError::NotText);
    }

    let blob = seal(&plaintext, key)?;
    write_blob(output, &blob)?;
    debug!(bytes = plaintext.len(), "sealed knowledge file");
    Ok(plaintext.len())
}

fn read_blob(path: &Path) -> Result<Vec<u8>, DecryptError> {
    fs::read(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            DecryptError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            }
        } else {
            DecryptError::Io {
                reason: err.to_string(),
            }
        }
    })
}

fn write_blob(path: &Path, blob: &[u8]) -> Result<(), SealError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(storage_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(storage_err)?;
    tmp.write_all(blob).map_err(storage_err)?;
    tmp.flush().map_err(storage_err)?;
    tmp.persist(path).map_err(|e| storage_err(e.error))?;
    Ok(())
}

fn pad(data: &[u8]) -> Zeroizing<Vec<u8>> {
    let fill = BLOCK_LEN - data.len() % BLOCK_LEN;
    let mut out = Zeroizing::new(Vec::with_capacity(data.len() + fill));
    out.extend_from_slice(data);
    out.resize(data.len() + fill, fill as u8);
    out
}

fn unpad(data: &[u8]) -> Result<&[u8], DecryptError> {
    if data.is_empty() || data.len() % BLOCK_LEN != 0 {
        return Err(DecryptError::InvalidPadding);
    }
    let fill = data[data.len() - 1] as usize;
    if fill == 0 || fill > BLOCK_LEN {
        return Err(DecryptError::InvalidPadding);
    }

    let (body, padding) = data.split_at(data.len() - fill);
    if padding.iter().any(|&b| b as usize != fill) {
        return Err(DecryptError::InvalidPadding);
    }
    Ok(body)
}

fn storage_err<E: ToString>(err: E) -> SealError {
    SealError::Storage {
        reason: err.to_string(),
    }
}
