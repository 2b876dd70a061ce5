use std::{
    collections::HashMap,
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::SystemTime,
};

use afc_core::{
    knowledge::{DecryptError, KnowledgeDocument},
    secrets::KeyMaterial,
};
use tracing::debug;

use crate::blob;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    path: PathBuf,
    key_fingerprint: String,
}

/// File identity observed when an entry was decrypted. Every seal draws a
/// fresh nonce, so the leading nonce bytes change on a rewrite even when
/// length and mtime do not.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
    nonce: Vec<u8>,
}

struct CacheEntry {
    stamp: FileStamp,
    document: Arc<KnowledgeDocument>,
}

/// Memoizes decrypted documents by (canonical path, key fingerprint).
///
/// Every lookup re-stats the file and reads its nonce; a changed length,
/// mtime or nonce forces a fresh decryption. The lock is held across a miss, so concurrent callers never
/// decrypt the same entry twice. Failures are never cached.
#[derive(Default, Clone)]
pub struct DecryptCache {
    inner: Arc<Mutex<HashMap<CacheKey, CacheEntry>>>,
}

impl DecryptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_decrypt(
        &self,
        path: &Path,
        key: &KeyMaterial,
    ) -> Result<Arc<KnowledgeDocument>, DecryptError> {
        let stamp = stat(path)?;
        let cache_key = CacheKey {
            path: path.canonicalize().unwrap_or_else(|_| path.to_path_buf()),
            key_fingerprint: key.fingerprint(),
        };

        let mut entries = self.inner.lock().map_err(|err| DecryptError::Cache {
            reason: format!("lock poisoned: {err}"),
        })?;

        if let Some(entry) = entries.get(&cache_key) {
            if entry.stamp == stamp {
                debug!(path = %cache_key.path.display(), "knowledge cache hit");
                return Ok(Arc::clone(&entry.document));
            }
            debug!(path = %cache_key.path.display(), "knowledge file changed, re-decrypting");
        }

        let document = Arc::new(blob::decrypt(path, key)?);
        entries.insert(
            cache_key,
            CacheEntry {
                stamp,
                document: Arc::clone(&document),
            },
        );
        Ok(document)
    }

    /// Drop every cached document for `path`, whatever key produced it.
    pub fn invalidate(&self, path: &Path) {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if let Ok(mut entries) = self.inner.lock() {
            entries.retain(|key, _| key.path != canonical);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn stat(path: &Path) -> Result<FileStamp, DecryptError> {
    let io_err = |err: io::Error| {
        if err.kind() == io::ErrorKind::NotFound {
            DecryptError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            }
        } else {
            DecryptError::Io {
                reason: err.to_string(),
            }
        }
    };

    let file = fs::File::open(path).map_err(io_err)?;
    let metadata = file.metadata().map_err(io_err)?;
    let mut nonce = Vec::with_capacity(blob::NONCE_LEN);
    file.take(blob::NONCE_LEN as u64)
        .read_to_end(&mut nonce)
        .map_err(io_err)?;

    Ok(FileStamp {
        len: metadata.len(),
        modified: metadata.modified().ok(),
        nonce,
    })
}
