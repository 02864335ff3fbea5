use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::credential::Credential;
use crate::identity::Identity;

/// The persisted session record: one JSON object at a single well-known
/// path. No other component reads or writes the file directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    #[serde(default)]
    pub credential: Option<Credential>,
    /// Last verified identity. Absent while a login is mid-flight; a
    /// record without an identity never satisfies an authenticated-route
    /// guard on its own.
    #[serde(default)]
    pub identity: Option<Identity>,
}

/// Single place of truth for the stored credential.
///
/// All reads are served from the in-memory record, so writes are visible
/// to every component immediately; the file is durability only. When the
/// path cannot be written the store silently degrades to memory-only for
/// the rest of the process lifetime.
pub struct CredentialStore {
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    path: Option<PathBuf>,
    record: StoredSession,
    degraded: bool,
}

impl CredentialStore {
    /// Open a store, loading any record previously persisted at `path`.
    /// Unreadable or unparseable records start the store empty; `open`
    /// never fails.
    pub fn open(path: Option<PathBuf>) -> Self {
        let record = match &path {
            Some(path) => match fs::read(path) {
                Ok(bytes) => match serde_json::from_slice(&bytes) {
                    Ok(record) => record,
                    Err(e) => {
                        debug!(error = %e, "stored session record unparseable, starting empty");
                        StoredSession::default()
                    }
                },
                Err(_) => StoredSession::default(),
            },
            None => StoredSession::default(),
        };

        Self {
            inner: Mutex::new(StoreInner {
                path,
                record,
                degraded: false,
            }),
        }
    }

    /// Replace the stored credential wholesale.
    pub fn save(&self, credential: Credential) {
        let mut inner = self.inner.lock();
        inner.record.credential = Some(credential);
        persist(&mut inner);
    }

    /// Replace the stored identity (pass `None` while a login is
    /// mid-flight).
    pub fn save_identity(&self, identity: Option<Identity>) {
        let mut inner = self.inner.lock();
        inner.record.identity = identity;
        persist(&mut inner);
    }

    /// The current credential, if any. Never fails.
    pub fn load(&self) -> Option<Credential> {
        self.inner.lock().record.credential.clone()
    }

    pub fn load_identity(&self) -> Option<Identity> {
        self.inner.lock().record.identity.clone()
    }

    /// Remove the stored record. Idempotent.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.record = StoredSession::default();
        if let Some(path) = &inner.path {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!(error = %e, "could not remove session record");
                }
            }
        }
    }

    /// True when a credential is stored and its expiry deadline has
    /// passed. A missing deadline is treated as valid; the backend is
    /// the final authority.
    pub fn is_expired(&self, now_epoch_ms: i64) -> bool {
        self.inner
            .lock()
            .record
            .credential
            .as_ref()
            .is_some_and(|c| c.is_expired(now_epoch_ms))
    }
}

fn persist(inner: &mut StoreInner) {
    if inner.degraded {
        return;
    }
    let Some(path) = inner.path.clone() else {
        return;
    };

    let result = (|| -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec(&inner.record).map_err(std::io::Error::other)?;
        // Write-then-rename so a crash never leaves a half-written record.
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    })();

    if let Err(e) = result {
        warn!(error = %e, path = %path.display(), "session storage unavailable, keeping session in memory");
        inner.degraded = true;
    }
}
