//! `LocalNym`: a credential holder whose keys and numbers live in-process.
//!
//! Signatures are SHA-256 over a per-Nym secret followed by the payload.
//! That is enough for the holder itself to verify what it signed; it is not
//! public-key cryptography.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use covenant_contracts::{
    error::{CovenantError, CovenantResult},
    identity::{Identifier, NotaryId},
    number::TransactionNumber,
};
use covenant_core::traits::{CredentialHolder, NumberSet};

use crate::{numbers::NumberStore, snapshot::NumberSnapshot};

pub struct LocalNym {
    id: Identifier,
    secret: Vec<u8>,
    issued: NumberStore,
    in_use: NumberStore,
    storage_dir: Option<PathBuf>,
    saved: Mutex<HashMap<NotaryId, NumberSnapshot>>,
    nymbox_hashes: Mutex<HashMap<NotaryId, String>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl LocalNym {
    pub fn new(id: impl Into<String>, secret: impl AsRef<[u8]>) -> Self {
        Self {
            id: Identifier::new(id),
            secret: secret.as_ref().to_vec(),
            issued: NumberStore::default(),
            in_use: NumberStore::default(),
            storage_dir: None,
            saved: Mutex::new(HashMap::new()),
            nymbox_hashes: Mutex::new(HashMap::new()),
        }
    }

    /// Save snapshots under `dir/<hex nym id>/<hex notary id>.json` instead
    /// of memory.
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    /// Add freshly issued numbers for `notary`, as the notary does when it
    /// grants a batch to this Nym.
    pub fn grant_numbers(&self, notary: &NotaryId, numbers: impl IntoIterator<Item = i64>) -> usize {
        let granted = numbers
            .into_iter()
            .filter(|n| self.issued.add(notary, TransactionNumber(*n)))
            .count();
        debug!(nym = %self.id, notary = %notary, granted = granted, "numbers granted");
        granted
    }

    pub fn issued_snapshot(&self, notary: &NotaryId) -> Vec<i64> {
        self.issued.snapshot(notary)
    }

    pub fn in_use_snapshot(&self, notary: &NotaryId) -> Vec<i64> {
        self.in_use.snapshot(notary)
    }

    /// The last snapshot saved for `notary`, from disk when a storage
    /// directory is configured.
    pub fn saved_snapshot(&self, notary: &NotaryId) -> CovenantResult<Option<NumberSnapshot>> {
        match &self.storage_dir {
            Some(dir) => {
                let path = self.snapshot_path(dir, notary);
                if !path.exists() {
                    return Ok(None);
                }
                let raw = fs::read_to_string(&path).map_err(|e| persist_error(notary, &path, e))?;
                serde_json::from_str(&raw)
                    .map(Some)
                    .map_err(|e| persist_error(notary, &path, e))
            }
            None => Ok(locked(&self.saved).get(notary).cloned()),
        }
    }

    /// Replace the in-memory sets for `notary` with the last saved snapshot,
    /// after checking it was signed by `signer`. Returns false when nothing
    /// has been saved yet.
    pub fn restore_numbers(&self, notary: &NotaryId, signer: &dyn CredentialHolder) -> CovenantResult<bool> {
        let Some(snapshot) = self.saved_snapshot(notary)? else {
            return Ok(false);
        };
        snapshot.verify(signer)?;
        if snapshot.nym_id != self.id {
            return Err(CovenantError::IdentityMismatch {
                agent: self.id.to_string(),
                expected: self.id.to_string(),
                actual: snapshot.nym_id.to_string(),
            });
        }
        self.issued.replace(notary, snapshot.issued.iter().copied());
        self.in_use.replace(notary, snapshot.in_use.iter().copied());
        if let Some(hash) = snapshot.nymbox_hash {
            locked(&self.nymbox_hashes).insert(notary.clone(), hash);
        }
        info!(nym = %self.id, notary = %notary, "numbers restored from snapshot");
        Ok(true)
    }

    /// Where snapshots for `notary` are written, when a storage directory
    /// is configured.
    pub fn snapshot_file(&self, notary: &NotaryId) -> Option<PathBuf> {
        self.storage_dir.as_deref().map(|dir| self.snapshot_path(dir, notary))
    }

    /// Both ids are hex-encoded so no id can name a path outside `dir`.
    fn snapshot_path(&self, dir: &Path, notary: &NotaryId) -> PathBuf {
        dir.join(hex::encode(self.id.as_str()))
            .join(format!("{}.json", hex::encode(notary.as_str())))
    }

    fn digest(&self, payload: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        hasher.update(payload);
        hasher.finalize().to_vec()
    }
}

fn persist_error(notary: &NotaryId, path: &Path, e: impl std::fmt::Display) -> CovenantError {
    CovenantError::PersistFailed {
        notary: notary.to_string(),
        reason: format!("{}: {}", path.display(), e),
    }
}

impl CredentialHolder for LocalNym {
    fn id(&self) -> &Identifier {
        &self.id
    }

    fn sign(&self, payload: &[u8]) -> CovenantResult<Vec<u8>> {
        if self.secret.is_empty() {
            return Err(CovenantError::SigningFailed {
                reason: format!("nym '{}' has no private key loaded", self.id),
            });
        }
        Ok(self.digest(payload))
    }

    fn verify(&self, payload: &[u8], signature: &[u8]) -> bool {
        !self.secret.is_empty() && self.digest(payload) == signature
    }

    fn issued_numbers(&self) -> &dyn NumberSet {
        &self.issued
    }

    fn in_use_numbers(&self) -> &dyn NumberSet {
        &self.in_use
    }

    fn save_numbers(&self, notary: &NotaryId, signer: &dyn CredentialHolder) -> CovenantResult<()> {
        let snapshot = NumberSnapshot {
            nym_id: self.id.clone(),
            notary_id: notary.clone(),
            issued: self.issued.snapshot(notary),
            in_use: self.in_use.snapshot(notary),
            nymbox_hash: self.nymbox_hash(notary),
            saved_at: Utc::now(),
            signer_id: signer.id().clone(),
            signature: String::new(),
        }
        .sign(signer)?;

        match &self.storage_dir {
            Some(dir) => {
                let path = self.snapshot_path(dir, notary);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(|e| persist_error(notary, parent, e))?;
                }
                let json = serde_json::to_vec_pretty(&snapshot).map_err(|e| persist_error(notary, &path, e))?;
                fs::write(&path, json)
                    .inspect_err(|e| warn!(nym = %self.id, path = %path.display(), error = %e, "snapshot write failed"))
                    .map_err(|e| persist_error(notary, &path, e))?;
                debug!(nym = %self.id, notary = %notary, path = %path.display(), "numbers saved");
            }
            None => {
                locked(&self.saved).insert(notary.clone(), snapshot);
                debug!(nym = %self.id, notary = %notary, "numbers saved in memory");
            }
        }
        Ok(())
    }

    fn nymbox_hash(&self, notary: &NotaryId) -> Option<String> {
        locked(&self.nymbox_hashes).get(notary).cloned()
    }

    fn set_nymbox_hash(&self, notary: &NotaryId, hash: String) {
        locked(&self.nymbox_hashes).insert(notary.clone(), hash);
    }
}
