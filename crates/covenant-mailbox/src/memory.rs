//! In-memory implementation of `Mailbox`.
//!
//! Every box key (`inbox/<account>` or `nymbox/<identity>`) gets its own
//! hash-chained log. The head hash returned from `file` is what recipients
//! record as their nymbox hash.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::Utc;
use tracing::debug;

use covenant_contracts::{
    error::{CovenantError, CovenantResult},
    receipt::{MailboxTarget, Receipt},
};
use covenant_core::traits::Mailbox;

use crate::{
    chain::{hash_entry, verify_chain},
    entry::{MailboxEntry, MailboxExport},
};

// ── Internal mutable state ────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct BoxLog {
    pub(crate) entries: Vec<MailboxEntry>,
}

impl BoxLog {
    fn head_hash(&self) -> String {
        self.entries
            .last()
            .map(|e| e.this_hash.clone())
            .unwrap_or_else(|| MailboxEntry::GENESIS_HASH.to_string())
    }
}

// ── Public mailbox ────────────────────────────────────────────────────────────

/// Append-only receipt storage, one chain per box.
///
/// Cloning shares the underlying boxes, so a notary can hand the same
/// storage to its dispatcher and to the code that serves clients.
#[derive(Clone, Default)]
pub struct InMemoryMailbox {
    pub(crate) state: Arc<Mutex<BTreeMap<String, BoxLog>>>,
}

impl InMemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn boxes(&self) -> MutexGuard<'_, BTreeMap<String, BoxLog>> {
        // A poisoned lock still holds a consistent log: entries are pushed
        // only after their hash is computed.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Receipts filed into `target`, oldest first.
    pub fn receipts(&self, target: &MailboxTarget) -> Vec<Receipt> {
        self.boxes()
            .get(&target.key())
            .map(|b| b.entries.iter().map(|e| e.receipt.clone()).collect())
            .unwrap_or_default()
    }

    /// Current head hash of `target`. The genesis hash for an empty box.
    pub fn head_hash(&self, target: &MailboxTarget) -> String {
        self.boxes()
            .get(&target.key())
            .map(BoxLog::head_hash)
            .unwrap_or_else(|| MailboxEntry::GENESIS_HASH.to_string())
    }

    pub fn box_keys(&self) -> Vec<String> {
        self.boxes().keys().cloned().collect()
    }

    pub fn export_box(&self, target: &MailboxTarget) -> MailboxExport {
        let box_key = target.key();
        let boxes = self.boxes();
        let (entries, head_hash) = match boxes.get(&box_key) {
            Some(log) => (log.entries.clone(), log.head_hash()),
            None => (Vec::new(), MailboxEntry::GENESIS_HASH.to_string()),
        };
        MailboxExport {
            box_key,
            entries,
            exported_at: Utc::now(),
            head_hash,
        }
    }

    /// Verify every box's chain.
    pub fn verify_integrity(&self) -> bool {
        self.boxes().values().all(|log| verify_chain(&log.entries))
    }
}

impl Mailbox for InMemoryMailbox {
    fn file(&self, receipt: &Receipt) -> CovenantResult<String> {
        let box_key = receipt.target.key();
        if receipt.signature.is_empty() {
            return Err(CovenantError::DeliveryFailed {
                target: box_key,
                reason: "receipt is unsigned".to_string(),
            });
        }

        let mut boxes = self.boxes();
        let log = boxes.entry(box_key.clone()).or_default();
        let prev_hash = log.head_hash();
        let sequence = log.entries.len() as u64;
        let this_hash = hash_entry(&box_key, sequence, receipt, &prev_hash);

        log.entries.push(MailboxEntry {
            sequence,
            box_key: box_key.clone(),
            receipt: receipt.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });

        debug!(
            box_key = %box_key,
            sequence = sequence,
            kind = %receipt.kind,
            head = %this_hash,
            "receipt appended"
        );
        Ok(this_hash)
    }
}
