//! Hash-chain primitives for mailbox logs.
//!
//! Hash input layout (bytes, in order):
//!   1. box key as UTF-8 bytes
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. compact JSON of the receipt, signature included

use sha2::{Digest, Sha256};

use covenant_contracts::receipt::Receipt;

use crate::entry::MailboxEntry;

/// SHA-256 over one entry's position, link and receipt. Lowercase hex.
pub fn hash_entry(box_key: &str, sequence: u64, receipt: &Receipt, prev_hash: &str) -> String {
    // Receipts are plain data with string keys; serialization cannot fail.
    let receipt_json = serde_json::to_vec(receipt).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(box_key.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&receipt_json);

    hex::encode(hasher.finalize())
}

/// Check linkage and recomputed hashes for one box's entries, in order.
/// An empty log is valid.
pub fn verify_chain(entries: &[MailboxEntry]) -> bool {
    let mut expected_prev = MailboxEntry::GENESIS_HASH.to_string();

    for (idx, entry) in entries.iter().enumerate() {
        if entry.sequence != idx as u64 || entry.prev_hash != expected_prev {
            return false;
        }
        let recomputed = hash_entry(&entry.box_key, entry.sequence, &entry.receipt, &entry.prev_hash);
        if entry.this_hash != recomputed {
            return false;
        }
        expected_prev = entry.this_hash.clone();
    }

    true
}
