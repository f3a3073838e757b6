//! Mailbox entry and export types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use covenant_contracts::receipt::Receipt;

/// One filed receipt, linked to the entry before it in the same box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxEntry {
    /// Position in the box, starting at 0.
    pub sequence: u64,
    /// `MailboxTarget::key()` of the box this entry belongs to.
    pub box_key: String,
    pub receipt: Receipt,
    /// `this_hash` of the previous entry, or `GENESIS_HASH` for the first.
    pub prev_hash: String,
    pub this_hash: String,
}

impl MailboxEntry {
    /// `prev_hash` of the first entry in every box.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// Snapshot of one box, as handed to a client syncing its inbox or nymbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxExport {
    pub box_key: String,
    pub entries: Vec<MailboxEntry>,
    pub exported_at: DateTime<Utc>,
    /// `this_hash` of the last entry; the genesis hash for an empty box.
    pub head_hash: String,
}
