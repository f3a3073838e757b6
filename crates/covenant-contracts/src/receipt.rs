//! Receipts and notices filed into inboxes and nymboxes.
//!
//! Receipts are created only as a side effect of contract finalization or
//! cron processing. Storage belongs to the mailbox implementation; this
//! module only defines the record and its signing bytes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    identity::{AccountId, Identifier, NotaryId},
    number::TransactionNumber,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReceiptKind {
    /// The contract has closed; the recipient may close out its numbers.
    FinalReceipt,
    /// The notary accepted the item referenced.
    NoticeSuccess,
    /// The notary rejected the item referenced.
    NoticeRejection,
}

impl ReceiptKind {
    pub fn notice(is_success: bool) -> Self {
        if is_success {
            ReceiptKind::NoticeSuccess
        } else {
            ReceiptKind::NoticeRejection
        }
    }
}

impl fmt::Display for ReceiptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReceiptKind::FinalReceipt => "final-receipt",
            ReceiptKind::NoticeSuccess => "notice-success",
            ReceiptKind::NoticeRejection => "notice-rejection",
        };
        f.write_str(s)
    }
}

/// Where a receipt is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MailboxTarget {
    /// An asset account's inbox.
    Inbox { account_id: AccountId },
    /// A Nym's (or role's) message box.
    Nymbox { identity: Identifier },
}

impl MailboxTarget {
    /// Key the mailbox store files this target under.
    pub fn key(&self) -> String {
        match self {
            MailboxTarget::Inbox { account_id } => format!("inbox/{}", account_id),
            MailboxTarget::Nymbox { identity } => format!("nymbox/{}", identity),
        }
    }
}

impl fmt::Display for MailboxTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt_id: Uuid,
    pub kind: ReceiptKind,
    pub notary_id: NotaryId,
    pub target: MailboxTarget,
    /// The new transaction number this receipt is filed under.
    pub transaction_number: TransactionNumber,
    /// The original contract or cron item this receipt refers to.
    pub in_reference_to: TransactionNumber,
    /// Text of the referenced item.
    pub reference: String,
    /// Closing number of the account the receipt closes out, inbox receipts only.
    pub closing_number: Option<TransactionNumber>,
    pub note: Option<String>,
    pub attachment: Option<String>,
    pub signer_id: Identifier,
    /// Hex-encoded signature over `signing_bytes()`. Empty until signed.
    pub signature: String,
    pub created_at: DateTime<Utc>,
}

impl Receipt {
    /// Bytes the acting signer signs: every field except the signature.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let unsigned = Receipt {
            signature: String::new(),
            ..self.clone()
        };
        // Plain data with string keys only; serialization cannot fail.
        serde_json::to_vec(&unsigned).unwrap_or_default()
    }
}
