//! # covenant-mailbox
//!
//! Append-only inbox and nymbox storage for the COVENANT runtime.
//!
//! Each box is a SHA-256 hash chain of the receipts filed into it. Altering
//! or reordering a filed receipt breaks the chain and `verify_chain` reports
//! it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use covenant_mailbox::InMemoryMailbox;
//! use covenant_core::traits::Mailbox;
//!
//! let nymboxes = InMemoryMailbox::new();
//! let head = nymboxes.file(&receipt)?;
//! assert!(nymboxes.verify_integrity());
//! ```

pub mod chain;
pub mod entry;
pub mod memory;

pub use chain::{hash_entry, verify_chain};
pub use entry::{MailboxEntry, MailboxExport};
pub use memory::InMemoryMailbox;

// ── Tests ─────────────────────────────────────────────────────────────────────
