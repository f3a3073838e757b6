//! Collaborator traits at the edge of the COVENANT core.
//!
//! The core never owns key material, number storage or mailboxes. It reaches
//! them through these traits:
//!
//! - `CredentialHolder` (a live Nym: signs, verifies, holds number sets)
//! - `NumberSet`        (one per-notary set of transaction numbers)
//! - `CredentialLoader` (loads a Nym that is not already in memory)
//! - `Mailbox`          (files receipts into inboxes or nymboxes)
//! - `GroupDirectory`   (enumerates the members of a voting group)
//! - `NumberIssuer`     (the notary's source of fresh receipt numbers)

use std::{collections::HashMap, sync::Arc};

use covenant_contracts::{
    error::CovenantResult,
    identity::{Identifier, NotaryId},
    number::TransactionNumber,
    receipt::Receipt,
};

/// Identities already loaded during this pass, keyed by identity string.
///
/// Passed down so that a Nym that is already in memory is never loaded a
/// second time.
pub type LoadedIdentities = HashMap<String, Arc<dyn CredentialHolder>>;

/// A set of transaction numbers, partitioned by notary.
///
/// Implementations must make each call atomic; `take_lowest` in particular
/// must not hand the same number to two callers.
pub trait NumberSet: Send + Sync {
    fn contains(&self, notary: &NotaryId, number: TransactionNumber) -> bool;

    /// Insert `number`. Returns false if it was already present.
    fn add(&self, notary: &NotaryId, number: TransactionNumber) -> bool;

    /// Remove `number`. Returns false if it was not present.
    fn remove(&self, notary: &NotaryId, number: TransactionNumber) -> bool;

    /// Remove and return the lowest number held for `notary`.
    fn take_lowest(&self, notary: &NotaryId) -> Option<TransactionNumber>;

    fn count(&self, notary: &NotaryId) -> usize;
}

/// A live identity with key material and transaction-number sets.
///
/// The core only ever borrows holders; their lifetime is owned by whoever
/// loaded them.
pub trait CredentialHolder: Send + Sync {
    fn id(&self) -> &Identifier;

    fn sign(&self, payload: &[u8]) -> CovenantResult<Vec<u8>>;

    fn verify(&self, payload: &[u8], signature: &[u8]) -> bool;

    /// Numbers issued to this Nym and still available for reservation.
    fn issued_numbers(&self) -> &dyn NumberSet;

    /// Numbers reserved by a contract and not yet consumed or harvested.
    fn in_use_numbers(&self) -> &dyn NumberSet;

    /// Durably save both number sets for `notary`, signed by `signer`.
    ///
    /// A failure here must be reported; the in-memory sets stay as they are.
    fn save_numbers(&self, notary: &NotaryId, signer: &dyn CredentialHolder) -> CovenantResult<()>;

    /// Head hash of this Nym's nymbox as last recorded for `notary`.
    fn nymbox_hash(&self, notary: &NotaryId) -> Option<String>;

    fn set_nymbox_hash(&self, notary: &NotaryId, hash: String);
}

/// Loads credential holders that are not already in a `LoadedIdentities` map.
pub trait CredentialLoader: Send + Sync {
    fn load(&self, identity: &Identifier) -> CovenantResult<Arc<dyn CredentialHolder>>;
}

/// Receipt storage for inboxes and nymboxes.
pub trait Mailbox: Send + Sync {
    /// Append `receipt` to the box named by `receipt.target` and return the
    /// box's new head hash.
    fn file(&self, receipt: &Receipt) -> CovenantResult<String>;
}

/// Membership of voting groups inside entities.
pub trait GroupDirectory: Send + Sync {
    /// Nyms that belong to `group_name` inside `entity_id`. Empty if the
    /// group is unknown.
    fn members(&self, entity_id: &Identifier, group_name: &str) -> Vec<Identifier>;
}

/// The notary's source of new transaction numbers for the receipts it files.
pub trait NumberIssuer: Send + Sync {
    fn issue_number(&self, notary: &NotaryId) -> TransactionNumber;
}
