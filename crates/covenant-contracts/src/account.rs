//! The account's own view of who may act on it.
//!
//! Agency over an account is confirmed against these records, never against
//! what the agent claims about itself.

use serde::{Deserialize, Serialize};

use crate::identity::{AccountId, Identifier};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub account_id: AccountId,
    /// Party that owns the account: a NymID or an EntityID.
    pub owner_id: Identifier,
    /// Signer identities (NymIDs or RoleIDs) the owner has authorized to act
    /// on this account besides himself.
    #[serde(default)]
    pub authorized_signers: Vec<Identifier>,
}

impl AccountRecord {
    pub fn new(account_id: AccountId, owner_id: Identifier) -> Self {
        Self {
            account_id,
            owner_id,
            authorized_signers: Vec::new(),
        }
    }

    pub fn authorize(&mut self, signer_id: Identifier) {
        if !self.authorized_signers.contains(&signer_id) {
            self.authorized_signers.push(signer_id);
        }
    }

    pub fn verify_owner(&self, party_id: &Identifier) -> bool {
        &self.owner_id == party_id
    }

    pub fn lists_signer(&self, signer_id: &Identifier) -> bool {
        self.authorized_signers.contains(signer_id)
    }
}
