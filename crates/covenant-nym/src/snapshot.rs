//! Signed number-set snapshots.
//!
//! A snapshot is what `save_numbers` makes durable: both number sets for one
//! notary, the nymbox hash, and a signature by whoever performed the save.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use covenant_contracts::{
    error::{CovenantError, CovenantResult},
    identity::{Identifier, NotaryId},
};
use covenant_core::traits::CredentialHolder;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberSnapshot {
    pub nym_id: Identifier,
    pub notary_id: NotaryId,
    pub issued: Vec<i64>,
    pub in_use: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nymbox_hash: Option<String>,
    pub saved_at: DateTime<Utc>,
    pub signer_id: Identifier,
    /// Hex signature over `signing_bytes()`.
    #[serde(default)]
    pub signature: String,
}

impl NumberSnapshot {
    pub fn signing_bytes(&self) -> Vec<u8> {
        let unsigned = NumberSnapshot {
            signature: String::new(),
            ..self.clone()
        };
        serde_json::to_vec(&unsigned).unwrap_or_default()
    }

    pub(crate) fn sign(mut self, signer: &dyn CredentialHolder) -> CovenantResult<Self> {
        self.signer_id = signer.id().clone();
        self.signature = hex::encode(signer.sign(&self.signing_bytes())?);
        Ok(self)
    }

    /// Check the signature against `signer`, which must be the recorded signer.
    pub fn verify(&self, signer: &dyn CredentialHolder) -> CovenantResult<()> {
        if &self.signer_id != signer.id() {
            return Err(CovenantError::SignatureInvalid {
                reason: format!(
                    "snapshot signed by '{}', not '{}'",
                    self.signer_id,
                    signer.id()
                ),
            });
        }
        let signature = hex::decode(&self.signature).map_err(|e| CovenantError::SignatureInvalid {
            reason: format!("snapshot signature is not hex: {}", e),
        })?;
        if signer.verify(&self.signing_bytes(), &signature) {
            Ok(())
        } else {
            Err(CovenantError::SignatureInvalid {
                reason: format!("snapshot for '{}' on '{}' does not match its signature", self.nym_id, self.notary_id),
            })
        }
    }
}
