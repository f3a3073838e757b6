//! The signable contract document agents act upon.
//!
//! The script language and clause structure of a smart contract are outside
//! this runtime. All the agent layer needs is a stable byte representation to
//! sign, and a place to keep the resulting signatures.

use serde::{Deserialize, Serialize};

use crate::{
    identity::{Identifier, NotaryId},
    number::TransactionNumber,
};

/// One signature over a `ContractDocument`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSignature {
    pub signer_id: Identifier,
    /// Hex-encoded signature bytes.
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractDocument {
    /// Stable identifier for the contract (e.g. "escrow-2041").
    pub contract_id: String,
    pub notary_id: NotaryId,
    /// The contract's own opening number, used as the in-reference-to number
    /// on every final receipt the contract produces.
    pub transaction_number: TransactionNumber,
    /// Opaque contract body. The runtime never inspects this.
    pub body: serde_json::Value,
    #[serde(default)]
    pub signatures: Vec<ContractSignature>,
}

impl ContractDocument {
    pub fn new(
        contract_id: impl Into<String>,
        notary_id: NotaryId,
        transaction_number: TransactionNumber,
        body: serde_json::Value,
    ) -> Self {
        Self {
            contract_id: contract_id.into(),
            notary_id,
            transaction_number,
            body,
            signatures: Vec::new(),
        }
    }

    /// Bytes covered by a signature. Signatures themselves are excluded so
    /// several parties can sign the same document.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(self.contract_id.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(self.notary_id.as_str().as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(&self.transaction_number.value().to_le_bytes());
        bytes.extend_from_slice(self.body.to_string().as_bytes());
        bytes
    }

    pub fn signature_by(&self, signer_id: &Identifier) -> Option<&ContractSignature> {
        self.signatures.iter().find(|s| &s.signer_id == signer_id)
    }

    /// Record a signature, replacing any earlier one from the same signer.
    pub fn add_signature(&mut self, signature: ContractSignature) {
        self.signatures.retain(|s| s.signer_id != signature.signer_id);
        self.signatures.push(signature);
    }
}
