//! The agent: the unit of authority inside a scripted contract.
//!
//! An `Agent` combines a fixed `Representation` with two pieces of
//! per-contract state:
//!
//! - the handle of the `Party` it acts for (set once, never cleared)
//! - a weak, per-pass reference to the live credential holder it signs with
//!
//! Identity queries are pure projections of the representation. Signing,
//! verification and every ledger operation go through the bound credential
//! and fail once it has been cleared.

use std::sync::{Arc, Weak};

use tracing::{debug, warn};

use covenant_contracts::{
    account::AccountRecord,
    contract::{ContractDocument, ContractSignature},
    error::{CovenantError, CovenantResult},
    identity::Identifier,
    representation::{AgentDescriptor, Representation},
};

use crate::{
    party::PartyHandle,
    pass::TemporaryReferences,
    traits::{CredentialHolder, CredentialLoader, LoadedIdentities},
};

#[derive(Debug)]
pub struct Agent {
    name: String,
    representation: Representation,
    pub(crate) party: Option<PartyHandle>,
    credential: Option<Weak<dyn CredentialHolder>>,
}

impl Agent {
    pub fn new(name: impl Into<String>, representation: Representation) -> Self {
        Self {
            name: name.into(),
            representation,
            party: None,
            credential: None,
        }
    }

    /// A Nym acting for himself, already bound to his credential holder.
    pub fn for_nym(name: impl Into<String>, holder: &Arc<dyn CredentialHolder>) -> Self {
        let mut agent = Self::new(
            name,
            Representation::SelfIndividual {
                nym_id: holder.id().clone(),
            },
        );
        agent.set_credential_holder(holder);
        agent
    }

    pub fn from_descriptor(descriptor: AgentDescriptor) -> CovenantResult<Self> {
        let (name, representation) = descriptor.into_parts()?;
        Ok(Self::new(name, representation))
    }

    /// The serializable descriptor for this agent.
    pub fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor::new(self.name.clone(), &self.representation)
    }

    /// The agent's name as used inside the contract script.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn representation(&self) -> &Representation {
        &self.representation
    }

    // ── Identity resolver ────────────────────────────────────────────────────

    pub fn is_individual(&self) -> bool {
        self.representation.is_individual()
    }

    pub fn is_group(&self) -> bool {
        self.representation.is_group()
    }

    pub fn does_represent_himself(&self) -> bool {
        self.representation.does_represent_himself()
    }

    pub fn does_represent_entity(&self) -> bool {
        self.representation.does_represent_entity()
    }

    pub fn nym_id(&self) -> Option<&Identifier> {
        self.representation.nym_id()
    }

    pub fn role_id(&self) -> Option<&Identifier> {
        self.representation.role_id()
    }

    pub fn group_name(&self) -> Option<&str> {
        self.representation.group_name()
    }

    pub fn entity_id(&self) -> Option<&Identifier> {
        self.representation.entity_id()
    }

    /// None for a voting group, which acts through elections instead.
    pub fn signer_id(&self) -> Option<&Identifier> {
        self.representation.signer_id()
    }

    pub fn party_id(&self) -> &Identifier {
        self.representation.party_id()
    }

    pub(crate) fn not_applicable(&self, operation: &str) -> CovenantError {
        CovenantError::NotApplicable {
            operation: operation.to_string(),
            kind: self.representation.kind().to_string(),
            agent: self.name.clone(),
        }
    }

    // ── Signer bridge ────────────────────────────────────────────────────────

    /// Bind a credential holder for the current pass. Last write wins; the
    /// identity is checked when the binding is used, not here.
    pub fn set_credential_holder(&mut self, holder: &Arc<dyn CredentialHolder>) {
        debug!(agent = %self.name, credential = %holder.id(), "credential holder bound");
        self.credential = Some(Arc::downgrade(holder));
    }

    /// Drop the per-pass credential reference. Safe to call repeatedly.
    pub fn clear_temporary_reference(&mut self) {
        if self.credential.take().is_some() {
            debug!(agent = %self.name, "credential holder released");
        }
    }

    /// True while a credential is bound and still alive.
    pub fn has_credential(&self) -> bool {
        self.credential
            .as_ref()
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// The bound holder, whatever its identity.
    pub(crate) fn bound_credential(&self) -> CovenantResult<Arc<dyn CredentialHolder>> {
        self.credential
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| CovenantError::NoCredentialBound {
                agent: self.name.clone(),
            })
    }

    /// The bound holder, checked against this agent's own NymID.
    ///
    /// Groups never have one: they hold no numbers and sign nothing directly.
    pub(crate) fn own_credential(&self, operation: &str) -> CovenantResult<Arc<dyn CredentialHolder>> {
        let nym_id = self.nym_id().ok_or_else(|| self.not_applicable(operation))?;
        let holder = self.bound_credential()?;
        if holder.id() != nym_id {
            warn!(
                agent = %self.name,
                expected = %nym_id,
                actual = %holder.id(),
                operation = operation,
                "bound credential does not match agent identity"
            );
            return Err(CovenantError::IdentityMismatch {
                agent: self.name.clone(),
                expected: nym_id.to_string(),
                actual: holder.id().to_string(),
            });
        }
        Ok(holder)
    }

    pub fn is_valid_signer(&self, holder: &dyn CredentialHolder) -> bool {
        self.is_valid_signer_id(holder.id())
    }

    /// Whether `id` is the Nym that signs for this agent.
    pub fn is_valid_signer_id(&self, id: &Identifier) -> bool {
        self.nym_id().is_some_and(|nym_id| nym_id == id)
    }

    /// Sign `contract` with the bound credential.
    pub fn sign(&self, contract: &mut ContractDocument) -> CovenantResult<()> {
        let holder = self.own_credential("sign")?;
        let signature = holder.sign(&contract.signing_bytes())?;
        contract.add_signature(ContractSignature {
            signer_id: holder.id().clone(),
            signature: hex::encode(signature),
        });
        debug!(agent = %self.name, contract_id = %contract.contract_id, "contract signed");
        Ok(())
    }

    /// Verify this agent's own signature on `contract`.
    pub fn verify_signature(&self, contract: &ContractDocument) -> CovenantResult<()> {
        let holder = self.own_credential("verify signature")?;
        let entry = contract.signature_by(holder.id()).ok_or_else(|| {
            CovenantError::SignatureInvalid {
                reason: format!(
                    "contract '{}' carries no signature from '{}'",
                    contract.contract_id,
                    holder.id()
                ),
            }
        })?;
        let signature = hex::decode(&entry.signature).map_err(|e| CovenantError::SignatureInvalid {
            reason: format!("signature from '{}' is not valid hex: {}", holder.id(), e),
        })?;
        if !holder.verify(&contract.signing_bytes(), &signature) {
            warn!(agent = %self.name, contract_id = %contract.contract_id, "signature did not verify");
            return Err(CovenantError::SignatureInvalid {
                reason: format!(
                    "signature from '{}' does not match contract '{}'",
                    holder.id(),
                    contract.contract_id
                ),
            });
        }
        Ok(())
    }

    /// Confirm, from the account's own records, that this agent may act on it.
    ///
    /// The account must be owned by the agent's party. A self-representing
    /// Nym owns it outright; a role must be listed among the account's
    /// authorized signers. A voting group never has direct agency.
    pub fn verify_agency_over_account(&self, account: &AccountRecord) -> bool {
        if !account.verify_owner(self.party_id()) {
            debug!(
                agent = %self.name,
                account_id = %account.account_id,
                "account is not owned by the agent's party"
            );
            return false;
        }
        match &self.representation {
            Representation::SelfIndividual { .. } => true,
            Representation::EntityRoleIndividual { role_id, .. } => account.lists_signer(role_id),
            Representation::EntityVotingGroup { .. } => false,
        }
    }

    // ── Loading ──────────────────────────────────────────────────────────────

    /// Add this agent's bound credential to `loaded`, so later lookups in the
    /// same pass find it instead of loading it again.
    pub fn retrieve_credential(&self, loaded: &mut LoadedIdentities) {
        if let Ok(holder) = self.own_credential("retrieve credential") {
            loaded
                .entry(holder.id().to_string())
                .or_insert(holder);
        }
    }

    /// Find this agent's Nym in `loaded`, or load it through `loader`, and
    /// bind it. The caller owns the returned holder for the rest of the pass.
    pub fn load_credential(
        &mut self,
        loaded: Option<&LoadedIdentities>,
        loader: &dyn CredentialLoader,
    ) -> CovenantResult<Arc<dyn CredentialHolder>> {
        let nym_id = self
            .nym_id()
            .cloned()
            .ok_or_else(|| self.not_applicable("load credential"))?;

        let holder = match loaded.and_then(|map| map.get(nym_id.as_str())) {
            Some(holder) => Arc::clone(holder),
            None => loader.load(&nym_id)?,
        };
        self.set_credential_holder(&holder);
        Ok(holder)
    }
}

impl TemporaryReferences for Agent {
    fn clear_temporary_references(&mut self) {
        self.clear_temporary_reference();
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
