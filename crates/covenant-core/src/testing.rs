//! In-memory collaborators for unit tests.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use covenant_contracts::{
    error::{CovenantError, CovenantResult},
    identity::{Identifier, NotaryId},
    number::TransactionNumber,
    receipt::Receipt,
    representation::Representation,
};

use crate::{
    agent::Agent,
    traits::{CredentialHolder, CredentialLoader, GroupDirectory, Mailbox, NumberSet},
};

#[derive(Default)]
pub struct MockNumbers {
    sets: Mutex<HashMap<NotaryId, BTreeSet<i64>>>,
}

impl NumberSet for MockNumbers {
    fn contains(&self, notary: &NotaryId, number: TransactionNumber) -> bool {
        let sets = self.sets.lock().unwrap();
        sets.get(notary).is_some_and(|s| s.contains(&number.value()))
    }

    fn add(&self, notary: &NotaryId, number: TransactionNumber) -> bool {
        let mut sets = self.sets.lock().unwrap();
        sets.entry(notary.clone()).or_default().insert(number.value())
    }

    fn remove(&self, notary: &NotaryId, number: TransactionNumber) -> bool {
        let mut sets = self.sets.lock().unwrap();
        sets.get_mut(notary).is_some_and(|s| s.remove(&number.value()))
    }

    fn take_lowest(&self, notary: &NotaryId) -> Option<TransactionNumber> {
        let mut sets = self.sets.lock().unwrap();
        sets.get_mut(notary)?.pop_first().map(TransactionNumber)
    }

    fn count(&self, notary: &NotaryId) -> usize {
        let sets = self.sets.lock().unwrap();
        sets.get(notary).map_or(0, BTreeSet::len)
    }
}

impl MockNumbers {
    fn snapshot(&self, notary: &NotaryId) -> Vec<i64> {
        let sets = self.sets.lock().unwrap();
        sets.get(notary).map(|s| s.iter().copied().collect()).unwrap_or_default()
    }
}

/// A Nym whose "signature" is its id followed by the payload.
pub struct MockNym {
    id: Identifier,
    issued: MockNumbers,
    in_use: MockNumbers,
    fail_saves: AtomicBool,
    save_signers: Mutex<Vec<String>>,
    nymbox_hashes: Mutex<HashMap<NotaryId, String>>,
}

impl MockNym {
    pub fn new(id: &str) -> Self {
        Self {
            id: Identifier::new(id),
            issued: MockNumbers::default(),
            in_use: MockNumbers::default(),
            fail_saves: AtomicBool::new(false),
            save_signers: Mutex::new(Vec::new()),
            nymbox_hashes: Mutex::new(HashMap::new()),
        }
    }

    pub fn issue(&self, notary: &NotaryId, number: i64) {
        self.issued.add(notary, TransactionNumber(number));
    }

    pub fn issued_snapshot(&self, notary: &NotaryId) -> Vec<i64> {
        self.issued.snapshot(notary)
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Ids of the signers of every successful save, in order.
    pub fn save_signers(&self) -> Vec<String> {
        self.save_signers.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.save_signers.lock().unwrap().len()
    }

    fn signature_for(&self, payload: &[u8]) -> Vec<u8> {
        let mut sig = self.id.as_str().as_bytes().to_vec();
        sig.push(b':');
        sig.extend_from_slice(payload);
        sig
    }
}

impl CredentialHolder for MockNym {
    fn id(&self) -> &Identifier {
        &self.id
    }

    fn sign(&self, payload: &[u8]) -> CovenantResult<Vec<u8>> {
        Ok(self.signature_for(payload))
    }

    fn verify(&self, payload: &[u8], signature: &[u8]) -> bool {
        self.signature_for(payload) == signature
    }

    fn issued_numbers(&self) -> &dyn NumberSet {
        &self.issued
    }

    fn in_use_numbers(&self) -> &dyn NumberSet {
        &self.in_use
    }

    fn save_numbers(&self, notary: &NotaryId, signer: &dyn CredentialHolder) -> CovenantResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CovenantError::PersistFailed {
                notary: notary.to_string(),
                reason: "storage offline".to_string(),
            });
        }
        self.save_signers.lock().unwrap().push(signer.id().to_string());
        Ok(())
    }

    fn nymbox_hash(&self, notary: &NotaryId) -> Option<String> {
        self.nymbox_hashes.lock().unwrap().get(notary).cloned()
    }

    fn set_nymbox_hash(&self, notary: &NotaryId, hash: String) {
        self.nymbox_hashes.lock().unwrap().insert(notary.clone(), hash);
    }
}

pub fn holder(id: &str) -> Arc<dyn CredentialHolder> {
    Arc::new(MockNym::new(id))
}

pub fn role_agent(name: &str, nym: &str, role: &str, entity: &str) -> Agent {
    Agent::new(
        name,
        Representation::EntityRoleIndividual {
            nym_id: Identifier::new(nym),
            role_id: Identifier::new(role),
            entity_id: Identifier::new(entity),
        },
    )
}

pub fn group_agent(name: &str, group: &str, entity: &str) -> Agent {
    Agent::new(
        name,
        Representation::EntityVotingGroup {
            group_name: group.to_string(),
            entity_id: Identifier::new(entity),
        },
    )
}

/// Loads a fresh `MockNym` for every known id and counts the loads.
pub struct MockLoader {
    known: Vec<String>,
    loads: AtomicUsize,
}

impl MockLoader {
    pub fn with(ids: &[&str]) -> Self {
        Self {
            known: ids.iter().map(|s| s.to_string()).collect(),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl CredentialLoader for MockLoader {
    fn load(&self, identity: &Identifier) -> CovenantResult<Arc<dyn CredentialHolder>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.known.iter().any(|k| k == identity.as_str()) {
            Ok(holder(identity.as_str()))
        } else {
            Err(CovenantError::IdentityUnavailable {
                identity: identity.to_string(),
                reason: "unknown to mock loader".to_string(),
            })
        }
    }
}

/// Records filed receipts; can be switched to refuse them.
#[derive(Default)]
pub struct MockMailbox {
    filed: Mutex<Vec<Receipt>>,
    fail: AtomicBool,
}

impl MockMailbox {
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn filed(&self) -> Vec<Receipt> {
        self.filed.lock().unwrap().clone()
    }
}

impl Mailbox for MockMailbox {
    fn file(&self, receipt: &Receipt) -> CovenantResult<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CovenantError::DeliveryFailed {
                target: receipt.target.key(),
                reason: "mailbox offline".to_string(),
            });
        }
        let mut filed = self.filed.lock().unwrap();
        filed.push(receipt.clone());
        Ok(format!("head-{}", filed.len()))
    }
}

pub struct MockGroups {
    entity_id: Identifier,
    group_name: String,
    members: Vec<Identifier>,
}

impl MockGroups {
    pub fn with(entity: &str, group: &str, members: &[&str]) -> Self {
        Self {
            entity_id: Identifier::new(entity),
            group_name: group.to_string(),
            members: members.iter().map(|m| Identifier::new(*m)).collect(),
        }
    }
}

impl GroupDirectory for MockGroups {
    fn members(&self, entity_id: &Identifier, group_name: &str) -> Vec<Identifier> {
        if entity_id == &self.entity_id && group_name == self.group_name {
            self.members.clone()
        } else {
            Vec::new()
        }
    }
}
