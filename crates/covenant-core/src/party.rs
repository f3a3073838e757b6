//! Parties, their accounts, and the registry that owns them.
//!
//! A `Party` is a contracting counterpart: a single Nym acting for himself,
//! or an entity acting through role-holders and voting groups. It owns its
//! agents and accounts. Agents refer back to their party through a
//! `PartyHandle` into the `PartyRegistry`, never through a pointer.
//!
//! Reservation rules enforced here:
//! - only the party's authorizing agent reserves the opening number
//! - only an account's named agent reserves that account's closing number

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use covenant_contracts::{
    error::{CovenantError, CovenantResult},
    identity::{AccountId, Identifier, NotaryId},
    number::TransactionNumber,
};

use crate::{
    agent::Agent,
    ledger::SignerSelection,
    pass::TemporaryReferences,
    traits::LoadedIdentities,
};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(0);

/// Stable index of a party inside the `PartyRegistry` that issued it.
/// Another registry never resolves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartyHandle {
    registry: u64,
    index: usize,
}

/// An account a party brings into the contract.
#[derive(Debug, Clone)]
pub struct PartyAccount {
    name: String,
    account_id: AccountId,
    agent_name: String,
    closing_number: Option<TransactionNumber>,
}

impl PartyAccount {
    pub fn new(name: impl Into<String>, account_id: AccountId, agent_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            account_id,
            agent_name: agent_name.into(),
            closing_number: None,
        }
    }

    /// Name of the account as used in the contract script.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    /// The agent authorized to act on this account.
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn closing_number(&self) -> Option<TransactionNumber> {
        self.closing_number
    }

    pub(crate) fn set_closing_number(&mut self, number: TransactionNumber) {
        self.closing_number = Some(number);
    }

    pub(crate) fn clear_closing_number(&mut self) {
        self.closing_number = None;
    }
}

#[derive(Debug)]
pub struct Party {
    name: String,
    owner_id: Identifier,
    authorizing_agent: String,
    agents: Vec<Agent>,
    accounts: Vec<PartyAccount>,
    opening_number: Option<TransactionNumber>,
    handle: Option<PartyHandle>,
}

impl Party {
    /// `owner_id` is the NymID for a self party, the EntityID otherwise.
    pub fn new(
        name: impl Into<String>,
        owner_id: Identifier,
        authorizing_agent: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            owner_id,
            authorizing_agent: authorizing_agent.into(),
            agents: Vec::new(),
            accounts: Vec::new(),
            opening_number: None,
            handle: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner_id(&self) -> &Identifier {
        &self.owner_id
    }

    pub fn handle(&self) -> Option<PartyHandle> {
        self.handle
    }

    pub fn authorizing_agent_name(&self) -> &str {
        &self.authorizing_agent
    }

    pub fn authorizing_agent(&self) -> Option<&Agent> {
        self.agent(&self.authorizing_agent)
    }

    pub fn opening_number(&self) -> Option<TransactionNumber> {
        self.opening_number
    }

    /// Add an agent to this party.
    ///
    /// # Panics
    ///
    /// Panics if an agent with the same name is already present, or if the
    /// agent is already attached to another party.
    pub fn add_agent(&mut self, mut agent: Agent) {
        assert!(
            self.agent(agent.name()).is_none(),
            "party '{}' already has an agent named '{}'",
            self.name,
            agent.name()
        );
        if let Some(handle) = self.handle {
            agent.set_party(handle);
        }
        self.agents.push(agent);
    }

    pub fn add_account(&mut self, account: PartyAccount) {
        self.accounts.push(account);
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.name() == name)
    }

    pub fn agent_mut(&mut self, name: &str) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|a| a.name() == name)
    }

    pub fn accounts(&self) -> &[PartyAccount] {
        &self.accounts
    }

    pub fn account(&self, name: &str) -> Option<&PartyAccount> {
        self.accounts.iter().find(|a| a.name() == name)
    }

    pub fn account_by_id(&self, account_id: &AccountId) -> Option<&PartyAccount> {
        self.accounts.iter().find(|a| a.account_id() == account_id)
    }

    /// Number of this party's accounts that name `agent_name` as their agent.
    pub fn count_accounts_for_agent(&self, agent_name: &str) -> usize {
        self.accounts
            .iter()
            .filter(|a| a.agent_name() == agent_name)
            .count()
    }

    /// Bind every individual agent whose Nym is in `loaded`. Returns how many
    /// agents were bound.
    pub fn bind_credentials(&mut self, loaded: &LoadedIdentities) -> usize {
        let mut bound = 0;
        for agent in &mut self.agents {
            let holder = agent.nym_id().and_then(|id| loaded.get(id.as_str())).cloned();
            if let Some(holder) = holder {
                agent.set_credential_holder(&holder);
                bound += 1;
            }
        }
        debug!(party = %self.name, bound = bound, "party credentials bound");
        bound
    }

    // ── Reservation ──────────────────────────────────────────────────────────

    /// Reserve the party's opening number through its authorizing agent.
    ///
    /// A party whose opening number is still in use keeps it. The number is
    /// recorded on the party before it is saved, so a failed save still
    /// leaves the reservation visible for harvest.
    pub fn reserve_opening_trans_num(
        &mut self,
        notary: &NotaryId,
        persist: bool,
        signer: SignerSelection<'_>,
    ) -> CovenantResult<TransactionNumber> {
        let agent = self.agent(&self.authorizing_agent).ok_or_else(|| CovenantError::UnknownAgent {
            party: self.name.clone(),
            agent: self.authorizing_agent.clone(),
        })?;
        if let Some(existing) = self.opening_number {
            if agent.verify_transaction_number(existing, notary)? {
                debug!(party = %self.name, number = %existing, "party already has an opening number");
                return Ok(existing);
            }
            warn!(
                party = %self.name,
                number = %existing,
                "opening number is no longer in use, reserving a new one"
            );
        }

        let number = agent.reserve_opening_trans_num(notary, false, signer)?;
        let saved = if persist { agent.save_number_sets(notary, signer) } else { Ok(()) };
        self.opening_number = Some(number);
        saved.map(|()| number)
    }

    /// Reserve a closing number for the account called `account_name`
    /// through the agent named on it.
    pub fn reserve_closing_trans_num(
        &mut self,
        notary: &NotaryId,
        account_name: &str,
        persist: bool,
        signer: SignerSelection<'_>,
    ) -> CovenantResult<TransactionNumber> {
        let opening = self.opening_number;
        let party = self.name.clone();
        let account = self
            .accounts
            .iter_mut()
            .find(|a| a.name() == account_name)
            .ok_or_else(|| CovenantError::UnknownAccount {
                party: party.clone(),
                account: account_name.to_string(),
            })?;
        let agent = self
            .agents
            .iter()
            .find(|a| a.name() == account.agent_name())
            .ok_or_else(|| CovenantError::UnknownAgent {
                party,
                agent: account.agent_name().to_string(),
            })?;
        agent.reserve_closing_trans_num(notary, account, opening, persist, signer)
    }

    /// Reserve the opening number and a closing number for every account,
    /// stopping at the first failure. Numbers already reserved stay reserved;
    /// call `harvest_reserved_numbers` to roll back.
    pub fn reserve_transaction_numbers(
        &mut self,
        notary: &NotaryId,
        persist: bool,
        signer: SignerSelection<'_>,
    ) -> CovenantResult<usize> {
        self.reserve_opening_trans_num(notary, persist, signer)?;
        let names: Vec<String> = self.accounts.iter().map(|a| a.name().to_string()).collect();
        for name in &names {
            self.reserve_closing_trans_num(notary, name, persist, signer)?;
        }
        info!(party = %self.name, notary = %notary, accounts = names.len(), "party numbers reserved");
        Ok(names.len() + 1)
    }

    /// Harvest every number this party has reserved and forget the
    /// reservations. Returns how many numbers went back to an issued set.
    ///
    /// Keeps going past individual failures and reports the first one. A
    /// reservation is forgotten whenever its number has left the in-use set,
    /// including when the harvest moved it but the save failed.
    pub fn harvest_reserved_numbers(
        &mut self,
        notary: &NotaryId,
        persist: bool,
        signer: SignerSelection<'_>,
    ) -> CovenantResult<usize> {
        let mut harvested = 0;
        let mut first_error = None;

        if let Some(opening) = self.opening_number {
            let (result, released) = match self.agent(&self.authorizing_agent) {
                Some(agent) => {
                    let result = agent.harvest_transaction_number(opening, notary, persist, signer);
                    let released = result.is_ok() || no_longer_in_use(agent, opening, notary);
                    (result, released)
                }
                None => (
                    Err(CovenantError::UnknownAgent {
                        party: self.name.clone(),
                        agent: self.authorizing_agent.clone(),
                    }),
                    false,
                ),
            };
            if released {
                self.opening_number = None;
            }
            match result {
                Ok(returned) => harvested += usize::from(returned),
                Err(e) => first_error = first_error.or(Some(e)),
            }
        }

        for account in &mut self.accounts {
            let Some(closing) = account.closing_number() else {
                continue;
            };
            let (result, released) = match self.agents.iter().find(|a| a.name() == account.agent_name()) {
                Some(agent) => {
                    let result = agent.harvest_transaction_number(closing, notary, persist, signer);
                    let released = result.is_ok() || no_longer_in_use(agent, closing, notary);
                    (result, released)
                }
                None => (
                    Err(CovenantError::UnknownAgent {
                        party: self.name.clone(),
                        agent: account.agent_name().to_string(),
                    }),
                    false,
                ),
            };
            if released {
                account.clear_closing_number();
            }
            match result {
                Ok(returned) => harvested += usize::from(returned),
                Err(e) => first_error = first_error.or(Some(e)),
            }
        }

        match first_error {
            Some(e) => {
                warn!(party = %self.name, harvested = harvested, error = %e, "harvest incomplete");
                Err(e)
            }
            None => {
                info!(party = %self.name, harvested = harvested, "reserved numbers harvested");
                Ok(harvested)
            }
        }
    }
}

/// True only when the agent can confirm `number` has left its in-use set.
fn no_longer_in_use(agent: &Agent, number: TransactionNumber, notary: &NotaryId) -> bool {
    matches!(agent.verify_transaction_number(number, notary), Ok(false))
}

impl TemporaryReferences for Party {
    fn clear_temporary_references(&mut self) {
        for agent in &mut self.agents {
            agent.clear_temporary_reference();
        }
    }
}

/// Owns every party of a contract and hands out stable handles.
#[derive(Debug)]
pub struct PartyRegistry {
    id: u64,
    parties: Vec<Party>,
}

impl Default for PartyRegistry {
    fn default() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            parties: Vec::new(),
        }
    }
}

impl PartyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `party` and attach its agents to it.
    pub fn register(&mut self, mut party: Party) -> PartyHandle {
        let handle = self.handle_at(self.parties.len());
        party.handle = Some(handle);
        for agent in &mut party.agents {
            agent.set_party(handle);
        }
        self.parties.push(party);
        handle
    }

    fn handle_at(&self, index: usize) -> PartyHandle {
        PartyHandle { registry: self.id, index }
    }

    fn index_of(&self, handle: PartyHandle) -> Option<usize> {
        (handle.registry == self.id).then_some(handle.index)
    }

    pub fn get(&self, handle: PartyHandle) -> Option<&Party> {
        self.index_of(handle).and_then(|i| self.parties.get(i))
    }

    pub fn get_mut(&mut self, handle: PartyHandle) -> Option<&mut Party> {
        self.index_of(handle).and_then(|i| self.parties.get_mut(i))
    }

    pub fn find(&self, name: &str) -> Option<PartyHandle> {
        self.parties
            .iter()
            .position(|p| p.name() == name)
            .map(|i| self.handle_at(i))
    }

    /// The party that brought `account_id` into the contract.
    pub fn party_owning(&self, account_id: &AccountId) -> Option<&Party> {
        self.parties.iter().find(|p| p.account_by_id(account_id).is_some())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Party> {
        self.parties.iter()
    }
}

// ── Agent ↔ party binding ────────────────────────────────────────────────────

impl Agent {
    /// Attach this agent to its party.
    ///
    /// # Panics
    ///
    /// Panics if the agent is already attached. Attachment happens once, when
    /// the agent is added to its party; a second attach is a caller bug.
    pub fn set_party(&mut self, handle: PartyHandle) {
        assert!(
            self.party.is_none(),
            "agent '{}' is already attached to a party",
            self.name()
        );
        self.party = Some(handle);
    }

    pub fn party(&self) -> Option<PartyHandle> {
        self.party
    }

    /// Whether this agent is its party's designated authorizing agent.
    pub fn is_authorizing_agent_for_party(&self, registry: &PartyRegistry) -> bool {
        self.party
            .and_then(|h| registry.get(h))
            .is_some_and(|p| p.authorizing_agent_name() == self.name())
    }

    /// How many of its party's accounts this agent is authorized for.
    pub fn count_authorized_accts(&self, registry: &PartyRegistry) -> usize {
        self.party
            .and_then(|h| registry.get(h))
            .map_or(0, |p| p.count_accounts_for_agent(self.name()))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
