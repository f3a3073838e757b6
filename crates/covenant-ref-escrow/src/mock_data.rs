//! Fictional Nyms, parties and accounts for the escrow reference runtime.
//!
//! Cast:
//! - Alice (`N1`) buys for herself from account `acct-A1`.
//! - Escrow Corp (`E1`) sells through its CFO (`N2` in role `R7`) from
//!   account `acct-E1`. Its `ClassA` board (`N7`, `N8`) votes on the deal.
//! - The notary signs with its own Nym (`NOTARY`).

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use serde_json::json;

use covenant_contracts::{
    account::AccountRecord,
    contract::ContractDocument,
    identity::{AccountId, Identifier, NotaryId},
    number::TransactionNumber,
    representation::Representation,
};
use covenant_core::{
    traits::{CredentialHolder, GroupDirectory, LoadedIdentities, NumberIssuer},
    Agent, Dispatcher, Party, PartyAccount, SequentialIssuer,
};
use covenant_mailbox::InMemoryMailbox;
use covenant_nym::{LocalNym, NymDirectory};
use covenant_settings::CovenantConfig;

pub const ALICE: &str = "N1";
pub const CFO: &str = "N2";
pub const CFO_ROLE: &str = "R7";
pub const CORP: &str = "E1";
pub const BOARD: &str = "ClassA";
pub const BOARD_MEMBERS: [&str; 2] = ["N7", "N8"];
pub const NOTARY_NYM: &str = "NOTARY";

pub const BUYER_ACCOUNT: &str = "acct-A1";
pub const SELLER_ACCOUNT: &str = "acct-E1";

// ── Group directory ───────────────────────────────────────────────────────────

/// Voting groups keyed by (entity, group name).
#[derive(Debug, Default)]
pub struct BoardRegistry {
    groups: HashMap<(Identifier, String), Vec<Identifier>>,
}

impl BoardRegistry {
    pub fn with_group(mut self, entity_id: &str, group_name: &str, members: &[&str]) -> Self {
        self.groups.insert(
            (Identifier::new(entity_id), group_name.to_string()),
            members.iter().map(|m| Identifier::new(*m)).collect(),
        );
        self
    }
}

impl GroupDirectory for BoardRegistry {
    fn members(&self, entity_id: &Identifier, group_name: &str) -> Vec<Identifier> {
        self.groups
            .get(&(entity_id.clone(), group_name.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

// ── World ─────────────────────────────────────────────────────────────────────

/// Everything one notary process needs to run an escrow contract.
pub struct EscrowWorld {
    pub notary: NotaryId,
    pub persist: bool,
    pub notary_nym: Arc<LocalNym>,
    pub directory: Arc<NymDirectory>,
    pub inboxes: InMemoryMailbox,
    pub nymboxes: InMemoryMailbox,
    pub boards: Arc<BoardRegistry>,
    pub dispatcher: Dispatcher,
    pub issuer: SequentialIssuer,
}

fn nym(id: &str, storage_dir: Option<&PathBuf>) -> Arc<LocalNym> {
    let nym = LocalNym::new(id, format!("{}-secret", id));
    Arc::new(match storage_dir {
        Some(dir) => nym.with_storage_dir(dir),
        None => nym,
    })
}

impl EscrowWorld {
    /// Build the cast, register every Nym in the directory, and wire the
    /// dispatcher to the mailboxes.
    pub fn new(config: &CovenantConfig) -> Self {
        let storage = config.number_storage_dir.as_ref();
        let directory = Arc::new(NymDirectory::new());
        for id in [ALICE, CFO, BOARD_MEMBERS[0], BOARD_MEMBERS[1]] {
            directory.register(nym(id, storage));
        }

        let notary_nym = nym(NOTARY_NYM, storage);
        let inboxes = InMemoryMailbox::new();
        let nymboxes = InMemoryMailbox::new();
        let boards = Arc::new(BoardRegistry::default().with_group(CORP, BOARD, &BOARD_MEMBERS));

        let dispatcher = Dispatcher::new(
            notary_nym.clone(),
            Arc::new(inboxes.clone()),
            Arc::new(nymboxes.clone()),
        )
        .with_loader(directory.clone())
        .with_group_directory(boards.clone());

        Self {
            notary: config.notary_id.clone(),
            persist: config.persist_numbers,
            notary_nym,
            directory,
            inboxes,
            nymboxes,
            boards,
            dispatcher,
            issuer: SequentialIssuer::starting_at(config.first_receipt_number),
        }
    }

    /// A registered Nym.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not part of the cast.
    pub fn nym(&self, id: &str) -> Arc<LocalNym> {
        self.directory
            .get(&Identifier::new(id))
            .unwrap_or_else(|| panic!("'{}' is not part of the escrow cast", id))
    }

    /// Issue `numbers` to `id` on this world's notary.
    pub fn grant(&self, id: &str, numbers: impl IntoIterator<Item = i64>) {
        self.nym(id).grant_numbers(&self.notary, numbers);
    }

    pub fn next_receipt_number(&self) -> TransactionNumber {
        self.issuer.issue_number(&self.notary)
    }

    /// The Nyms taking part in this pass, keyed the way the core expects.
    pub fn loaded(&self, ids: &[&str]) -> LoadedIdentities {
        ids.iter()
            .map(|id| {
                let holder: Arc<dyn CredentialHolder> = self.nym(id);
                (id.to_string(), holder)
            })
            .collect()
    }
}

// ── Parties and accounts ──────────────────────────────────────────────────────

pub fn buyer_party() -> Party {
    let mut party = Party::new("buyer", Identifier::new(ALICE), "alice");
    party.add_agent(Agent::new(
        "alice",
        Representation::SelfIndividual { nym_id: Identifier::new(ALICE) },
    ));
    party.add_account(PartyAccount::new("payment", AccountId::new(BUYER_ACCOUNT), "alice"));
    party
}

pub fn seller_party() -> Party {
    let mut party = Party::new("seller", Identifier::new(CORP), "cfo");
    party.add_agent(Agent::new(
        "cfo",
        Representation::EntityRoleIndividual {
            nym_id: Identifier::new(CFO),
            role_id: Identifier::new(CFO_ROLE),
            entity_id: Identifier::new(CORP),
        },
    ));
    party.add_agent(Agent::new(
        "board",
        Representation::EntityVotingGroup {
            group_name: BOARD.to_string(),
            entity_id: Identifier::new(CORP),
        },
    ));
    party.add_account(PartyAccount::new("proceeds", AccountId::new(SELLER_ACCOUNT), "cfo"));
    party
}

/// The accounts as their owners recorded them.
pub fn account_records() -> Vec<AccountRecord> {
    let buyer = AccountRecord::new(AccountId::new(BUYER_ACCOUNT), Identifier::new(ALICE));
    let mut seller = AccountRecord::new(AccountId::new(SELLER_ACCOUNT), Identifier::new(CORP));
    seller.authorize(Identifier::new(CFO_ROLE));
    vec![buyer, seller]
}

pub fn escrow_contract(notary: &NotaryId, opening: TransactionNumber) -> ContractDocument {
    ContractDocument::new(
        format!("escrow-{}", opening),
        notary.clone(),
        opening,
        json!({
            "kind": "escrow",
            "asset": "Lot 14, warehouse district",
            "price": { "amount": 250_000, "unit": "USD" },
            "release_on": "title transfer recorded",
            "parties": ["buyer", "seller"]
        }),
    )
}
