//! Scenario 1: Escrow settlement
//!
//! Alice buys a warehouse lot from Escrow Corp, whose CFO acts for the
//! company through role R7.
//!
//!   1. Each party binds its Nyms for the pass and reserves its opening
//!      number and one closing number per account.
//!   2. Both individual agents sign the contract; the signatures and each
//!      agent's agency over its account are verified.
//!   3. The notary consumes both opening numbers.
//!   4. Final receipts go to both inboxes and to every nymbox, the board's
//!      receipt fanning out to each member.
//!   5. Account owners close out their closing numbers.
//!   6. Both mailboxes' hash chains are verified.

use tracing::info;

use covenant_contracts::{
    contract::ContractDocument,
    error::{CovenantError, CovenantResult},
    identity::NotaryId,
};
use covenant_core::{
    traits::{CredentialHolder, LoadedIdentities},
    FinalizationReport, Party, PartyRegistry, Pass, ReceiptExtras, SignerSelection,
};
use covenant_settings::CovenantConfig;

use crate::{
    mock_data::{account_records, buyer_party, escrow_contract, seller_party, EscrowWorld, ALICE, CFO},
    scenarios::holder_for,
};

/// What a settlement run leaves behind.
#[derive(Debug)]
pub struct SettlementOutcome {
    pub contract: ContractDocument,
    pub reports: Vec<FinalizationReport>,
    pub registry: PartyRegistry,
    pub mailboxes_verified: bool,
}

/// Reserve every number `party` needs and have its individual agents sign.
/// The contract is drafted from the first party's opening number.
fn reserve_and_sign(
    party: &mut Party,
    loaded: &LoadedIdentities,
    notary: &NotaryId,
    persist: bool,
    contract: &mut Option<ContractDocument>,
) -> CovenantResult<()> {
    let mut pass = Pass::begin(party);
    pass.bind_credentials(loaded);
    let opening = pass.reserve_opening_trans_num(notary, persist, SignerSelection::UseOwnCredential)?;
    pass.reserve_transaction_numbers(notary, persist, SignerSelection::UseOwnCredential)?;

    let contract = contract.get_or_insert_with(|| escrow_contract(notary, opening));
    for agent in pass.agents().iter().filter(|a| a.is_individual()) {
        agent.sign(contract)?;
    }
    Ok(())
}

/// Check signatures and agency, then let the notary consume the opening
/// number.
fn verify_and_open(
    world: &EscrowWorld,
    party: &mut Party,
    loaded: &LoadedIdentities,
    contract: &ContractDocument,
) -> CovenantResult<()> {
    let records = account_records();
    let mut pass = Pass::begin(party);
    pass.bind_credentials(loaded);

    for agent in pass.agents().iter().filter(|a| a.is_individual()) {
        agent.verify_signature(contract)?;
    }
    for account in pass.accounts() {
        let agent = pass.agent(account.agent_name()).ok_or_else(|| CovenantError::UnknownAgent {
            party: pass.name().to_string(),
            agent: account.agent_name().to_string(),
        })?;
        let record = records
            .iter()
            .find(|r| &r.account_id == account.account_id())
            .ok_or_else(|| CovenantError::UnknownAccount {
                party: pass.name().to_string(),
                account: account.name().to_string(),
            })?;
        if !agent.verify_agency_over_account(record) {
            return Err(CovenantError::NotAuthorized {
                agent: agent.name().to_string(),
                reason: format!("no agency over account '{}'", record.account_id),
            });
        }
    }

    if let (Some(opening), Some(agent)) = (pass.opening_number(), pass.authorizing_agent()) {
        agent.remove_transaction_number(opening, &world.notary, world.notary_nym.as_ref(), world.persist)?;
    }
    Ok(())
}

/// Each account's agent removes the closing number its final receipt
/// referenced, signing the saved set itself.
fn close_out(world: &EscrowWorld, party: &mut Party, loaded: &LoadedIdentities) -> CovenantResult<usize> {
    let mut pass = Pass::begin(party);
    pass.bind_credentials(loaded);

    let mut closed = 0;
    for account in pass.accounts() {
        let (Some(closing), Some(agent)) = (account.closing_number(), pass.agent(account.agent_name())) else {
            continue;
        };
        let holder = holder_for(agent, loaded)?;
        agent.remove_transaction_number(closing, &world.notary, holder.as_ref(), world.persist)?;
        closed += 1;
    }
    Ok(closed)
}

/// Run the whole settlement against `world`.
pub fn settle(world: &EscrowWorld) -> CovenantResult<SettlementOutcome> {
    world.grant(ALICE, 1001..=1004);
    world.grant(CFO, 2001..=2003);
    let loaded = world.loaded(&[ALICE, CFO]);

    let mut parties = vec![buyer_party(), seller_party()];
    let mut contract = None;
    for party in &mut parties {
        reserve_and_sign(party, &loaded, &world.notary, world.persist, &mut contract)?;
    }
    let contract = contract.ok_or_else(|| CovenantError::NotAuthorized {
        agent: "buyer".to_string(),
        reason: "no party reserved an opening number".to_string(),
    })?;

    for party in &mut parties {
        verify_and_open(world, party, &loaded, &contract)?;
    }

    let orig_item = contract.body.to_string();
    let extras = ReceiptExtras::note("escrow released on recorded title transfer");
    let reports: Vec<FinalizationReport> = parties
        .iter()
        .map(|party| {
            world
                .dispatcher
                .finalize_party(party, &contract, &orig_item, &extras, &world.issuer, Some(&loaded))
        })
        .collect();

    for party in &mut parties {
        close_out(world, party, &loaded)?;
    }

    let mut registry = PartyRegistry::new();
    for party in parties {
        registry.register(party);
    }

    let mailboxes_verified = world.inboxes.verify_integrity() && world.nymboxes.verify_integrity();
    info!(
        contract_id = %contract.contract_id,
        signatures = contract.signatures.len(),
        verified = mailboxes_verified,
        "escrow settled"
    );

    Ok(SettlementOutcome {
        contract,
        reports,
        registry,
        mailboxes_verified,
    })
}

// ── Scenario runner ───────────────────────────────────────────────────────────

/// Run Scenario 1: Escrow settlement.
pub fn run_scenario(config: &CovenantConfig) -> CovenantResult<()> {
    println!("=== Scenario 1: Escrow Settlement ===");
    println!();

    let world = EscrowWorld::new(config);
    let outcome = settle(&world)?;

    println!("  Contract:           {}", outcome.contract.contract_id);
    println!("  Notary:             {}", world.notary);
    println!("  Signatures:         {}", outcome.contract.signatures.len());
    println!();

    for party in outcome.registry.iter() {
        println!("  Party '{}' (owner {})", party.name(), party.owner_id());
        for agent in party.agents() {
            println!(
                "    agent {:<6} {:<5} authorizing: {:<5} accounts: {}",
                agent.name(),
                agent.representation().kind(),
                agent.is_authorizing_agent_for_party(&outcome.registry),
                agent.count_authorized_accts(&outcome.registry)
            );
        }
    }
    println!();

    for report in &outcome.reports {
        for delivery in report.inbox.iter().chain(report.nymbox.iter()) {
            match &delivery.result {
                Ok(receipt) => println!(
                    "  {:<18} {} #{}",
                    delivery.target, receipt.kind, receipt.transaction_number
                ),
                Err(e) => println!("  {:<18} FAILED: {}", delivery.target, e),
            }
        }
    }
    println!();

    let alice = world.nym(ALICE);
    println!(
        "  Alice issued left:  {:?}  in use: {:?}",
        alice.issued_snapshot(&world.notary),
        alice.in_use_snapshot(&world.notary)
    );
    println!(
        "  Alice nymbox hash:  {}",
        alice.nymbox_hash(&world.notary).unwrap_or_default()
    );
    println!(
        "  Mailbox chains:     {}",
        if outcome.mailboxes_verified { "VERIFIED" } else { "FAILED" }
    );
    println!();
    println!("  Scenario 1 complete.");
    println!();

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use covenant_contracts::{
        identity::{AccountId, Identifier},
        number::TransactionNumber,
        receipt::{MailboxTarget, ReceiptKind},
    };
    use covenant_core::{traits::CredentialHolder, FinalizationState};
    use covenant_settings::CovenantConfig;

    use super::settle;
    use crate::mock_data::{EscrowWorld, ALICE, BOARD_MEMBERS, BUYER_ACCOUNT, CFO, SELLER_ACCOUNT};

    #[test]
    fn settlement_delivers_every_receipt() {
        let world = EscrowWorld::new(&CovenantConfig::default());
        let outcome = settle(&world).unwrap();

        assert_eq!(outcome.contract.transaction_number, TransactionNumber(1001));
        assert_eq!(outcome.contract.signatures.len(), 2);
        assert!(outcome.mailboxes_verified);
        for report in &outcome.reports {
            assert_eq!(report.state, FinalizationState::Done);
            assert!(report.all_delivered(), "{:?}", report);
        }

        let buyer_inbox = world.inboxes.receipts(&MailboxTarget::Inbox {
            account_id: AccountId::new(BUYER_ACCOUNT),
        });
        assert_eq!(buyer_inbox.len(), 1);
        assert_eq!(buyer_inbox[0].closing_number, Some(TransactionNumber(1002)));
        assert_eq!(buyer_inbox[0].in_reference_to, TransactionNumber(1001));

        let seller_inbox = world.inboxes.receipts(&MailboxTarget::Inbox {
            account_id: AccountId::new(SELLER_ACCOUNT),
        });
        assert_eq!(seller_inbox[0].closing_number, Some(TransactionNumber(2002)));

        assert_eq!(world.nymboxes.box_keys().len(), 4, "alice, cfo and two board members");
    }

    #[test]
    fn settlement_consumes_exactly_the_reserved_numbers() {
        let world = EscrowWorld::new(&CovenantConfig::default());
        settle(&world).unwrap();

        let alice = world.nym(ALICE);
        assert_eq!(alice.issued_snapshot(&world.notary), vec![1003, 1004]);
        assert!(alice.in_use_snapshot(&world.notary).is_empty());

        let cfo = world.nym(CFO);
        assert_eq!(cfo.issued_snapshot(&world.notary), vec![2003]);
        assert!(cfo.in_use_snapshot(&world.notary).is_empty());
    }

    #[test]
    fn recipients_record_their_nymbox_heads() {
        let world = EscrowWorld::new(&CovenantConfig::default());
        settle(&world).unwrap();

        for id in [ALICE, CFO, BOARD_MEMBERS[0], BOARD_MEMBERS[1]] {
            let target = MailboxTarget::Nymbox { identity: Identifier::new(id) };
            assert_eq!(
                world.nym(id).nymbox_hash(&world.notary),
                Some(world.nymboxes.head_hash(&target)),
                "nymbox hash for {}",
                id
            );
            assert_eq!(world.nymboxes.receipts(&target)[0].kind, ReceiptKind::FinalReceipt);
        }
    }

    #[test]
    fn registry_reports_authority() {
        let world = EscrowWorld::new(&CovenantConfig::default());
        let outcome = settle(&world).unwrap();
        let registry = &outcome.registry;

        let seller = registry.get(registry.find("seller").unwrap()).unwrap();
        let cfo = seller.agent("cfo").unwrap();
        let board = seller.agent("board").unwrap();
        assert!(cfo.is_authorizing_agent_for_party(registry));
        assert_eq!(cfo.count_authorized_accts(registry), 1);
        assert!(!board.is_authorizing_agent_for_party(registry));
        assert_eq!(
            registry.party_owning(&AccountId::new(BUYER_ACCOUNT)).unwrap().name(),
            "buyer"
        );
    }

    #[test]
    fn persisted_numbers_are_signed_by_the_right_nym() {
        let dir = tempfile::tempdir().unwrap();
        let config = CovenantConfig {
            number_storage_dir: Some(dir.path().to_path_buf()),
            ..CovenantConfig::default()
        };
        let world = EscrowWorld::new(&config);
        settle(&world).unwrap();

        // The last save for Alice was her own close-out.
        let snapshot = world.nym(ALICE).saved_snapshot(&world.notary).unwrap().unwrap();
        assert_eq!(snapshot.signer_id, Identifier::new(ALICE));
        assert_eq!(snapshot.issued, vec![1003, 1004]);
        assert!(snapshot.in_use.is_empty());
        assert!(world.nym(ALICE).snapshot_file(&world.notary).unwrap().exists());
    }
}
