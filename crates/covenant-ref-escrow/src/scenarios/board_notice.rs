//! Scenario 3: Board vote notice
//!
//! Escrow Corp's ClassA board approves the sale. A voting group is not a
//! Nym, so:
//!
//!   1. The seller's agents round-trip through their serialized
//!      descriptors; the group's descriptor carries no nym_id.
//!   2. Even with a member's credential bound, the board cannot sign or
//!      reserve numbers.
//!   3. The CFO opens the vote item with one of its own numbers.
//!   4. The approval notice is delivered once per board member, with the
//!      member as the acting identity; each member's nymbox hash is updated
//!      through the Nym directory.
//!   5. The CFO consumes the vote item's number.

use std::sync::Arc;

use tracing::info;

use covenant_contracts::{
    error::{CovenantError, CovenantResult},
    receipt::Receipt,
    representation::AgentDescriptor,
};
use covenant_core::{
    traits::{CredentialHolder, GroupDirectory},
    Agent, Pass, ReceiptExtras, SignerSelection,
};
use covenant_settings::CovenantConfig;

use crate::mock_data::{escrow_contract, seller_party, EscrowWorld, BOARD_MEMBERS, CFO};

/// What the board vote leaves behind.
#[derive(Debug)]
pub struct BoardOutcome {
    /// Each seller agent's descriptor as JSON.
    pub descriptors: Vec<String>,
    /// Why the board could not act for itself.
    pub refusals: Vec<CovenantError>,
    pub notices: Vec<Receipt>,
}

fn descriptor_json(agent: &Agent) -> CovenantResult<String> {
    serde_json::to_string(&agent.descriptor()).map_err(|e| CovenantError::InvalidDescriptor {
        name: agent.name().to_string(),
        reason: e.to_string(),
    })
}

/// Parse `json` back into an agent and check it represents the same thing.
fn reparse(agent: &Agent, json: &str) -> CovenantResult<()> {
    let descriptor: AgentDescriptor = serde_json::from_str(json).map_err(|e| CovenantError::InvalidDescriptor {
        name: agent.name().to_string(),
        reason: e.to_string(),
    })?;
    let parsed = Agent::from_descriptor(descriptor)?;
    if parsed.representation() != agent.representation() {
        return Err(CovenantError::InvalidDescriptor {
            name: agent.name().to_string(),
            reason: "descriptor does not round-trip".to_string(),
        });
    }
    Ok(())
}

pub fn hold_vote(world: &EscrowWorld) -> CovenantResult<BoardOutcome> {
    world.grant(CFO, [3001]);
    let mut seller = seller_party();

    let mut descriptors = Vec::new();
    for agent in seller.agents() {
        let json = descriptor_json(agent)?;
        reparse(agent, &json)?;
        descriptors.push(json);
    }

    // A member's credential bound to the group changes nothing.
    let member: Arc<dyn CredentialHolder> = world.nym(BOARD_MEMBERS[0]);
    let mut refusals = Vec::new();
    {
        let mut pass = Pass::begin(&mut seller);
        let board = pass.agent_mut("board").ok_or_else(|| CovenantError::UnknownAgent {
            party: "seller".to_string(),
            agent: "board".to_string(),
        })?;
        board.set_credential_holder(&member);

        let mut ballot = escrow_contract(&world.notary, 0.into());
        if let Err(e) = board.sign(&mut ballot) {
            refusals.push(e);
        }
        let own = SignerSelection::UseOwnCredential;
        if let Err(e) = board.reserve_opening_trans_num(&world.notary, false, own) {
            refusals.push(e);
        }
    }

    let loaded = world.loaded(&[CFO]);
    let mut pass = Pass::begin(&mut seller);
    pass.bind_credentials(&loaded);
    let vote_item =
        pass.reserve_opening_trans_num(&world.notary, world.persist, SignerSelection::UseOwnCredential)?;

    let (Some(board), Some(cfo)) = (pass.agent("board"), pass.agent("cfo")) else {
        return Err(CovenantError::UnknownAgent {
            party: "seller".to_string(),
            agent: "board".to_string(),
        });
    };
    let (Some(entity_id), Some(group_name)) = (board.entity_id(), board.group_name()) else {
        return Err(CovenantError::NotAuthorized {
            agent: board.name().to_string(),
            reason: "not a voting group".to_string(),
        });
    };

    let extras = ReceiptExtras::note("ClassA approves sale of Lot 14");
    let mut notices = Vec::new();
    for member_id in world.boards.members(entity_id, group_name) {
        notices.push(world.dispatcher.drop_server_notice_to_nymbox(
            board,
            true,
            world.notary_nym.as_ref(),
            &world.notary,
            world.next_receipt_number(),
            vote_item,
            "board vote: approve escrow sale",
            &extras,
            Some(&member_id),
            None,
        )?);
    }

    let cfo_holder = crate::scenarios::holder_for(cfo, &loaded)?;
    cfo.remove_transaction_number(vote_item, &world.notary, cfo_holder.as_ref(), world.persist)?;
    info!(vote_item = %vote_item, notices = notices.len(), "board vote delivered");

    Ok(BoardOutcome {
        descriptors,
        refusals,
        notices,
    })
}

// ── Scenario runner ───────────────────────────────────────────────────────────

/// Run Scenario 3: Board vote notice.
pub fn run_scenario(config: &CovenantConfig) -> CovenantResult<()> {
    println!("=== Scenario 3: Board Vote Notice ===");
    println!();

    let world = EscrowWorld::new(config);
    let outcome = hold_vote(&world)?;

    println!("  Seller agent descriptors:");
    for json in &outcome.descriptors {
        println!("    {}", json);
    }
    println!();
    println!("  Board acting alone:");
    for refusal in &outcome.refusals {
        println!("    REFUSED: {}", refusal);
    }
    println!();
    for notice in &outcome.notices {
        println!(
            "  {:<18} {} #{} re #{}",
            notice.target, notice.kind, notice.transaction_number, notice.in_reference_to
        );
    }
    for id in BOARD_MEMBERS {
        println!(
            "  {} nymbox hash:      {}",
            id,
            world.nym(id).nymbox_hash(&world.notary).unwrap_or_default()
        );
    }
    println!();
    println!("  Scenario 3 complete.");
    println!();

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use covenant_contracts::{
        error::CovenantError,
        identity::Identifier,
        number::TransactionNumber,
        receipt::{MailboxTarget, ReceiptKind},
    };
    use covenant_core::traits::CredentialHolder;
    use covenant_settings::CovenantConfig;

    use super::hold_vote;
    use crate::mock_data::{EscrowWorld, BOARD_MEMBERS, CFO};

    #[test]
    fn group_descriptor_omits_individual_fields() {
        let world = EscrowWorld::new(&CovenantConfig::default());
        let outcome = hold_vote(&world).unwrap();

        let board: serde_json::Value = serde_json::from_str(&outcome.descriptors[1]).unwrap();
        assert_eq!(board["type"], "group");
        assert_eq!(board["group_name"], "ClassA");
        assert_eq!(board["entity_id"], "E1");
        assert!(board.get("nym_id").is_none());
        assert!(board.get("role_id").is_none());
    }

    #[test]
    fn board_cannot_act_for_itself() {
        let world = EscrowWorld::new(&CovenantConfig::default());
        world.grant(BOARD_MEMBERS[0], [7001]);
        let outcome = hold_vote(&world).unwrap();

        assert_eq!(outcome.refusals.len(), 2);
        assert!(outcome
            .refusals
            .iter()
            .all(|e| matches!(e, CovenantError::NotApplicable { .. })));
        assert!(
            world.nym(BOARD_MEMBERS[0]).issued_snapshot(&world.notary) == vec![7001],
            "no number was taken from the bound member"
        );
    }

    #[test]
    fn each_member_receives_the_approval() {
        let world = EscrowWorld::new(&CovenantConfig::default());
        let outcome = hold_vote(&world).unwrap();

        assert_eq!(outcome.notices.len(), 2);
        for (notice, id) in outcome.notices.iter().zip(BOARD_MEMBERS) {
            let target = MailboxTarget::Nymbox { identity: Identifier::new(id) };
            assert_eq!(notice.target, target);
            assert_eq!(notice.kind, ReceiptKind::NoticeSuccess);
            assert_eq!(notice.in_reference_to, TransactionNumber(3001));
            assert_eq!(
                world.nym(id).nymbox_hash(&world.notary),
                Some(world.nymboxes.head_hash(&target))
            );
        }
    }

    #[test]
    fn vote_item_number_is_consumed() {
        let world = EscrowWorld::new(&CovenantConfig::default());
        hold_vote(&world).unwrap();

        let cfo = world.nym(CFO);
        assert!(cfo.issued_snapshot(&world.notary).is_empty());
        assert!(cfo.in_use_snapshot(&world.notary).is_empty());
    }
}
