//! Scenario 2: Failed-step rollback
//!
//! The buyer reserves its numbers, but the seller's CFO has none left on
//! this notary. Nothing rolls back on its own:
//!
//!   1. The buyer's reservation succeeds (opening and closing numbers move
//!      to the in-use set).
//!   2. The seller's reservation fails with `NoNumbersAvailable`.
//!   3. The notary harvests every reserved number back to the issued sets,
//!      saving them under its own signature.
//!   4. Every individual agent gets a rejection notice in its nymbox.

use tracing::warn;

use covenant_contracts::{
    error::{CovenantError, CovenantResult},
    number::TransactionNumber,
    receipt::Receipt,
};
use covenant_core::{Party, Pass, ReceiptExtras, SignerSelection};
use covenant_settings::CovenantConfig;

use crate::mock_data::{buyer_party, seller_party, EscrowWorld, ALICE, CFO};

/// What a failed activation leaves behind.
#[derive(Debug)]
pub struct RollbackOutcome {
    /// The error that stopped the activation.
    pub failure: CovenantError,
    /// The buyer's opening number, referenced by every notice.
    pub opening: TransactionNumber,
    pub harvested: usize,
    pub notices: Vec<Receipt>,
}

/// Try to activate the escrow and roll back when a party cannot reserve.
///
/// Returns an error only when the rollback itself goes wrong, or when the
/// activation unexpectedly succeeds.
pub fn attempt_activation(world: &EscrowWorld) -> CovenantResult<RollbackOutcome> {
    world.grant(ALICE, 1001..=1003);
    let loaded = world.loaded(&[ALICE, CFO]);
    let mut parties = vec![buyer_party(), seller_party()];

    let mut opening = None;
    let mut failure = None;
    for party in &mut parties {
        let mut pass = Pass::begin(party);
        pass.bind_credentials(&loaded);
        let reserved =
            pass.reserve_transaction_numbers(&world.notary, world.persist, SignerSelection::UseOwnCredential);
        match reserved {
            Ok(_) => opening = opening.or(pass.opening_number()),
            Err(e) => {
                warn!(party = %pass.name(), error = %e, "reservation failed, rolling back");
                failure = Some(e);
                break;
            }
        }
    }

    let (Some(failure), Some(opening)) = (failure, opening) else {
        return Err(CovenantError::NotAuthorized {
            agent: "seller".to_string(),
            reason: "activation was expected to fail on the seller's reservation".to_string(),
        });
    };

    let mut harvested = 0;
    for party in &mut parties {
        let mut pass = Pass::begin(party);
        pass.bind_credentials(&loaded);
        harvested += pass.harvest_reserved_numbers(
            &world.notary,
            world.persist,
            SignerSelection::UseProvided(world.notary_nym.as_ref()),
        )?;
    }

    let extras = ReceiptExtras::note(format!("escrow activation rejected: {}", failure));
    let mut notices = Vec::new();
    for agent in parties.iter().flat_map(Party::agents).filter(|a| a.is_individual()) {
        notices.push(world.dispatcher.drop_server_notice_to_nymbox(
            agent,
            false,
            world.notary_nym.as_ref(),
            &world.notary,
            world.next_receipt_number(),
            opening,
            "activate escrow",
            &extras,
            None,
            Some(&loaded),
        )?);
    }

    Ok(RollbackOutcome {
        failure,
        opening,
        harvested,
        notices,
    })
}

// ── Scenario runner ───────────────────────────────────────────────────────────

/// Run Scenario 2: Failed-step rollback.
pub fn run_scenario(config: &CovenantConfig) -> CovenantResult<()> {
    println!("=== Scenario 2: Failed-Step Rollback ===");
    println!();

    let world = EscrowWorld::new(config);
    let outcome = attempt_activation(&world)?;
    let alice = world.nym(ALICE);

    println!("  Buyer opening number:   {}", outcome.opening);
    println!("  Activation failed:      {}", outcome.failure);
    println!("  Numbers harvested:      {}", outcome.harvested);
    println!(
        "  Alice issued restored:  {:?}  in use: {:?}",
        alice.issued_snapshot(&world.notary),
        alice.in_use_snapshot(&world.notary)
    );
    println!();
    for notice in &outcome.notices {
        println!(
            "  {:<18} {} #{} re #{}",
            notice.target, notice.kind, notice.transaction_number, notice.in_reference_to
        );
    }
    println!();
    println!("  Scenario 2 complete.");
    println!();

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
