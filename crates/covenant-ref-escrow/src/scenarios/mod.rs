//! Escrow reference runtime demo scenarios.
//!
//! Each scenario builds its own `EscrowWorld` from the runtime configuration
//! and drives real COVENANT components (agents, ledger adapter, dispatcher,
//! mailboxes) through one contract lifecycle.

use std::sync::Arc;

use covenant_contracts::error::{CovenantError, CovenantResult};
use covenant_core::{
    traits::{CredentialHolder, LoadedIdentities},
    Agent,
};

pub mod board_notice;
pub mod rollback;
pub mod settlement;

/// The live holder for `agent`'s own Nym among this pass's identities.
pub(crate) fn holder_for(agent: &Agent, loaded: &LoadedIdentities) -> CovenantResult<Arc<dyn CredentialHolder>> {
    agent
        .nym_id()
        .and_then(|id| loaded.get(id.as_str()))
        .cloned()
        .ok_or_else(|| CovenantError::NoCredentialBound {
            agent: agent.name().to_string(),
        })
}
