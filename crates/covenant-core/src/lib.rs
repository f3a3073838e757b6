//! # covenant-core
//!
//! Agent authority for scripted contracts.
//!
//! This crate provides:
//! - `Agent`, the binding between a contract party and a live identity
//! - the transaction-number ledger adapter (reserve, remove, harvest)
//! - `Party` and `PartyRegistry`, which own agents and accounts
//! - `Pass`, the scope guard that clears per-pass credential references
//! - `Dispatcher`, which files final receipts and notices
//!
//! ## Usage
//!
//! ```rust,ignore
//! use covenant_core::{Pass, Party, SignerSelection};
//!
//! let mut pass = Pass::begin(&mut party);
//! pass.bind_credentials(&loaded);
//! if let Err(e) = pass.reserve_transaction_numbers(&notary, true, SignerSelection::UseOwnCredential) {
//!     pass.harvest_reserved_numbers(&notary, true, SignerSelection::UseOwnCredential)?;
//!     return Err(e);
//! }
//! ```

pub mod agent;
pub mod dispatch;
pub mod ledger;
pub mod party;
pub mod pass;
pub mod traits;

#[cfg(test)]
mod testing;

pub use agent::Agent;
pub use dispatch::{
    verify_receipt, DeliveryOutcome, Dispatcher, FinalizationReport, FinalizationState,
    ReceiptExtras, SequentialIssuer,
};
pub use ledger::SignerSelection;
pub use party::{Party, PartyAccount, PartyHandle, PartyRegistry};
pub use pass::{Pass, TemporaryReferences};
