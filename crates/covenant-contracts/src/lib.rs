//! # covenant-contracts
//!
//! Shared types for the COVENANT runtime: identities, agent representations,
//! transaction numbers, contract documents, receipts and the error type.
//!
//! All crates in the workspace import from here. The only logic in this crate
//! is the pure identity projections on `Representation`.

pub mod account;
pub mod contract;
pub mod error;
pub mod identity;
pub mod number;
pub mod receipt;
pub mod representation;
