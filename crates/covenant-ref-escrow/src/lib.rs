//! # covenant-ref-escrow
//!
//! Escrow reference runtime for the COVENANT agent-authority layer.
//!
//! Demonstrates three contract lifecycles using fictional data:
//!
//! 1. **Settlement**: a Nym buyer and a corporate seller reserve numbers,
//!    sign, and receive final receipts in every inbox and nymbox.
//! 2. **Failed-step rollback**: the seller cannot reserve, so the buyer's
//!    numbers are harvested back and rejection notices go out.
//! 3. **Board vote notice**: a voting group cannot sign or hold numbers; its
//!    notices fan out to each member's nymbox.
//!
//! Everything runs in process. No network or external notary is contacted.

pub mod mock_data;
pub mod scenarios;
