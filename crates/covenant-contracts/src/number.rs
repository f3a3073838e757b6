//! Transaction numbers.
//!
//! A transaction number is a single-use token issued to a Nym by a notary.
//! Every contract-driven account operation consumes one, which is what makes
//! those operations non-replayable.
//!
//! Lifecycle, as seen from the signer's two number sets:
//!
//!   Issued (issued set) → Reserved (moved to in-use set) → Removed (consumed)
//!                                                       ↘ Harvested (back to issued set)

use std::fmt;

use serde::{Deserialize, Serialize};

/// A notary-scoped transaction number. The notary travels separately as a
/// `NotaryId`; the number alone is meaningless across notaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionNumber(pub i64);

impl TransactionNumber {
    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TransactionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TransactionNumber {
    fn from(n: i64) -> Self {
        Self(n)
    }
}
