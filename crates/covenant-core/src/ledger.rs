//! Transaction-number ledger adapter.
//!
//! Routes number operations for an agent to the number sets of its bound
//! credential holder. The adapter keeps no state of its own; it validates
//! preconditions and moves numbers between the two sets:
//!
//!   issued set ──reserve──▶ in-use set ──remove──▶ (consumed)
//!        ▲                       │
//!        └───────harvest─────────┘
//!
//! Every operation requires a bound credential whose identity matches the
//! agent. Voting groups hold no numbers, so every operation fails for them.
//!
//! Callers must serialize passes per signer. Each single-set call is atomic,
//! but a reserve or harvest touches two sets.

use std::sync::Arc;

use tracing::{debug, info, warn};

use covenant_contracts::{
    error::{CovenantError, CovenantResult},
    identity::NotaryId,
    number::TransactionNumber,
};

use crate::{
    agent::Agent,
    party::PartyAccount,
    traits::CredentialHolder,
};

/// Who signs a number set when it is persisted.
///
/// Agents normally sign their own sets. A coordinating process (the notary,
/// processing cron items) acts on the agent's behalf and signs with its own
/// credential instead.
#[derive(Clone, Copy)]
pub enum SignerSelection<'a> {
    UseOwnCredential,
    UseProvided(&'a dyn CredentialHolder),
}

impl Agent {
    /// Persist `holder`'s sets for `notary` with the selected signer.
    fn persist_numbers(
        &self,
        holder: &Arc<dyn CredentialHolder>,
        notary: &NotaryId,
        signer: SignerSelection<'_>,
    ) -> CovenantResult<()> {
        let signer: &dyn CredentialHolder = match signer {
            SignerSelection::UseOwnCredential => holder.as_ref(),
            SignerSelection::UseProvided(provided) => provided,
        };
        holder.save_numbers(notary, signer).inspect_err(|e| {
            warn!(
                agent = %self.name(),
                notary = %notary,
                signer = %signer.id(),
                error = %e,
                "number set changed in memory but was not saved"
            );
        })
    }

    /// Whether `number` is still issued to this agent and unreserved.
    pub fn verify_issued_number(&self, number: TransactionNumber, notary: &NotaryId) -> CovenantResult<bool> {
        let holder = self.own_credential("verify issued number")?;
        Ok(holder.issued_numbers().contains(notary, number))
    }

    /// Whether `number` is reserved and not yet consumed.
    pub fn verify_transaction_number(
        &self,
        number: TransactionNumber,
        notary: &NotaryId,
    ) -> CovenantResult<bool> {
        let holder = self.own_credential("verify transaction number")?;
        Ok(holder.in_use_numbers().contains(notary, number))
    }

    /// Remove `number` from the issued set.
    pub fn remove_issued_number(
        &self,
        number: TransactionNumber,
        notary: &NotaryId,
        persist: bool,
        signer: SignerSelection<'_>,
    ) -> CovenantResult<()> {
        let holder = self.own_credential("remove issued number")?;
        if !holder.issued_numbers().remove(notary, number) {
            return Err(CovenantError::NumberNotFound {
                number: number.value(),
                notary: notary.to_string(),
            });
        }
        debug!(agent = %self.name(), notary = %notary, number = %number, "issued number removed");
        if persist {
            self.persist_numbers(&holder, notary, signer)?;
        }
        Ok(())
    }

    /// Consume a reserved number. Succeeds at most once per number.
    pub fn remove_transaction_number(
        &self,
        number: TransactionNumber,
        notary: &NotaryId,
        signer: &dyn CredentialHolder,
        persist: bool,
    ) -> CovenantResult<()> {
        let holder = self.own_credential("remove transaction number")?;
        if !holder.in_use_numbers().remove(notary, number) {
            return Err(CovenantError::NumberNotFound {
                number: number.value(),
                notary: notary.to_string(),
            });
        }
        info!(agent = %self.name(), notary = %notary, number = %number, "transaction number consumed");
        if persist {
            self.persist_numbers(&holder, notary, SignerSelection::UseProvided(signer))?;
        }
        Ok(())
    }

    /// Return a reserved number to the issued set.
    ///
    /// Returns `Ok(false)` without touching either set when `number` is not
    /// in use, so cleanup can be retried safely.
    pub fn harvest_transaction_number(
        &self,
        number: TransactionNumber,
        notary: &NotaryId,
        persist: bool,
        signer: SignerSelection<'_>,
    ) -> CovenantResult<bool> {
        let holder = self.own_credential("harvest transaction number")?;
        if !holder.in_use_numbers().remove(notary, number) {
            debug!(
                agent = %self.name(),
                notary = %notary,
                number = %number,
                "number not in use, nothing to harvest"
            );
            return Ok(false);
        }
        holder.issued_numbers().add(notary, number);
        info!(agent = %self.name(), notary = %notary, number = %number, "transaction number harvested");
        if persist {
            self.persist_numbers(&holder, notary, signer)?;
        }
        Ok(true)
    }

    /// Save the bound holder's number sets for `notary`.
    pub(crate) fn save_number_sets(&self, notary: &NotaryId, signer: SignerSelection<'_>) -> CovenantResult<()> {
        let holder = self.own_credential("save numbers")?;
        self.persist_numbers(&holder, notary, signer)
    }

    fn take_opening(&self, holder: &Arc<dyn CredentialHolder>, notary: &NotaryId) -> CovenantResult<TransactionNumber> {
        let number = holder
            .issued_numbers()
            .take_lowest(notary)
            .ok_or_else(|| self.no_numbers(notary))?;
        holder.in_use_numbers().add(notary, number);
        info!(agent = %self.name(), notary = %notary, number = %number, "opening number reserved");
        Ok(number)
    }

    /// Reserve this agent's lowest issued number as a contract's opening number.
    ///
    /// With `persist`, the move into the in-use set is saved before
    /// returning. A failed save leaves the number reserved in memory.
    pub fn reserve_opening_trans_num(
        &self,
        notary: &NotaryId,
        persist: bool,
        signer: SignerSelection<'_>,
    ) -> CovenantResult<TransactionNumber> {
        let holder = self.own_credential("reserve opening number")?;
        let number = self.take_opening(&holder, notary)?;
        if persist {
            self.persist_numbers(&holder, notary, signer)?;
        }
        Ok(number)
    }

    /// Reserve a closing number for `account`, distinct from `opening`.
    ///
    /// Only the agent named on the account may reserve for it. An account
    /// whose closing number is still in use keeps it; one whose number has
    /// left the in-use set gets a fresh one. The account is earmarked before
    /// the save, so a failed save still leaves it pointing at the reserved
    /// number.
    pub fn reserve_closing_trans_num(
        &self,
        notary: &NotaryId,
        account: &mut PartyAccount,
        opening: Option<TransactionNumber>,
        persist: bool,
        signer: SignerSelection<'_>,
    ) -> CovenantResult<TransactionNumber> {
        if account.agent_name() != self.name() {
            return Err(CovenantError::NotAuthorized {
                agent: self.name().to_string(),
                reason: format!(
                    "account '{}' is managed by agent '{}'",
                    account.name(),
                    account.agent_name()
                ),
            });
        }

        let holder = self.own_credential("reserve closing number")?;
        if let Some(existing) = account.closing_number() {
            if holder.in_use_numbers().contains(notary, existing) {
                debug!(
                    agent = %self.name(),
                    account = %account.name(),
                    number = %existing,
                    "account already has a closing number"
                );
                return Ok(existing);
            }
            warn!(
                agent = %self.name(),
                account = %account.name(),
                number = %existing,
                "closing number is no longer in use, reserving a new one"
            );
            account.clear_closing_number();
        }

        let issued = holder.issued_numbers();
        let mut candidate = issued.take_lowest(notary);
        if candidate.is_some() && candidate == opening {
            let skipped = candidate;
            candidate = issued.take_lowest(notary);
            if let Some(skipped) = skipped {
                issued.add(notary, skipped);
            }
        }
        let number = candidate.ok_or_else(|| self.no_numbers(notary))?;

        holder.in_use_numbers().add(notary, number);
        account.set_closing_number(number);
        info!(
            agent = %self.name(),
            account = %account.name(),
            notary = %notary,
            number = %number,
            "closing number reserved"
        );
        if persist {
            self.persist_numbers(&holder, notary, signer)?;
        }
        Ok(number)
    }

    fn no_numbers(&self, notary: &NotaryId) -> CovenantError {
        warn!(agent = %self.name(), notary = %notary, "no transaction numbers available");
        CovenantError::NoNumbersAvailable {
            agent: self.name().to_string(),
            notary: notary.to_string(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
