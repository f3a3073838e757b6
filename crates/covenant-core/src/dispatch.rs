//! Receipt and notice dispatch.
//!
//! When a contract finalizes, or cron processing produces a result, the
//! notary files signed receipts:
//!
//! - a final receipt into each party account's inbox
//! - a final receipt into each party member's nymbox
//! - success or rejection notices into nymboxes
//!
//! Inbox and nymbox deliveries are independent. Each reports its own
//! outcome and a failure in one never rolls back the other.
//!
//! Target credentials are looked up in the caller's `LoadedIdentities`
//! first and only loaded through the `CredentialLoader` when absent. A
//! resolved recipient gets its nymbox head hash updated after filing.

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use covenant_contracts::{
    contract::ContractDocument,
    error::{CovenantError, CovenantResult},
    identity::{AccountId, Identifier, NotaryId},
    number::TransactionNumber,
    receipt::{MailboxTarget, Receipt, ReceiptKind},
    representation::Representation,
};

use crate::{
    agent::Agent,
    party::Party,
    traits::{CredentialHolder, CredentialLoader, GroupDirectory, LoadedIdentities, Mailbox, NumberIssuer},
};

/// Optional free-form payloads carried on a receipt.
#[derive(Debug, Clone, Default)]
pub struct ReceiptExtras {
    pub note: Option<String>,
    pub attachment: Option<String>,
}

impl ReceiptExtras {
    pub fn note(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            attachment: None,
        }
    }
}

/// Progress of one contract finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizationState {
    Drafted,
    Delivering,
    Done,
}

/// Outcome of one delivery attempt.
#[derive(Debug)]
pub struct DeliveryOutcome {
    /// Mailbox key, or a description of the target when none could be formed.
    pub target: String,
    pub result: CovenantResult<Receipt>,
}

impl DeliveryOutcome {
    pub fn delivered(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-target results of `Dispatcher::finalize_party`.
#[derive(Debug)]
pub struct FinalizationReport {
    pub state: FinalizationState,
    pub inbox: Vec<DeliveryOutcome>,
    pub nymbox: Vec<DeliveryOutcome>,
}

impl FinalizationReport {
    fn drafted() -> Self {
        Self {
            state: FinalizationState::Drafted,
            inbox: Vec::new(),
            nymbox: Vec::new(),
        }
    }

    pub fn delivered_to_inbox(&self) -> bool {
        self.inbox.iter().any(DeliveryOutcome::delivered)
    }

    pub fn delivered_to_nymbox(&self) -> bool {
        self.nymbox.iter().any(DeliveryOutcome::delivered)
    }

    pub fn failures(&self) -> impl Iterator<Item = &DeliveryOutcome> {
        self.inbox.iter().chain(self.nymbox.iter()).filter(|o| !o.delivered())
    }

    pub fn all_delivered(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Files receipts and notices on behalf of a notary.
pub struct Dispatcher {
    notary_signer: Arc<dyn CredentialHolder>,
    inboxes: Arc<dyn Mailbox>,
    nymboxes: Arc<dyn Mailbox>,
    loader: Option<Arc<dyn CredentialLoader>>,
    groups: Option<Arc<dyn GroupDirectory>>,
}

impl Dispatcher {
    /// `notary_signer` signs the final receipts the notary files itself.
    pub fn new(
        notary_signer: Arc<dyn CredentialHolder>,
        inboxes: Arc<dyn Mailbox>,
        nymboxes: Arc<dyn Mailbox>,
    ) -> Self {
        Self {
            notary_signer,
            inboxes,
            nymboxes,
            loader: None,
            groups: None,
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn CredentialLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn with_group_directory(mut self, groups: Arc<dyn GroupDirectory>) -> Self {
        self.groups = Some(groups);
        self
    }

    /// File a final receipt into the nymbox of `acting_identity`, or of the
    /// agent's own Nym when none is given.
    ///
    /// A voting group has no nymbox of its own; callers pass each member as
    /// `acting_identity` instead.
    #[allow(clippy::too_many_arguments)]
    pub fn drop_final_receipt_to_nymbox(
        &self,
        agent: &Agent,
        contract: &ContractDocument,
        new_number: TransactionNumber,
        orig_item: &str,
        extras: &ReceiptExtras,
        acting_identity: Option<&Identifier>,
        loaded: Option<&LoadedIdentities>,
    ) -> CovenantResult<Receipt> {
        let identity = acting_identity
            .or_else(|| agent.nym_id())
            .cloned()
            .ok_or_else(|| agent.not_applicable("drop final receipt to nymbox"))?;

        let receipt = self.draft(
            ReceiptKind::FinalReceipt,
            &contract.notary_id,
            MailboxTarget::Nymbox { identity: identity.clone() },
            new_number,
            contract.transaction_number,
            orig_item,
            None,
            extras,
        );
        let receipt = sign_receipt(receipt, self.notary_signer.as_ref())?;
        self.deliver_to_nymbox(receipt, &identity, loaded)
    }

    /// File a final receipt into `account_id`'s inbox, signed by
    /// `acting_signer`.
    ///
    /// `closing_number` is recorded on the receipt so the account owner can
    /// close it out later. It is not removed from any number set here.
    #[allow(clippy::too_many_arguments)]
    pub fn drop_final_receipt_to_inbox(
        &self,
        agent: &Agent,
        loaded: Option<&LoadedIdentities>,
        notary: &NotaryId,
        acting_signer: &dyn CredentialHolder,
        contract: &ContractDocument,
        account_id: &AccountId,
        new_number: TransactionNumber,
        closing_number: TransactionNumber,
        orig_item: &str,
        extras: &ReceiptExtras,
    ) -> CovenantResult<Receipt> {
        let nym_id = agent
            .nym_id()
            .ok_or_else(|| agent.not_applicable("drop final receipt to inbox"))?;

        if let Some(holder) = self.resolve(nym_id, loaded) {
            let outstanding = holder.in_use_numbers().contains(notary, closing_number)
                || holder.issued_numbers().contains(notary, closing_number);
            if !outstanding {
                warn!(
                    agent = %agent.name(),
                    account_id = %account_id,
                    closing_number = %closing_number,
                    "closing number is no longer held by the agent"
                );
            }
        }

        let receipt = self.draft(
            ReceiptKind::FinalReceipt,
            notary,
            MailboxTarget::Inbox { account_id: account_id.clone() },
            new_number,
            contract.transaction_number,
            orig_item,
            Some(closing_number),
            extras,
        );
        let receipt = sign_receipt(receipt, acting_signer)?;
        let head = self.inboxes.file(&receipt)?;
        info!(
            target_box = %receipt.target,
            number = %new_number,
            closing_number = %closing_number,
            head = %head,
            "final receipt filed to inbox"
        );
        Ok(receipt)
    }

    /// File a success or rejection notice into the nymbox of
    /// `actual_identity`, or of the agent's own Nym.
    #[allow(clippy::too_many_arguments)]
    pub fn drop_server_notice_to_nymbox(
        &self,
        agent: &Agent,
        is_success: bool,
        acting_signer: &dyn CredentialHolder,
        notary: &NotaryId,
        new_number: TransactionNumber,
        in_reference_to: TransactionNumber,
        reference: &str,
        extras: &ReceiptExtras,
        actual_identity: Option<&Identifier>,
        loaded: Option<&LoadedIdentities>,
    ) -> CovenantResult<Receipt> {
        let identity = actual_identity
            .or_else(|| agent.nym_id())
            .cloned()
            .ok_or_else(|| agent.not_applicable("drop notice to nymbox"))?;

        let receipt = self.draft(
            ReceiptKind::notice(is_success),
            notary,
            MailboxTarget::Nymbox { identity: identity.clone() },
            new_number,
            in_reference_to,
            reference,
            None,
            extras,
        );
        let receipt = sign_receipt(receipt, acting_signer)?;
        self.deliver_to_nymbox(receipt, &identity, loaded)
    }

    /// Deliver a contract's final receipts to every inbox and nymbox of
    /// `party`.
    ///
    /// Each account with a reserved closing number gets an inbox receipt.
    /// Each individual agent gets a nymbox receipt; a voting group's receipt
    /// goes to every member listed by the group directory. Every target gets
    /// a fresh number from `issuer`.
    pub fn finalize_party(
        &self,
        party: &Party,
        contract: &ContractDocument,
        orig_item: &str,
        extras: &ReceiptExtras,
        issuer: &dyn NumberIssuer,
        loaded: Option<&LoadedIdentities>,
    ) -> FinalizationReport {
        let notary = &contract.notary_id;
        let mut report = FinalizationReport::drafted();
        report.state = FinalizationState::Delivering;

        for account in party.accounts() {
            let target = MailboxTarget::Inbox {
                account_id: account.account_id().clone(),
            }
            .key();
            let result = match (party.agent(account.agent_name()), account.closing_number()) {
                (Some(agent), Some(closing)) => self.drop_final_receipt_to_inbox(
                    agent,
                    loaded,
                    notary,
                    self.notary_signer.as_ref(),
                    contract,
                    account.account_id(),
                    issuer.issue_number(notary),
                    closing,
                    orig_item,
                    extras,
                ),
                (None, _) => Err(CovenantError::UnknownAgent {
                    party: party.name().to_string(),
                    agent: account.agent_name().to_string(),
                }),
                (Some(agent), None) => Err(CovenantError::NotAuthorized {
                    agent: agent.name().to_string(),
                    reason: format!("account '{}' has no closing number reserved", account.name()),
                }),
            };
            report.inbox.push(DeliveryOutcome { target, result });
        }

        for agent in party.agents() {
            match agent.representation() {
                Representation::EntityVotingGroup { group_name, entity_id } => {
                    let members = self
                        .groups
                        .as_ref()
                        .map(|g| g.members(entity_id, group_name))
                        .unwrap_or_default();
                    if members.is_empty() {
                        report.nymbox.push(DeliveryOutcome {
                            target: format!("group/{}/{}", entity_id, group_name),
                            result: Err(agent.not_applicable("drop final receipt to nymbox")),
                        });
                    }
                    for member in &members {
                        report.nymbox.push(DeliveryOutcome {
                            target: MailboxTarget::Nymbox { identity: member.clone() }.key(),
                            result: self.drop_final_receipt_to_nymbox(
                                agent,
                                contract,
                                issuer.issue_number(notary),
                                orig_item,
                                extras,
                                Some(member),
                                loaded,
                            ),
                        });
                    }
                }
                _ => {
                    let target = agent
                        .nym_id()
                        .map(|id| MailboxTarget::Nymbox { identity: id.clone() }.key())
                        .unwrap_or_default();
                    report.nymbox.push(DeliveryOutcome {
                        target,
                        result: self.drop_final_receipt_to_nymbox(
                            agent,
                            contract,
                            issuer.issue_number(notary),
                            orig_item,
                            extras,
                            None,
                            loaded,
                        ),
                    });
                }
            }
        }

        report.state = FinalizationState::Done;
        info!(
            party = %party.name(),
            contract_id = %contract.contract_id,
            inbox = report.inbox.len(),
            nymbox = report.nymbox.len(),
            failed = report.failures().count(),
            "finalization delivered"
        );
        report
    }

    #[allow(clippy::too_many_arguments)]
    fn draft(
        &self,
        kind: ReceiptKind,
        notary: &NotaryId,
        target: MailboxTarget,
        new_number: TransactionNumber,
        in_reference_to: TransactionNumber,
        reference: &str,
        closing_number: Option<TransactionNumber>,
        extras: &ReceiptExtras,
    ) -> Receipt {
        Receipt {
            receipt_id: Uuid::new_v4(),
            kind,
            notary_id: notary.clone(),
            target,
            transaction_number: new_number,
            in_reference_to,
            reference: reference.to_string(),
            closing_number,
            note: extras.note.clone(),
            attachment: extras.attachment.clone(),
            signer_id: Identifier::new(""),
            signature: String::new(),
            created_at: Utc::now(),
        }
    }

    fn deliver_to_nymbox(
        &self,
        receipt: Receipt,
        identity: &Identifier,
        loaded: Option<&LoadedIdentities>,
    ) -> CovenantResult<Receipt> {
        let head = self.nymboxes.file(&receipt)?;
        match self.resolve(identity, loaded) {
            Some(recipient) => recipient.set_nymbox_hash(&receipt.notary_id, head.clone()),
            None => debug!(identity = %identity, "recipient not loaded, nymbox hash not updated"),
        }
        info!(
            target_box = %receipt.target,
            kind = %receipt.kind,
            number = %receipt.transaction_number,
            head = %head,
            "receipt filed to nymbox"
        );
        Ok(receipt)
    }

    /// Find a live holder for `identity`: loaded identities first, then the
    /// loader.
    fn resolve(
        &self,
        identity: &Identifier,
        loaded: Option<&LoadedIdentities>,
    ) -> Option<Arc<dyn CredentialHolder>> {
        if let Some(holder) = loaded.and_then(|map| map.get(identity.as_str())) {
            return Some(Arc::clone(holder));
        }
        let loader = self.loader.as_ref()?;
        match loader.load(identity) {
            Ok(holder) => Some(holder),
            Err(e) => {
                debug!(identity = %identity, error = %e, "identity could not be loaded");
                None
            }
        }
    }
}

fn sign_receipt(mut receipt: Receipt, signer: &dyn CredentialHolder) -> CovenantResult<Receipt> {
    receipt.signer_id = signer.id().clone();
    let signature = signer.sign(&receipt.signing_bytes())?;
    receipt.signature = hex::encode(signature);
    Ok(receipt)
}

/// Check `receipt`'s signature against the holder that claims to have made it.
pub fn verify_receipt(receipt: &Receipt, signer: &dyn CredentialHolder) -> bool {
    if &receipt.signer_id != signer.id() {
        return false;
    }
    hex::decode(&receipt.signature)
        .map(|sig| signer.verify(&receipt.signing_bytes(), &sig))
        .unwrap_or(false)
}

/// Monotonic in-memory `NumberIssuer` for a single notary process.
#[derive(Debug)]
pub struct SequentialIssuer {
    next: AtomicI64,
}

impl SequentialIssuer {
    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }
}

impl NumberIssuer for SequentialIssuer {
    fn issue_number(&self, _notary: &NotaryId) -> TransactionNumber {
        TransactionNumber(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use covenant_contracts::{
        contract::ContractDocument,
        error::CovenantError,
        identity::{AccountId, Identifier, NotaryId},
        number::TransactionNumber,
        receipt::{MailboxTarget, ReceiptKind},
        representation::Representation,
    };

    use crate::{
        agent::Agent,
        party::{Party, PartyAccount},
        testing::{group_agent, MockGroups, MockLoader, MockMailbox, MockNym},
        traits::{CredentialHolder, LoadedIdentities},
    };

    use super::{verify_receipt, Dispatcher, FinalizationState, ReceiptExtras, SequentialIssuer};

    fn srv1() -> NotaryId {
        NotaryId::new("Srv1")
    }

    fn contract() -> ContractDocument {
        ContractDocument::new(
            "escrow-9",
            srv1(),
            TransactionNumber(900),
            serde_json::json!({ "clause": "settle" }),
        )
    }

    struct Fixture {
        notary: Arc<MockNym>,
        inboxes: Arc<MockMailbox>,
        nymboxes: Arc<MockMailbox>,
        dispatcher: Dispatcher,
    }

    fn fixture() -> Fixture {
        let notary = Arc::new(MockNym::new("NOTARY"));
        let inboxes = Arc::new(MockMailbox::default());
        let nymboxes = Arc::new(MockMailbox::default());
        let dispatcher = Dispatcher::new(notary.clone(), inboxes.clone(), nymboxes.clone());
        Fixture {
            notary,
            inboxes,
            nymboxes,
            dispatcher,
        }
    }

    fn alice() -> Agent {
        Agent::new(
            "alice",
            Representation::SelfIndividual { nym_id: Identifier::new("N1") },
        )
    }

    #[test]
    fn final_receipt_to_own_nymbox() {
        let f = fixture();
        let receipt = f
            .dispatcher
            .drop_final_receipt_to_nymbox(
                &alice(),
                &contract(),
                TransactionNumber(5000),
                "<escrow-9/>",
                &ReceiptExtras::note("settled"),
                None,
                None,
            )
            .unwrap();

        assert_eq!(receipt.kind, ReceiptKind::FinalReceipt);
        assert_eq!(receipt.in_reference_to, TransactionNumber(900));
        assert_eq!(receipt.note.as_deref(), Some("settled"));
        assert_eq!(
            receipt.target,
            MailboxTarget::Nymbox { identity: Identifier::new("N1") }
        );
        assert!(verify_receipt(&receipt, f.notary.as_ref()));
        assert_eq!(f.nymboxes.filed().len(), 1);
        assert!(f.inboxes.filed().is_empty());
    }

    #[test]
    fn group_needs_an_acting_identity() {
        let f = fixture();
        let board = group_agent("board", "ClassA", "E1");

        let result = f.dispatcher.drop_final_receipt_to_nymbox(
            &board,
            &contract(),
            TransactionNumber(5000),
            "<escrow-9/>",
            &ReceiptExtras::default(),
            None,
            None,
        );
        assert!(matches!(result, Err(CovenantError::NotApplicable { .. })));

        let member = Identifier::new("N7");
        let receipt = f
            .dispatcher
            .drop_final_receipt_to_nymbox(
                &board,
                &contract(),
                TransactionNumber(5001),
                "<escrow-9/>",
                &ReceiptExtras::default(),
                Some(&member),
                None,
            )
            .unwrap();
        assert_eq!(receipt.target, MailboxTarget::Nymbox { identity: member });
    }

    #[test]
    fn inbox_receipt_signed_by_acting_signer() {
        let f = fixture();
        let cron = MockNym::new("CRON");
        let receipt = f
            .dispatcher
            .drop_final_receipt_to_inbox(
                &alice(),
                None,
                &srv1(),
                &cron,
                &contract(),
                &AccountId::new("acct-1"),
                TransactionNumber(5002),
                TransactionNumber(1002),
                "<escrow-9/>",
                &ReceiptExtras::default(),
            )
            .unwrap();

        assert_eq!(receipt.signer_id, Identifier::new("CRON"));
        assert_eq!(receipt.closing_number, Some(TransactionNumber(1002)));
        assert!(verify_receipt(&receipt, &cron));
        assert!(!verify_receipt(&receipt, f.notary.as_ref()));
        assert_eq!(f.inboxes.filed().len(), 1);
    }

    #[test]
    fn notice_kind_follows_success_flag() {
        let f = fixture();
        let notary = f.notary.clone();
        for (success, kind) in [(true, ReceiptKind::NoticeSuccess), (false, ReceiptKind::NoticeRejection)] {
            let receipt = f
                .dispatcher
                .drop_server_notice_to_nymbox(
                    &alice(),
                    success,
                    notary.as_ref(),
                    &srv1(),
                    TransactionNumber(6000),
                    TransactionNumber(900),
                    "activate escrow-9",
                    &ReceiptExtras::default(),
                    None,
                    None,
                )
                .unwrap();
            assert_eq!(receipt.kind, kind);
        }
        assert_eq!(f.nymboxes.filed().len(), 2);
    }

    #[test]
    fn loaded_identities_checked_before_loader() {
        let notary = Arc::new(MockNym::new("NOTARY"));
        let nymboxes = Arc::new(MockMailbox::default());
        let loader = Arc::new(MockLoader::with(&["N1"]));
        let dispatcher = Dispatcher::new(notary, Arc::new(MockMailbox::default()), nymboxes)
            .with_loader(loader.clone());

        let live = Arc::new(MockNym::new("N1"));
        let holder: Arc<dyn CredentialHolder> = live.clone();
        let mut loaded = LoadedIdentities::new();
        loaded.insert("N1".to_string(), holder);

        dispatcher
            .drop_final_receipt_to_nymbox(
                &alice(),
                &contract(),
                TransactionNumber(1),
                "<escrow-9/>",
                &ReceiptExtras::default(),
                None,
                Some(&loaded),
            )
            .unwrap();

        assert_eq!(loader.load_count(), 0);
        assert!(live.nymbox_hash(&srv1()).is_some(), "recipient nymbox hash updated");

        dispatcher
            .drop_final_receipt_to_nymbox(
                &alice(),
                &contract(),
                TransactionNumber(2),
                "<escrow-9/>",
                &ReceiptExtras::default(),
                None,
                None,
            )
            .unwrap();
        assert_eq!(loader.load_count(), 1);
    }

    #[test]
    fn inbox_and_nymbox_fail_independently() {
        let f = fixture();
        f.inboxes.fail(true);

        let inbox = f.dispatcher.drop_final_receipt_to_inbox(
            &alice(),
            None,
            &srv1(),
            f.notary.as_ref(),
            &contract(),
            &AccountId::new("acct-1"),
            TransactionNumber(10),
            TransactionNumber(1002),
            "<escrow-9/>",
            &ReceiptExtras::default(),
        );
        let nymbox = f.dispatcher.drop_final_receipt_to_nymbox(
            &alice(),
            &contract(),
            TransactionNumber(11),
            "<escrow-9/>",
            &ReceiptExtras::default(),
            None,
            None,
        );

        assert!(matches!(inbox, Err(CovenantError::DeliveryFailed { .. })));
        assert!(nymbox.is_ok());
    }

    #[test]
    fn finalize_party_reaches_every_target() {
        let notary = Arc::new(MockNym::new("NOTARY"));
        let inboxes = Arc::new(MockMailbox::default());
        let nymboxes = Arc::new(MockMailbox::default());
        let groups = Arc::new(MockGroups::with("E1", "ClassA", &["N7", "N8"]));
        let dispatcher = Dispatcher::new(notary, inboxes.clone(), nymboxes.clone())
            .with_group_directory(groups);

        let mut party = Party::new("corp", Identifier::new("E1"), "cfo");
        party.add_agent(Agent::new(
            "cfo",
            Representation::EntityRoleIndividual {
                nym_id: Identifier::new("N2"),
                role_id: Identifier::new("R7"),
                entity_id: Identifier::new("E1"),
            },
        ));
        party.add_agent(group_agent("board", "ClassA", "E1"));
        let mut account = PartyAccount::new("treasury", AccountId::new("acct-7"), "cfo");
        account.set_closing_number(TransactionNumber(1200));
        party.add_account(account);
        party.add_account(PartyAccount::new("reserve", AccountId::new("acct-8"), "cfo"));

        let issuer = SequentialIssuer::starting_at(7000);
        let report = dispatcher.finalize_party(
            &party,
            &contract(),
            "<escrow-9/>",
            &ReceiptExtras::default(),
            &issuer,
            None,
        );

        assert_eq!(report.state, FinalizationState::Done);
        assert!(report.delivered_to_inbox());
        assert!(report.delivered_to_nymbox());
        assert_eq!(report.inbox.len(), 2);
        assert_eq!(report.nymbox.len(), 3, "cfo plus two board members");
        assert_eq!(report.failures().count(), 1, "reserve account has no closing number");
        assert!(!report.all_delivered());
        assert_eq!(inboxes.filed().len(), 1);
        assert_eq!(nymboxes.filed().len(), 3);

        let numbers: Vec<i64> = nymboxes
            .filed()
            .iter()
            .map(|r| r.transaction_number.value())
            .collect();
        assert_eq!(numbers, vec![7001, 7002, 7003]);
    }
}
