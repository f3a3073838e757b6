//! # covenant-nym
//!
//! Reference credential holder for the COVENANT runtime.
//!
//! `LocalNym` keeps its secret, number sets and nymbox hashes in process and
//! saves signed number snapshots either in memory or as JSON files.
//! `NymDirectory` is the matching `CredentialLoader`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use covenant_nym::{LocalNym, NymDirectory};
//!
//! let alice = Arc::new(LocalNym::new("N1", "alice-secret").with_storage_dir(dir));
//! alice.grant_numbers(&notary, [1001, 1002]);
//!
//! let directory = NymDirectory::new();
//! directory.register(alice);
//! ```

pub mod directory;
pub mod numbers;
pub mod nym;
pub mod snapshot;

pub use directory::NymDirectory;
pub use numbers::NumberStore;
pub use nym::LocalNym;
pub use snapshot::NumberSnapshot;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{fs, sync::Arc};

    use covenant_contracts::{
        error::CovenantError,
        identity::{Identifier, NotaryId},
        number::TransactionNumber,
    };
    use covenant_core::{
        traits::{CredentialHolder, CredentialLoader, NumberSet},
        Agent, SignerSelection,
    };

    use super::{LocalNym, NymDirectory};

    fn srv1() -> NotaryId {
        NotaryId::new("Srv1")
    }

    // ── Signing ───────────────────────────────────────────────────────────────

    #[test]
    fn signature_verifies_only_for_same_payload_and_key() {
        let alice = LocalNym::new("N1", "alice-secret");
        let sig = alice.sign(b"contract").unwrap();

        assert!(alice.verify(b"contract", &sig));
        assert!(!alice.verify(b"contract!", &sig));
        assert!(!LocalNym::new("N1", "other-secret").verify(b"contract", &sig));
    }

    #[test]
    fn nym_without_secret_cannot_sign() {
        let public_only = LocalNym::new("N1", "");
        assert!(matches!(
            public_only.sign(b"contract"),
            Err(CovenantError::SigningFailed { .. })
        ));
    }

    // ── Number sets ───────────────────────────────────────────────────────────

    #[test]
    fn take_lowest_hands_out_each_number_once() {
        let alice = LocalNym::new("N1", "alice-secret");
        assert_eq!(alice.grant_numbers(&srv1(), [1003, 1001, 1002, 1001]), 3);

        let issued = alice.issued_numbers();
        assert_eq!(issued.take_lowest(&srv1()), Some(TransactionNumber(1001)));
        assert_eq!(issued.take_lowest(&srv1()), Some(TransactionNumber(1002)));
        assert_eq!(issued.count(&srv1()), 1);
        assert_eq!(issued.take_lowest(&NotaryId::new("Srv2")), None);
    }

    // ── Snapshots ─────────────────────────────────────────────────────────────

    #[test]
    fn in_memory_save_and_restore() {
        let alice = LocalNym::new("N1", "alice-secret");
        alice.grant_numbers(&srv1(), [1, 2, 3]);
        alice.save_numbers(&srv1(), &alice).unwrap();

        alice.issued_numbers().remove(&srv1(), TransactionNumber(2));
        assert_eq!(alice.issued_snapshot(&srv1()), vec![1, 3]);

        assert!(alice.restore_numbers(&srv1(), &alice).unwrap());
        assert_eq!(alice.issued_snapshot(&srv1()), vec![1, 2, 3]);
    }

    #[test]
    fn restore_checks_the_recorded_signer() {
        let alice = LocalNym::new("N1", "alice-secret");
        let notary = LocalNym::new("NOTARY", "notary-secret");
        alice.grant_numbers(&srv1(), [7]);
        alice.save_numbers(&srv1(), &notary).unwrap();

        let snapshot = alice.saved_snapshot(&srv1()).unwrap().unwrap();
        assert_eq!(snapshot.signer_id, Identifier::new("NOTARY"));

        assert!(matches!(
            alice.restore_numbers(&srv1(), &alice),
            Err(CovenantError::SignatureInvalid { .. })
        ));
        assert!(alice.restore_numbers(&srv1(), &notary).unwrap());
    }

    #[test]
    fn nothing_to_restore_before_first_save() {
        let alice = LocalNym::new("N1", "alice-secret");
        assert!(!alice.restore_numbers(&srv1(), &alice).unwrap());
    }

    #[test]
    fn file_snapshot_round_trip_and_tamper_detection() {
        let dir = tempfile::tempdir().unwrap();
        let alice = LocalNym::new("N1", "alice-secret").with_storage_dir(dir.path());
        alice.grant_numbers(&srv1(), [10, 11]);
        alice.set_nymbox_hash(&srv1(), "abc123".to_string());
        alice.save_numbers(&srv1(), &alice).unwrap();

        let path = alice.snapshot_file(&srv1()).unwrap();
        assert_eq!(path, dir.path().join("4e31").join("53727631.json"));
        assert!(path.exists());

        let reopened = LocalNym::new("N1", "alice-secret").with_storage_dir(dir.path());
        assert!(reopened.restore_numbers(&srv1(), &alice).unwrap());
        assert_eq!(reopened.issued_snapshot(&srv1()), vec![10, 11]);
        assert_eq!(reopened.nymbox_hash(&srv1()).as_deref(), Some("abc123"));

        let mut raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        raw["issued"] = serde_json::json!([10, 11, 12]);
        fs::write(&path, serde_json::to_vec(&raw).unwrap()).unwrap();
        assert!(matches!(
            reopened.restore_numbers(&srv1(), &alice),
            Err(CovenantError::SignatureInvalid { .. })
        ));
    }

    #[test]
    fn unwritable_storage_reports_persist_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, b"not a directory").unwrap();

        let alice = LocalNym::new("N1", "alice-secret").with_storage_dir(&blocker);
        assert!(matches!(
            alice.save_numbers(&srv1(), &alice),
            Err(CovenantError::PersistFailed { .. })
        ));
    }

    #[test]
    fn snapshot_paths_stay_inside_storage_dir() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("numbers");
        let nym = LocalNym::new("../../escape", "secret").with_storage_dir(&storage);
        let notary = NotaryId::new("../Srv1");
        nym.grant_numbers(&notary, [1]);
        nym.save_numbers(&notary, &nym).unwrap();

        let path = nym.snapshot_file(&notary).unwrap();
        assert!(path.starts_with(&storage));
        assert_eq!(path.parent().unwrap().parent().unwrap(), storage.as_path());
        assert!(path.exists());
        assert!(!dir.path().join("escape").exists());
    }

    #[test]
    fn reserved_numbers_survive_a_restore() {
        let nym = Arc::new(LocalNym::new("N1", "alice-secret"));
        nym.grant_numbers(&srv1(), [1001, 1002]);
        let holder: Arc<dyn CredentialHolder> = nym.clone();
        let agent = Agent::for_nym("alice", &holder);
        agent
            .reserve_opening_trans_num(&srv1(), true, SignerSelection::UseOwnCredential)
            .unwrap();

        // Disturb the in-memory sets, then reload the last save.
        nym.grant_numbers(&srv1(), [1001]);
        assert!(nym.restore_numbers(&srv1(), nym.as_ref()).unwrap());
        assert_eq!(nym.in_use_snapshot(&srv1()), vec![1001]);
        assert_eq!(nym.issued_snapshot(&srv1()), vec![1002]);
    }

    // ── Directory ─────────────────────────────────────────────────────────────

    #[test]
    fn directory_loads_registered_nyms_only() {
        let directory = NymDirectory::new();
        let alice = Arc::new(LocalNym::new("N1", "alice-secret"));
        directory.register(Arc::clone(&alice));

        let loaded = directory.load(&Identifier::new("N1")).unwrap();
        assert_eq!(loaded.id(), &Identifier::new("N1"));
        assert_eq!(directory.len(), 1);

        assert!(matches!(
            directory.load(&Identifier::new("N404")),
            Err(CovenantError::IdentityUnavailable { .. })
        ));
    }

    // ── With an agent ─────────────────────────────────────────────────────────

    #[test]
    fn agent_removal_persists_through_local_nym() {
        let dir = tempfile::tempdir().unwrap();
        let nym = Arc::new(LocalNym::new("N1", "alice-secret").with_storage_dir(dir.path()));
        nym.grant_numbers(&srv1(), [1001, 1002]);
        let holder: Arc<dyn CredentialHolder> = nym.clone();
        let agent = Agent::for_nym("alice", &holder);

        let opening = agent
            .reserve_opening_trans_num(&srv1(), true, SignerSelection::UseOwnCredential)
            .unwrap();
        assert_eq!(nym.in_use_snapshot(&srv1()), vec![1001]);
        let saved = nym.saved_snapshot(&srv1()).unwrap().unwrap();
        assert_eq!(saved.in_use, vec![1001], "the reservation is durable");
        assert_eq!(saved.issued, vec![1002]);

        agent
            .remove_transaction_number(opening, &srv1(), holder.as_ref(), true)
            .unwrap();
        let saved = nym.saved_snapshot(&srv1()).unwrap().unwrap();
        assert!(saved.in_use.is_empty());
        assert_eq!(saved.issued, vec![1002]);

        agent
            .remove_issued_number(TransactionNumber(1002), &srv1(), true, SignerSelection::UseOwnCredential)
            .unwrap();
        assert!(nym.saved_snapshot(&srv1()).unwrap().unwrap().issued.is_empty());
    }
}
