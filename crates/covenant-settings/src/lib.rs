//! # covenant-settings
//!
//! Section/key settings for the COVENANT runtime, stored as TOML.
//!
//! `Settings` offers check, set and check-or-set-default accessors for
//! strings, integers and booleans. `CovenantConfig` reads the runtime's own
//! options through it.

pub mod config;
pub mod store;

pub use config::CovenantConfig;
pub use store::Settings;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use covenant_contracts::{error::CovenantError, identity::NotaryId};

    use super::{CovenantConfig, Settings};

    // ── Check and set ─────────────────────────────────────────────────────────

    #[test]
    fn set_reports_new_changed_and_unchanged() {
        let mut s = Settings::in_memory();
        assert!(s.set_str("notary", "id", Some("Srv1")), "new key");
        assert!(!s.set_str("notary", "id", Some("Srv1")), "same value");
        assert!(s.set_str("notary", "id", Some("Srv2")), "changed value");
        assert_eq!(s.check_str("notary", "id").as_deref(), Some("Srv2"));
    }

    #[test]
    fn setting_none_or_empty_removes_key() {
        let mut s = Settings::in_memory();
        s.set_str("logging", "filter", Some("debug"));
        assert!(s.set_str("logging", "filter", None));
        assert!(s.check_str("logging", "filter").is_none());
        assert!(!s.set_str("logging", "filter", Some("")), "nothing left to remove");
    }

    #[test]
    fn typed_values_and_string_fallbacks() {
        let s = Settings::from_toml_str(
            r#"
            [numbers]
            persist = false
            legacy_persist = "true"
            broken_persist = "yes"
            batch = 50
            legacy_batch = "25"
            "#,
        )
        .unwrap();

        assert_eq!(s.check_bool("numbers", "persist"), Some(false));
        assert_eq!(s.check_bool("numbers", "legacy_persist"), Some(true));
        assert_eq!(s.check_bool("numbers", "broken_persist"), None, "only true/false accepted");
        assert_eq!(s.check_long("numbers", "batch"), Some(50));
        assert_eq!(s.check_long("numbers", "legacy_batch"), Some(25));
        assert_eq!(s.check_str("numbers", "batch").as_deref(), Some("50"));
        assert_eq!(s.check_long("numbers", "missing"), None);
    }

    #[test]
    fn check_set_writes_default_only_once() {
        let mut s = Settings::in_memory();
        assert_eq!(s.check_set_long("notary", "first_receipt_number", 5000), (5000, true));
        s.set_long("notary", "first_receipt_number", 7000);
        assert_eq!(s.check_set_long("notary", "first_receipt_number", 5000), (7000, false));

        assert_eq!(s.check_set_bool("numbers", "persist", true), (true, true));
        assert_eq!(s.check_set_str("notary", "id", ""), (String::new(), false));
        assert!(s.check_str("notary", "id").is_none());
    }

    #[test]
    fn set_option_bool_keeps_stored_value() {
        let mut s = Settings::in_memory();
        s.set_bool("numbers", "persist", false);
        let mut persist = true;
        s.set_option_bool("numbers", "persist", &mut persist);
        assert!(!persist);
    }

    #[test]
    fn sections_are_created_once() {
        let mut s = Settings::in_memory();
        assert!(s.is_empty());
        assert!(s.check_set_section("notary"));
        s.set_str("notary", "id", Some("Srv1"));
        assert!(!s.check_set_section("notary"));
        assert!(!s.is_empty());
    }

    #[test]
    #[should_panic(expected = "must not be blank")]
    fn blank_key_panics() {
        Settings::in_memory().check_str("notary", "  ");
    }

    #[test]
    #[should_panic(expected = "must not be blank")]
    fn blank_section_panics() {
        Settings::in_memory().set_long("", "id", 1);
    }

    // ── Files ─────────────────────────────────────────────────────────────────

    #[test]
    fn load_creates_missing_file_and_save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("conf").join("covenant.toml");

        let mut s = Settings::new(&path);
        s.load().unwrap();
        assert!(path.exists());
        assert!(s.is_loaded());
        assert!(s.is_empty());

        s.set_str("notary", "id", Some("Srv9"));
        s.set_bool("numbers", "persist", false);
        s.save().unwrap();

        let mut reread = Settings::new(&path);
        reread.load().unwrap();
        assert_eq!(reread.check_str("notary", "id").as_deref(), Some("Srv9"));
        assert_eq!(reread.check_bool("numbers", "persist"), Some(false));
    }

    #[test]
    fn load_requires_empty_store_until_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covenant.toml");
        fs::write(&path, "[notary]\nid = \"Srv1\"\n").unwrap();

        let mut s = Settings::new(&path);
        s.load().unwrap();
        assert!(matches!(s.load(), Err(CovenantError::ConfigError { .. })));

        s.reset();
        assert!(!s.is_loaded());
        s.load().unwrap();
        assert_eq!(s.check_str("notary", "id").as_deref(), Some("Srv1"));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covenant.toml");
        fs::write(&path, "[notary\nid = ").unwrap();
        assert!(matches!(
            Settings::new(&path).load(),
            Err(CovenantError::ConfigError { .. })
        ));
        assert!(matches!(
            Settings::in_memory().save(),
            Err(CovenantError::ConfigError { .. })
        ));
    }

    // ── CovenantConfig ────────────────────────────────────────────────────────

    #[test]
    fn config_defaults_are_written_back() {
        let mut s = Settings::in_memory();
        let (config, wrote) = CovenantConfig::from_settings(&mut s).unwrap();
        assert!(wrote);
        assert_eq!(config, CovenantConfig::default());
        assert_eq!(s.check_str("logging", "filter").as_deref(), Some("info"));

        let (_, wrote_again) = CovenantConfig::from_settings(&mut s).unwrap();
        assert!(!wrote_again);
    }

    #[test]
    fn config_reads_explicit_values() {
        let mut s = Settings::from_toml_str(
            r#"
            [notary]
            id = "Srv7"
            first_receipt_number = 100

            [logging]
            filter = "covenant_core=debug"

            [numbers]
            persist = false
            storage_dir = "var/numbers"
            "#,
        )
        .unwrap();

        let (config, wrote) = CovenantConfig::from_settings(&mut s).unwrap();
        assert!(!wrote);
        assert_eq!(config.notary_id, NotaryId::new("Srv7"));
        assert_eq!(config.first_receipt_number, 100);
        assert_eq!(config.log_filter, "covenant_core=debug");
        assert!(!config.persist_numbers);
        assert_eq!(config.number_storage_dir, Some(PathBuf::from("var/numbers")));
    }

    #[test]
    fn non_positive_receipt_number_rejected() {
        let mut s = Settings::from_toml_str("[notary]\nfirst_receipt_number = 0\n").unwrap();
        assert!(matches!(
            CovenantConfig::from_settings(&mut s),
            Err(CovenantError::ConfigError { .. })
        ));
    }
}
