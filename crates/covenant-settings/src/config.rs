//! Typed runtime configuration read from a `Settings` store.
//!
//! ```toml
//! [notary]
//! id = "Srv1"
//! first_receipt_number = 5000
//!
//! [logging]
//! filter = "info"
//!
//! [numbers]
//! persist = true
//! storage_dir = "var/numbers"
//! ```
//!
//! Missing keys are written back with their defaults, so a fresh settings
//! file documents every option after the first run.

use std::path::PathBuf;

use tracing::debug;

use covenant_contracts::{
    error::{CovenantError, CovenantResult},
    identity::NotaryId,
};

use crate::store::Settings;

pub const DEFAULT_NOTARY_ID: &str = "Srv1";
pub const DEFAULT_LOG_FILTER: &str = "info";
pub const DEFAULT_FIRST_RECEIPT_NUMBER: i64 = 5000;

#[derive(Debug, Clone, PartialEq)]
pub struct CovenantConfig {
    pub notary_id: NotaryId,
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// First number the notary issues for receipts it files.
    pub first_receipt_number: i64,
    /// Whether ledger operations save number sets by default.
    pub persist_numbers: bool,
    /// Where number snapshots are written. In memory when unset.
    pub number_storage_dir: Option<PathBuf>,
}

impl CovenantConfig {
    /// Read every option, filling absent keys with defaults. Returns the
    /// config and whether any default was written.
    pub fn from_settings(settings: &mut Settings) -> CovenantResult<(Self, bool)> {
        let mut wrote_default = false;
        for section in ["notary", "logging", "numbers"] {
            wrote_default |= settings.check_set_section(section);
        }

        let (notary_id, new) = settings.check_set_str("notary", "id", DEFAULT_NOTARY_ID);
        wrote_default |= new;
        let (first_receipt_number, new) =
            settings.check_set_long("notary", "first_receipt_number", DEFAULT_FIRST_RECEIPT_NUMBER);
        wrote_default |= new;
        let (log_filter, new) = settings.check_set_str("logging", "filter", DEFAULT_LOG_FILTER);
        wrote_default |= new;
        let (persist_numbers, new) = settings.check_set_bool("numbers", "persist", true);
        wrote_default |= new;
        let number_storage_dir = settings.check_str("numbers", "storage_dir").map(PathBuf::from);

        if first_receipt_number <= 0 {
            return Err(CovenantError::ConfigError {
                reason: format!("notary.first_receipt_number must be positive, got {}", first_receipt_number),
            });
        }

        let config = Self {
            notary_id: NotaryId::new(notary_id),
            log_filter,
            first_receipt_number,
            persist_numbers,
            number_storage_dir,
        };
        debug!(notary = %config.notary_id, wrote_default = wrote_default, "configuration read");
        Ok((config, wrote_default))
    }
}

impl Default for CovenantConfig {
    fn default() -> Self {
        Self {
            notary_id: NotaryId::new(DEFAULT_NOTARY_ID),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            first_receipt_number: DEFAULT_FIRST_RECEIPT_NUMBER,
            persist_numbers: true,
            number_storage_dir: None,
        }
    }
}
