//! TOML-backed section/key settings store.
//!
//! Values are kept as native TOML strings, integers and booleans. Integers
//! and booleans written by hand as strings are still accepted on read.
//! Booleans accept only `true` and `false`.
//!
//! An empty string reads as an absent key, and setting a key to `None` or to
//! the empty string removes it.

use std::{
    fs,
    path::{Path, PathBuf},
};

use toml::{Table, Value};
use tracing::{debug, info};

use covenant_contracts::error::{CovenantError, CovenantResult};

#[derive(Debug, Default)]
pub struct Settings {
    path: Option<PathBuf>,
    table: Table,
    loaded: bool,
}

fn require_section(section: &str) {
    assert!(!section.trim().is_empty(), "settings section name must not be blank");
}

fn require_names(section: &str, key: &str) {
    require_section(section);
    assert!(!key.trim().is_empty(), "settings key in section '{}' must not be blank", section);
}

fn config_error(path: &Path, what: &str, e: impl std::fmt::Display) -> CovenantError {
    CovenantError::ConfigError {
        reason: format!("failed to {} settings file '{}': {}", what, path.display(), e),
    }
}

impl Settings {
    /// A store bound to the file at `path`. Nothing is read until `load`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// A store with no backing file; `load` and `save` fail.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Parse `s` as TOML into an unbacked store.
    pub fn from_toml_str(s: &str) -> CovenantResult<Self> {
        let table: Table = s.parse().map_err(|e| CovenantError::ConfigError {
            reason: format!("failed to parse settings TOML: {}", e),
        })?;
        Ok(Self {
            path: None,
            table,
            loaded: true,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn require_path(&self) -> CovenantResult<&Path> {
        self.path.as_deref().ok_or_else(|| CovenantError::ConfigError {
            reason: "settings store has no file path".to_string(),
        })
    }

    /// Read the backing file, creating a blank one first if it is missing.
    ///
    /// The store must be empty; call `reset` before loading again.
    pub fn load(&mut self) -> CovenantResult<()> {
        let path = self.require_path()?.to_path_buf();
        if !self.is_empty() {
            return Err(CovenantError::ConfigError {
                reason: format!("cannot load '{}' into a non-empty settings store", path.display()),
            });
        }

        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| config_error(parent, "create folder for", e))?;
            }
            fs::write(&path, "").map_err(|e| config_error(&path, "create", e))?;
            info!(path = %path.display(), "created blank settings file");
        }

        let contents = fs::read_to_string(&path).map_err(|e| config_error(&path, "read", e))?;
        self.table = contents.parse().map_err(|e| config_error(&path, "parse", e))?;
        self.loaded = true;
        debug!(path = %path.display(), sections = self.table.len(), "settings loaded");
        Ok(())
    }

    pub fn save(&self) -> CovenantResult<()> {
        let path = self.require_path()?;
        let contents = toml::to_string(&self.table).map_err(|e| config_error(path, "serialize", e))?;
        fs::write(path, contents).map_err(|e| config_error(path, "write", e))?;
        debug!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Drop every section and mark the store as not loaded.
    pub fn reset(&mut self) {
        self.table.clear();
        self.loaded = false;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn value(&self, section: &str, key: &str) -> Option<&Value> {
        self.table.get(section)?.as_table()?.get(key)
    }

    /// Apply `edit` to `section`'s table, creating the section if needed.
    fn with_section<R>(&mut self, section: &str, edit: impl FnOnce(&mut Table) -> R) -> R {
        let mut table = match self.table.remove(section) {
            Some(Value::Table(table)) => table,
            _ => Table::new(),
        };
        let result = edit(&mut table);
        self.table.insert(section.to_string(), Value::Table(table));
        result
    }

    // ── Check ─────────────────────────────────────────────────────────────────

    /// The string value of `section.key`, if present and non-empty.
    ///
    /// # Panics
    ///
    /// Panics if `section` or `key` is blank.
    pub fn check_str(&self, section: &str, key: &str) -> Option<String> {
        require_names(section, key);
        let rendered = match self.value(section, key)? {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        (!rendered.is_empty()).then_some(rendered)
    }

    pub fn check_long(&self, section: &str, key: &str) -> Option<i64> {
        require_names(section, key);
        match self.value(section, key)? {
            Value::Integer(n) => Some(*n),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn check_bool(&self, section: &str, key: &str) -> Option<bool> {
        require_names(section, key);
        match self.value(section, key)? {
            Value::Boolean(b) => Some(*b),
            Value::String(s) if s == "true" => Some(true),
            Value::String(s) if s == "false" => Some(false),
            _ => None,
        }
    }

    // ── Set ───────────────────────────────────────────────────────────────────

    fn set_value(&mut self, section: &str, key: &str, value: Option<Value>) -> bool {
        require_names(section, key);
        let old = self.value(section, key).cloned();
        if old == value {
            return false;
        }

        let rendered = |v: &Option<Value>| v.as_ref().map_or_else(|| "<none>".to_string(), Value::to_string);
        info!(
            section = %section,
            key = %key,
            old = %rendered(&old),
            new = %rendered(&value),
            "setting changed"
        );

        match value {
            Some(value) => {
                self.with_section(section, |t| t.insert(key.to_string(), value));
                true
            }
            None => {
                self.with_section(section, |t| t.remove(key));
                old.is_some()
            }
        }
    }

    /// Set `section.key` to `value`, or remove it for `None` or `""`.
    /// Returns whether the stored value was created or changed.
    pub fn set_str(&mut self, section: &str, key: &str, value: Option<&str>) -> bool {
        let value = value
            .filter(|v| !v.is_empty())
            .map(|v| Value::String(v.to_string()));
        self.set_value(section, key, value)
    }

    pub fn set_long(&mut self, section: &str, key: &str, value: i64) -> bool {
        self.set_value(section, key, Some(Value::Integer(value)))
    }

    pub fn set_bool(&mut self, section: &str, key: &str, value: bool) -> bool {
        self.set_value(section, key, Some(Value::Boolean(value)))
    }

    // ── Check or set default ──────────────────────────────────────────────────

    /// Create `section` if it has no keys. Returns whether it was new.
    pub fn check_set_section(&mut self, section: &str) -> bool {
        require_section(section);
        let is_new = self
            .table
            .get(section)
            .and_then(Value::as_table)
            .map_or(true, Table::is_empty);
        if is_new {
            self.with_section(section, |_| ());
            debug!(section = %section, "settings section created");
        }
        is_new
    }

    /// The value of `section.key`, writing `default` first when absent.
    /// The flag is true when the default was written. An empty default
    /// leaves the key absent and yields an empty string.
    pub fn check_set_str(&mut self, section: &str, key: &str, default: &str) -> (String, bool) {
        if let Some(existing) = self.check_str(section, key) {
            return (existing, false);
        }
        let created = self.set_str(section, key, Some(default));
        (default.to_string(), created)
    }

    pub fn check_set_long(&mut self, section: &str, key: &str, default: i64) -> (i64, bool) {
        if let Some(existing) = self.check_long(section, key) {
            return (existing, false);
        }
        (default, self.set_long(section, key, default))
    }

    pub fn check_set_bool(&mut self, section: &str, key: &str, default: bool) -> (bool, bool) {
        if let Some(existing) = self.check_bool(section, key) {
            return (existing, false);
        }
        (default, self.set_bool(section, key, default))
    }

    /// Read `section.key` into `option`, storing the current value of
    /// `option` as the default when the key is absent.
    pub fn set_option_bool(&mut self, section: &str, key: &str, option: &mut bool) {
        let (value, _) = self.check_set_bool(section, key, *option);
        *option = value;
    }
}
