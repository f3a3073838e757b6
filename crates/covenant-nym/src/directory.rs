//! `NymDirectory`: the set of Nyms a process can load on demand.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use tracing::debug;

use covenant_contracts::{
    error::{CovenantError, CovenantResult},
    identity::Identifier,
};
use covenant_core::traits::{CredentialHolder, CredentialLoader};

use crate::nym::LocalNym;

#[derive(Default)]
pub struct NymDirectory {
    nyms: RwLock<HashMap<Identifier, Arc<LocalNym>>>,
}

impl NymDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `nym` loadable. Replaces any Nym registered under the same id.
    pub fn register(&self, nym: Arc<LocalNym>) {
        let id = nym.id().clone();
        self.nyms
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, nym);
    }

    pub fn get(&self, id: &Identifier) -> Option<Arc<LocalNym>> {
        self.nyms
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.nyms.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialLoader for NymDirectory {
    fn load(&self, identity: &Identifier) -> CovenantResult<Arc<dyn CredentialHolder>> {
        let nym = self.get(identity).ok_or_else(|| CovenantError::IdentityUnavailable {
            identity: identity.to_string(),
            reason: "not registered in this directory".to_string(),
        })?;
        debug!(identity = %identity, "nym loaded from directory");
        let holder: Arc<dyn CredentialHolder> = nym;
        Ok(holder)
    }
}
