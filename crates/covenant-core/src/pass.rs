//! Pass-scoped credential borrowing.
//!
//! Credential references are valid for one processing pass only. `Pass`
//! wraps the agent or party being processed and clears every temporary
//! reference when it goes out of scope, including on `?` early returns.

use std::ops::{Deref, DerefMut};

/// Anything that holds per-pass references that must not outlive the pass.
pub trait TemporaryReferences {
    fn clear_temporary_references(&mut self);
}

/// Scope guard for one processing pass over `T`.
///
/// ```rust,ignore
/// let mut pass = Pass::begin(&mut party);
/// pass.bind_credentials(&loaded);
/// pass.reserve_transaction_numbers(&notary, true, SignerSelection::UseOwnCredential)?;
/// // references cleared here, whether or not the reservation succeeded
/// ```
pub struct Pass<'a, T: TemporaryReferences> {
    inner: &'a mut T,
}

impl<'a, T: TemporaryReferences> Pass<'a, T> {
    pub fn begin(inner: &'a mut T) -> Self {
        Self { inner }
    }
}

impl<T: TemporaryReferences> Deref for Pass<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.inner
    }
}

impl<T: TemporaryReferences> DerefMut for Pass<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.inner
    }
}

impl<T: TemporaryReferences> Drop for Pass<'_, T> {
    fn drop(&mut self) {
        self.inner.clear_temporary_references();
    }
}
