//! Error types for the COVENANT runtime.
//!
//! Every variant here is an expected business outcome the caller branches on:
//! a missing number, a signature mismatch, an agent without authority.
//! Programming errors (attaching an agent to a second party, blank settings
//! keys) are not represented here; they panic.

use thiserror::Error;

/// The unified error type for the COVENANT runtime.
#[derive(Debug, Error)]
pub enum CovenantError {
    /// A ledger or signing operation ran without a live credential holder.
    #[error("agent '{agent}' has no credential holder bound for this pass")]
    NoCredentialBound { agent: String },

    /// The bound credential holder is not the Nym the agent represents.
    #[error("agent '{agent}' expects credential '{expected}' but '{actual}' is bound")]
    IdentityMismatch {
        agent: String,
        expected: String,
        actual: String,
    },

    /// The query or operation does not apply to this kind of agent.
    #[error("'{operation}' is not applicable to {kind} agent '{agent}'")]
    NotApplicable {
        operation: String,
        kind: String,
        agent: String,
    },

    /// The number is not in the set the operation requires it to be in.
    #[error("transaction number {number} not found for notary '{notary}'")]
    NumberNotFound { number: i64, notary: String },

    /// The signer has no issued numbers left to reserve.
    #[error("agent '{agent}' has no transaction numbers available for notary '{notary}'")]
    NoNumbersAvailable { agent: String, notary: String },

    /// The agent exists but may not perform this action.
    #[error("agent '{agent}' is not authorized: {reason}")]
    NotAuthorized { agent: String, reason: String },

    /// A number set changed in memory but could not be durably saved.
    ///
    /// The in-memory change is left in place; the caller decides whether to
    /// retry the save or harvest the number back.
    #[error("failed to persist transaction numbers for notary '{notary}': {reason}")]
    PersistFailed { notary: String, reason: String },

    #[error("signing failed: {reason}")]
    SigningFailed { reason: String },

    #[error("signature verification failed: {reason}")]
    SignatureInvalid { reason: String },

    /// A mailbox refused or could not store a receipt.
    #[error("delivery to '{target}' failed: {reason}")]
    DeliveryFailed { target: String, reason: String },

    /// No credential holder could be found or loaded for the identity.
    #[error("identity '{identity}' could not be loaded: {reason}")]
    IdentityUnavailable { identity: String, reason: String },

    #[error("party '{party}' has no agent named '{agent}'")]
    UnknownAgent { party: String, agent: String },

    #[error("party '{party}' has no account named '{account}'")]
    UnknownAccount { party: String, account: String },

    /// A serialized agent descriptor violates the field presence rules.
    #[error("invalid descriptor for agent '{name}': {reason}")]
    InvalidDescriptor { name: String, reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

/// Convenience alias used throughout the COVENANT crates.
pub type CovenantResult<T> = Result<T, CovenantError>;
