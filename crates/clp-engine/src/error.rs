//! Engine error taxonomy.
//!
//! The three poll-loop termination reasons (timeout, explicit cancel, any
//! other context termination) stay distinct all the way to the caller;
//! upstream retry logic treats them differently.

use std::time::Duration;

use clp_model::{
    ActivationStatus, InvalidVariantError, Network, PolicyId, ResourceKey, ValidationError,
};

use crate::store::StoreError;

/// Errors returned by the engine components.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Structural rule validation failed; no remote call was made.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An object-match-value shape is not supported by the rule flavor.
    #[error(transparent)]
    InvalidVariant(#[from] InvalidVariantError),

    /// The activation wait outlived its deadline.
    #[error("activation of {resource} on {network} timed out after {waited:?}")]
    ActivationTimeout {
        /// The resource being activated or deactivated.
        resource: ResourceKey,
        /// Target network.
        network: Network,
        /// How long the loop waited before giving up.
        waited: Duration,
    },

    /// The caller explicitly canceled the activation wait.
    #[error("activation of {resource} on {network} was canceled")]
    ActivationCanceled {
        /// The resource being activated or deactivated.
        resource: ResourceKey,
        /// Target network.
        network: Network,
    },

    /// The cancellation context terminated for a reason other than an
    /// explicit cancel or a deadline.
    #[error("activation context for {resource} on {network} terminated: {message}")]
    ActivationContextTerminated {
        /// The resource being activated or deactivated.
        resource: ResourceKey,
        /// Target network.
        network: Network,
        /// What happened to the context.
        message: String,
    },

    /// The remote collaborator reported a terminal, non-recoverable
    /// activation status.
    #[error("activation of {resource} on {network} failed with status '{status}'")]
    ActivationFailed {
        /// The resource being activated or deactivated.
        resource: ResourceKey,
        /// Target network.
        network: Network,
        /// The fatal status observed mid-poll.
        status: ActivationStatus,
    },

    /// Policy deletion kept hitting the pending-activation conflict after
    /// the configured number of retries.
    #[error("deleting policy {policy_id} still conflicts with a pending activation after {attempts} attempts")]
    DeleteConflictExhausted {
        /// The policy being deleted.
        policy_id: PolicyId,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// A remote store error, propagated unchanged in kind.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Whether this error came from the poll loop's cancellation context
    /// rather than from remote state.
    #[must_use]
    pub const fn is_context_termination(&self) -> bool {
        matches!(
            self,
            Self::ActivationTimeout { .. }
                | Self::ActivationCanceled { .. }
                | Self::ActivationContextTerminated { .. }
        )
    }
}
