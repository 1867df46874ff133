//! Version lifecycle orchestration.
//!
//! Policy versions are mutable until some activation of the version
//! reaches `pending` or `active` on any network. The manager resolves that
//! immutability from live remote state on every call and routes a desired
//! change to an in-place update or a fresh version accordingly, so callers
//! never see an immutable-version conflict.

use std::sync::Arc;

use clp_model::{
    ActivationStatus, Network, PolicyFlavor, PolicyId, PolicyVersion, PolicyVersionNumber,
    ResourceKey, validate_rules,
};
use tokio::sync::watch;

use crate::activation::ActivationController;
use crate::config::PollConfig;
use crate::error::EngineError;
use crate::store::{PolicyStore, VersionContent};

/// Orchestrates create/update/delete of policy versions against the remote
/// store.
pub struct VersionLifecycleManager {
    store: Arc<dyn PolicyStore>,
    activations: ActivationController,
    config: PollConfig,
}

impl VersionLifecycleManager {
    /// Create a manager over the given store with explicit configuration.
    #[must_use]
    pub fn new(store: Arc<dyn PolicyStore>, config: PollConfig) -> Self {
        let activations = ActivationController::new(Arc::clone(&store), config.clone());
        Self {
            store,
            activations,
            config,
        }
    }

    /// The activation controller bound to the same store and config.
    #[must_use]
    pub const fn activations(&self) -> &ActivationController {
        &self.activations
    }

    /// Apply desired version content to a policy.
    ///
    /// The target is `target` when given, otherwise the latest version.
    /// A mutable target is updated in place; an immutable one (any
    /// activation `pending` or `active` on any network) is left untouched
    /// and a new version seeded from the desired content is created
    /// instead. Validation runs against the policy's flavor before any
    /// remote call is made.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] without touching the store when
    /// the desired rules are structurally invalid, or a wrapped store
    /// error.
    pub async fn create_or_update(
        &self,
        policy_id: PolicyId,
        flavor: PolicyFlavor,
        desired: VersionContent,
        target: Option<PolicyVersionNumber>,
    ) -> Result<PolicyVersion, EngineError> {
        validate_rules(flavor, &desired.match_rules)?;

        let versions = self.store.list_policy_versions(policy_id).await?;
        let Some(latest) = versions.iter().map(|v| v.version).max() else {
            tracing::info!(policy_id = %policy_id, "policy has no versions, creating the first");
            return Ok(self.store.create_policy_version(policy_id, desired).await?);
        };

        let target_version = target.unwrap_or(latest);
        if self.version_is_immutable(policy_id, target_version, &versions).await? {
            tracing::info!(
                policy_id = %policy_id,
                version = %target_version,
                "version is immutable, creating a new version"
            );
            Ok(self.store.create_policy_version(policy_id, desired).await?)
        } else {
            tracing::debug!(
                policy_id = %policy_id,
                version = %target_version,
                "version is mutable, updating in place"
            );
            Ok(self
                .store
                .update_policy_version(policy_id, target_version, desired)
                .await?)
        }
    }

    /// Tear a policy down completely: deactivate every live activation,
    /// delete every version newest-first, then delete the container.
    ///
    /// The container deletion is retried a bounded number of times when
    /// the store reports an eventually-consistent pending-activation
    /// conflict; all other errors surface once.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DeleteConflictExhausted`] when the conflict
    /// outlives the configured retry bound, or any activation/store error
    /// from the teardown steps.
    pub async fn delete(
        &self,
        policy_id: PolicyId,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<(), EngineError> {
        let resource = ResourceKey::from(policy_id);

        for network in Network::ALL {
            let activations = self.store.list_activations(&resource, network).await?;
            for activation in activations {
                if !matches!(
                    activation.status,
                    ActivationStatus::Active | ActivationStatus::Pending
                ) {
                    continue;
                }
                tracing::info!(
                    policy_id = %policy_id,
                    network = %network,
                    version = %activation.version,
                    status = %activation.status,
                    "deactivating before delete"
                );
                self.activations
                    .deactivate(&resource, activation.version, network, cancel)
                    .await?;
            }
        }

        let mut versions = self.store.list_policy_versions(policy_id).await?;
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        for version in versions {
            tracing::debug!(
                policy_id = %policy_id,
                version = %version.version,
                "deleting policy version"
            );
            self.store
                .delete_policy_version(policy_id, version.version)
                .await?;
        }

        self.delete_container(policy_id).await
    }

    /// Delete the policy container with bounded retries on the
    /// pending-activation conflict.
    async fn delete_container(&self, policy_id: PolicyId) -> Result<(), EngineError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.store.delete_policy(policy_id).await {
                Ok(()) => {
                    tracing::info!(policy_id = %policy_id, "policy deleted");
                    return Ok(());
                }
                Err(err) if err.is_pending_conflict() => {
                    if attempt >= self.config.delete_retry_limit {
                        return Err(EngineError::DeleteConflictExhausted {
                            policy_id,
                            attempts: attempt,
                        });
                    }
                    tracing::warn!(
                        policy_id = %policy_id,
                        attempt,
                        "policy delete conflicts with a pending activation, retrying"
                    );
                    tokio::time::sleep(self.config.delete_retry_backoff).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Whether a version may no longer be mutated in place.
    ///
    /// A version is immutable when the store already flags it so, or when
    /// any activation of it is `pending` or `active` on any network. The
    /// activation state is queried live, never cached.
    async fn version_is_immutable(
        &self,
        policy_id: PolicyId,
        version: PolicyVersionNumber,
        versions: &[PolicyVersion],
    ) -> Result<bool, EngineError> {
        if versions
            .iter()
            .any(|v| v.version == version && v.immutable)
        {
            return Ok(true);
        }

        let resource = ResourceKey::from(policy_id);
        for network in Network::ALL {
            let activations = self.store.list_activations(&resource, network).await?;
            if activations.iter().any(|a| {
                a.version == version
                    && matches!(
                        a.status,
                        ActivationStatus::Active | ActivationStatus::Pending
                    )
            }) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
