//! The activation state machine.
//!
//! Activation is asynchronous on the remote side: submission returns
//! immediately and the status moves `inactive -> pending -> active` (the
//! deactivation path runs `active -> pending -> inactive`). The controller
//! submits, then polls `list_activations` until the target status is
//! reached or a fatal status is observed. Status is never inferred
//! locally; every iteration re-queries the collaborator.

use std::sync::Arc;
use std::time::Duration;

use clp_model::{Activation, ActivationStatus, Network, PolicyVersionNumber, ResourceKey};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::PollConfig;
use crate::error::EngineError;
use crate::store::PolicyStore;

/// Which terminal status the poll loop is driving toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Activate,
    Deactivate,
}

impl Direction {
    const fn describe(self) -> &'static str {
        match self {
            Self::Activate => "activation",
            Self::Deactivate => "deactivation",
        }
    }
}

/// Drives activation and deactivation of policy versions on delivery
/// networks.
///
/// One controller call owns one poll loop; status queries for a given
/// (resource, network) pair are strictly sequential within a call, and no
/// state is shared between concurrent calls.
pub struct ActivationController {
    store: Arc<dyn PolicyStore>,
    config: PollConfig,
}

impl ActivationController {
    /// Create a controller over the given store with explicit poll
    /// configuration.
    #[must_use]
    pub fn new(store: Arc<dyn PolicyStore>, config: PollConfig) -> Self {
        Self { store, config }
    }

    /// The poll configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Activate `version` on `network`, waiting until the remote
    /// collaborator reports it `active`.
    ///
    /// Idempotent: when the exact version is already active, no submission
    /// is made and the current activation record is returned.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ActivationFailed`] when a fatal status is
    /// observed, [`EngineError::ActivationTimeout`] /
    /// [`EngineError::ActivationCanceled`] /
    /// [`EngineError::ActivationContextTerminated`] for the three wait
    /// termination reasons, or a wrapped [`crate::StoreError`].
    pub async fn activate(
        &self,
        resource: &ResourceKey,
        version: PolicyVersionNumber,
        network: Network,
        associated_properties: &[String],
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<Activation, EngineError> {
        let current = self.store.list_activations(resource, network).await?;
        if let Some(active) = current
            .iter()
            .find(|a| a.version == version && a.status == ActivationStatus::Active)
        {
            tracing::debug!(
                resource = %resource,
                network = %network,
                version = %version,
                "version already active, skipping submission"
            );
            return Ok(active.clone());
        }

        tracing::info!(
            resource = %resource,
            network = %network,
            version = %version,
            "submitting activation"
        );
        self.store
            .activate_version(resource, version, network, associated_properties)
            .await?;

        self.await_terminal(resource, version, network, Direction::Activate, cancel)
            .await
    }

    /// Deactivate `version` on `network`, waiting until the remote
    /// collaborator reports it `inactive` (or `deactivated`).
    ///
    /// Idempotent: when the version is already inactive, or was never
    /// activated on the network, no submission is made.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`Self::activate`].
    pub async fn deactivate(
        &self,
        resource: &ResourceKey,
        version: PolicyVersionNumber,
        network: Network,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<Activation, EngineError> {
        let current = self.store.list_activations(resource, network).await?;
        match current.iter().find(|a| a.version == version) {
            None => {
                tracing::debug!(
                    resource = %resource,
                    network = %network,
                    version = %version,
                    "version was never activated, nothing to deactivate"
                );
                return Ok(inactive_record(resource, version, network));
            }
            Some(existing) if existing.status.is_terminal_for_deactivation() => {
                tracing::debug!(
                    resource = %resource,
                    network = %network,
                    version = %version,
                    status = %existing.status,
                    "version already inactive, skipping submission"
                );
                return Ok(existing.clone());
            }
            Some(_) => {}
        }

        tracing::info!(
            resource = %resource,
            network = %network,
            version = %version,
            "submitting deactivation"
        );
        self.store
            .deactivate_version(resource, version, network)
            .await?;

        self.await_terminal(resource, version, network, Direction::Deactivate, cancel)
            .await
    }

    /// Poll until the direction's target status is reached, a fatal status
    /// is observed, or the wait is terminated by deadline or cancellation.
    async fn await_terminal(
        &self,
        resource: &ResourceKey,
        version: PolicyVersionNumber,
        network: Network,
        direction: Direction,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<Activation, EngineError> {
        let started = Instant::now();
        let deadline = self.config.timeout.map(|timeout| started + timeout);

        loop {
            if *cancel.borrow() {
                return Err(EngineError::ActivationCanceled {
                    resource: resource.clone(),
                    network,
                });
            }

            let activations = self.store.list_activations(resource, network).await?;
            let observed = activations.iter().find(|a| a.version == version);

            match observed {
                Some(activation) => {
                    tracing::debug!(
                        resource = %resource,
                        network = %network,
                        version = %version,
                        status = %activation.status,
                        "observed {} status",
                        direction.describe()
                    );
                    match (direction, activation.status) {
                        (Direction::Activate, ActivationStatus::Active)
                        | (
                            Direction::Deactivate,
                            ActivationStatus::Inactive | ActivationStatus::Deactivated,
                        ) => {
                            tracing::info!(
                                resource = %resource,
                                network = %network,
                                version = %version,
                                status = %activation.status,
                                "{} complete",
                                direction.describe()
                            );
                            return Ok(activation.clone());
                        }
                        (_, ActivationStatus::Pending) => {}
                        (_, status) => {
                            // Fatal: abort immediately, no further interval.
                            return Err(EngineError::ActivationFailed {
                                resource: resource.clone(),
                                network,
                                status,
                            });
                        }
                    }
                }
                // Deactivation with no remaining record means the remote
                // already swept it away.
                None if direction == Direction::Deactivate => {
                    return Ok(inactive_record(resource, version, network));
                }
                // The submission may not be listed yet; keep polling.
                None => {}
            }

            let deadline_elapsed = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                changed = cancel.changed() => match changed {
                    Ok(()) => {
                        if *cancel.borrow() {
                            return Err(EngineError::ActivationCanceled {
                                resource: resource.clone(),
                                network,
                            });
                        }
                    }
                    Err(_) => {
                        return Err(EngineError::ActivationContextTerminated {
                            resource: resource.clone(),
                            network,
                            message: "cancellation signal sender dropped".to_string(),
                        });
                    }
                },
                () = deadline_elapsed => {
                    return Err(EngineError::ActivationTimeout {
                        resource: resource.clone(),
                        network,
                        waited: round_to_millis(started.elapsed()),
                    });
                }
                () = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }
}

/// Synthesized record for a version with no activation history.
fn inactive_record(
    resource: &ResourceKey,
    version: PolicyVersionNumber,
    network: Network,
) -> Activation {
    Activation {
        resource: resource.clone(),
        network,
        version,
        status: ActivationStatus::Inactive,
        submitted_at: None,
        activated_at: None,
        associated_properties: Vec::new(),
    }
}

fn round_to_millis(duration: Duration) -> Duration {
    Duration::from_millis(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}
