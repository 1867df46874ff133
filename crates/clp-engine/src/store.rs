//! The remote policy-store collaborator interface.

use async_trait::async_trait;
use clp_model::{
    Activation, GroupId, MatchRule, Network, Policy, PolicyFlavor, PolicyId, PolicyVersion,
    PolicyVersionNumber, ResourceKey,
};

/// Input for creating a policy container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPolicy {
    /// Display name.
    pub name: String,
    /// Owning group.
    pub group_id: GroupId,
    /// Flavor selecting the rule variant set.
    pub flavor: PolicyFlavor,
    /// Human description.
    pub description: Option<String>,
}

/// Partial update to a policy container; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New owning group.
    pub group_id: Option<GroupId>,
    /// New description.
    pub description: Option<String>,
}

/// Content of a desired policy version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionContent {
    /// Free-text description.
    pub description: Option<String>,
    /// Ordered match rules.
    pub match_rules: Vec<MatchRule>,
}

/// Errors reported by the remote policy store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The addressed policy, version, or activation does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// What kind of object was addressed.
        kind: &'static str,
        /// The identifier used.
        id: String,
    },

    /// The store refused the operation because an activation is still
    /// pending; eventually-consistent and worth a bounded retry on the
    /// delete path.
    #[error("operation conflicts with a pending activation: {message}")]
    PendingConflict {
        /// Remote conflict detail.
        message: String,
    },

    /// Any other remote failure, wrapped with the failing operation.
    #[error("remote call {operation} failed: {message}")]
    Remote {
        /// The store operation that failed.
        operation: &'static str,
        /// Remote error detail.
        message: String,
        /// HTTP-level status code, when the transport exposed one.
        status_code: Option<u16>,
    },
}

impl StoreError {
    /// Whether this is the eventually-consistent pending-activation
    /// conflict that the delete path retries a bounded number of times.
    #[must_use]
    pub const fn is_pending_conflict(&self) -> bool {
        matches!(self, Self::PendingConflict { .. })
    }
}

/// Remote collaborator providing durable storage and activation execution
/// for policies, versions, and activations.
///
/// All operations are synchronous at the transport level; activation's
/// asynchrony is business-level (a `pending` status to be polled), not
/// transport-level. Implementations are injected into the engine
/// components at construction.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Create a policy container.
    async fn create_policy(&self, policy: NewPolicy) -> Result<Policy, StoreError>;

    /// Update a policy container's name, group, or description.
    async fn update_policy(
        &self,
        policy_id: PolicyId,
        update: PolicyUpdate,
    ) -> Result<Policy, StoreError>;

    /// Fetch a policy container.
    async fn get_policy(&self, policy_id: PolicyId) -> Result<Policy, StoreError>;

    /// List all versions of a policy.
    async fn list_policy_versions(
        &self,
        policy_id: PolicyId,
    ) -> Result<Vec<PolicyVersion>, StoreError>;

    /// Create a new version seeded with the given content; the store
    /// assigns the next version number.
    async fn create_policy_version(
        &self,
        policy_id: PolicyId,
        content: VersionContent,
    ) -> Result<PolicyVersion, StoreError>;

    /// Replace the content of an existing, still-mutable version.
    async fn update_policy_version(
        &self,
        policy_id: PolicyId,
        version: PolicyVersionNumber,
        content: VersionContent,
    ) -> Result<PolicyVersion, StoreError>;

    /// Fetch one version.
    async fn get_policy_version(
        &self,
        policy_id: PolicyId,
        version: PolicyVersionNumber,
    ) -> Result<PolicyVersion, StoreError>;

    /// Delete one version.
    async fn delete_policy_version(
        &self,
        policy_id: PolicyId,
        version: PolicyVersionNumber,
    ) -> Result<(), StoreError>;

    /// Delete the policy container.
    async fn delete_policy(&self, policy_id: PolicyId) -> Result<(), StoreError>;

    /// List activations for a resource on a network, newest first.
    async fn list_activations(
        &self,
        resource: &ResourceKey,
        network: Network,
    ) -> Result<Vec<Activation>, StoreError>;

    /// Submit an activation of a version onto a network.
    async fn activate_version(
        &self,
        resource: &ResourceKey,
        version: PolicyVersionNumber,
        network: Network,
        associated_properties: &[String],
    ) -> Result<Activation, StoreError>;

    /// Submit a deactivation of a version from a network.
    async fn deactivate_version(
        &self,
        resource: &ResourceKey,
        version: PolicyVersionNumber,
        network: Network,
    ) -> Result<Activation, StoreError>;
}
