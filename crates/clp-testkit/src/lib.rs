//! Scriptable in-memory [`PolicyStore`] for engine tests.
//!
//! The store keeps policies, versions, and activations behind a mutex and
//! lets tests script how activation statuses progress: each
//! `list_activations` call pops the next scripted status for the
//! (resource, network) key and applies it to the newest activation record,
//! so a test can play out `pending -> pending -> active` (or a failure)
//! deterministically. Call counters expose how often each remote operation
//! was invoked, which is what the idempotency assertions check.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use clp_engine::{NewPolicy, PolicyStore, PolicyUpdate, StoreError, VersionContent};
use clp_model::{
    Activation, ActivationStatus, Network, Policy, PolicyId, PolicyVersion, PolicyVersionNumber,
    ResourceKey,
};
use parking_lot::Mutex;

/// How often each store operation has been called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounters {
    /// `list_activations` calls.
    pub list_activations: u64,
    /// `activate_version` submissions.
    pub activate_version: u64,
    /// `deactivate_version` submissions.
    pub deactivate_version: u64,
    /// `create_policy_version` calls.
    pub create_policy_version: u64,
    /// `update_policy_version` calls.
    pub update_policy_version: u64,
    /// `delete_policy_version` calls.
    pub delete_policy_version: u64,
    /// `delete_policy` calls.
    pub delete_policy: u64,
}

#[derive(Default)]
struct State {
    next_policy_id: i64,
    policies: BTreeMap<PolicyId, Policy>,
    versions: BTreeMap<PolicyId, Vec<PolicyVersion>>,
    activations: BTreeMap<(ResourceKey, Network), Vec<Activation>>,
    scripts: BTreeMap<(ResourceKey, Network), VecDeque<ActivationStatus>>,
    delete_policy_conflicts: u32,
    counters: CallCounters,
}

/// In-memory policy store with scriptable activation progressions and
/// injectable delete conflicts.
#[derive(Default)]
pub struct InMemoryPolicyStore {
    state: Mutex<State>,
}

impl InMemoryPolicyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a policy directly, bypassing the trait surface.
    pub fn seed_policy(&self, policy: Policy) {
        let mut state = self.state.lock();
        state.next_policy_id = state.next_policy_id.max(policy.policy_id.value());
        state.policies.insert(policy.policy_id, policy);
    }

    /// Insert a version directly.
    pub fn seed_version(&self, version: PolicyVersion) {
        self.state
            .lock()
            .versions
            .entry(version.policy_id)
            .or_default()
            .push(version);
    }

    /// Insert an activation record directly, with the given status.
    pub fn seed_activation(
        &self,
        resource: impl Into<ResourceKey>,
        network: Network,
        version: PolicyVersionNumber,
        status: ActivationStatus,
    ) {
        let resource = resource.into();
        self.state
            .lock()
            .activations
            .entry((resource.clone(), network))
            .or_default()
            .push(Activation {
                resource,
                network,
                version,
                status,
                submitted_at: Some(Utc::now()),
                activated_at: (status == ActivationStatus::Active).then(Utc::now),
                associated_properties: Vec::new(),
            });
    }

    /// Script the statuses the next `list_activations` calls will report
    /// for the newest activation under (resource, network). When the
    /// script runs out, the last applied status sticks.
    pub fn script_statuses(
        &self,
        resource: impl Into<ResourceKey>,
        network: Network,
        statuses: impl IntoIterator<Item = ActivationStatus>,
    ) {
        self.state
            .lock()
            .scripts
            .entry((resource.into(), network))
            .or_default()
            .extend(statuses);
    }

    /// Make the next `count` calls to `delete_policy` fail with the
    /// pending-activation conflict.
    pub fn fail_delete_policy_times(&self, count: u32) {
        self.state.lock().delete_policy_conflicts = count;
    }

    /// Snapshot of the per-operation call counters.
    #[must_use]
    pub fn counters(&self) -> CallCounters {
        self.state.lock().counters
    }

    /// Fetch a stored version for inspection, if present.
    #[must_use]
    pub fn stored_version(
        &self,
        policy_id: PolicyId,
        version: PolicyVersionNumber,
    ) -> Option<PolicyVersion> {
        self.state
            .lock()
            .versions
            .get(&policy_id)
            .and_then(|versions| versions.iter().find(|v| v.version == version).cloned())
    }

    /// Whether the policy container still exists.
    #[must_use]
    pub fn policy_exists(&self, policy_id: PolicyId) -> bool {
        self.state.lock().policies.contains_key(&policy_id)
    }

    /// Current status of the newest activation record for the key, if any.
    #[must_use]
    pub fn activation_status(
        &self,
        resource: impl Into<ResourceKey>,
        network: Network,
        version: PolicyVersionNumber,
    ) -> Option<ActivationStatus> {
        self.state
            .lock()
            .activations
            .get(&(resource.into(), network))
            .and_then(|records| {
                records
                    .iter()
                    .rev()
                    .find(|a| a.version == version)
                    .map(|a| a.status)
            })
    }
}

fn not_found(kind: &'static str, id: impl ToString) -> StoreError {
    StoreError::NotFound {
        kind,
        id: id.to_string(),
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn create_policy(&self, policy: NewPolicy) -> Result<Policy, StoreError> {
        let mut state = self.state.lock();
        state.next_policy_id += 1;
        let created = Policy {
            policy_id: PolicyId::new(state.next_policy_id),
            name: policy.name,
            group_id: policy.group_id,
            flavor: policy.flavor,
            description: policy.description,
        };
        state.policies.insert(created.policy_id, created.clone());
        Ok(created)
    }

    async fn update_policy(
        &self,
        policy_id: PolicyId,
        update: PolicyUpdate,
    ) -> Result<Policy, StoreError> {
        let mut state = self.state.lock();
        let policy = state
            .policies
            .get_mut(&policy_id)
            .ok_or_else(|| not_found("policy", policy_id))?;
        if let Some(name) = update.name {
            policy.name = name;
        }
        if let Some(group_id) = update.group_id {
            policy.group_id = group_id;
        }
        if let Some(description) = update.description {
            policy.description = Some(description);
        }
        Ok(policy.clone())
    }

    async fn get_policy(&self, policy_id: PolicyId) -> Result<Policy, StoreError> {
        self.state
            .lock()
            .policies
            .get(&policy_id)
            .cloned()
            .ok_or_else(|| not_found("policy", policy_id))
    }

    async fn list_policy_versions(
        &self,
        policy_id: PolicyId,
    ) -> Result<Vec<PolicyVersion>, StoreError> {
        let state = self.state.lock();
        if !state.policies.contains_key(&policy_id) {
            return Err(not_found("policy", policy_id));
        }
        Ok(state.versions.get(&policy_id).cloned().unwrap_or_default())
    }

    async fn create_policy_version(
        &self,
        policy_id: PolicyId,
        content: VersionContent,
    ) -> Result<PolicyVersion, StoreError> {
        let mut state = self.state.lock();
        state.counters.create_policy_version += 1;
        if !state.policies.contains_key(&policy_id) {
            return Err(not_found("policy", policy_id));
        }
        let versions = state.versions.entry(policy_id).or_default();
        let next = versions
            .iter()
            .map(|v| v.version)
            .max()
            .map_or(PolicyVersionNumber::new(1), PolicyVersionNumber::next);
        let version = PolicyVersion {
            policy_id,
            version: next,
            immutable: false,
            match_rules: content.match_rules,
            description: content.description,
            warnings: Vec::new(),
        };
        versions.push(version.clone());
        Ok(version)
    }

    async fn update_policy_version(
        &self,
        policy_id: PolicyId,
        version: PolicyVersionNumber,
        content: VersionContent,
    ) -> Result<PolicyVersion, StoreError> {
        let mut state = self.state.lock();
        state.counters.update_policy_version += 1;
        let stored = state
            .versions
            .get_mut(&policy_id)
            .and_then(|versions| versions.iter_mut().find(|v| v.version == version))
            .ok_or_else(|| not_found("policy version", version))?;
        if stored.immutable {
            return Err(StoreError::Remote {
                operation: "update_policy_version",
                message: format!("version {version} is immutable"),
                status_code: Some(409),
            });
        }
        stored.match_rules = content.match_rules;
        stored.description = content.description;
        Ok(stored.clone())
    }

    async fn get_policy_version(
        &self,
        policy_id: PolicyId,
        version: PolicyVersionNumber,
    ) -> Result<PolicyVersion, StoreError> {
        self.stored_version(policy_id, version)
            .ok_or_else(|| not_found("policy version", version))
    }

    async fn delete_policy_version(
        &self,
        policy_id: PolicyId,
        version: PolicyVersionNumber,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.counters.delete_policy_version += 1;
        let versions = state
            .versions
            .get_mut(&policy_id)
            .ok_or_else(|| not_found("policy", policy_id))?;
        let before = versions.len();
        versions.retain(|v| v.version != version);
        if versions.len() == before {
            return Err(not_found("policy version", version));
        }
        Ok(())
    }

    async fn delete_policy(&self, policy_id: PolicyId) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.counters.delete_policy += 1;
        if state.delete_policy_conflicts > 0 {
            state.delete_policy_conflicts -= 1;
            return Err(StoreError::PendingConflict {
                message: "an activation is still pending for this policy".to_string(),
            });
        }
        if state.policies.remove(&policy_id).is_none() {
            return Err(not_found("policy", policy_id));
        }
        state.versions.remove(&policy_id);
        let resource = ResourceKey::from(policy_id);
        state
            .activations
            .retain(|(key, _), _| *key != resource);
        Ok(())
    }

    async fn list_activations(
        &self,
        resource: &ResourceKey,
        network: Network,
    ) -> Result<Vec<Activation>, StoreError> {
        let mut guard = self.state.lock();
        guard.counters.list_activations += 1;
        let key = (resource.clone(), network);
        let State {
            activations,
            scripts,
            ..
        } = &mut *guard;
        // Scripts only advance when there is a record to apply them to, so
        // a pre-submission listing does not eat the progression.
        if let Some(record) = activations.get_mut(&key).and_then(|records| records.last_mut()) {
            if let Some(status) = scripts.get_mut(&key).and_then(VecDeque::pop_front) {
                record.status = status;
                if status == ActivationStatus::Active && record.activated_at.is_none() {
                    record.activated_at = Some(Utc::now());
                }
            }
        }
        Ok(activations.get(&key).cloned().unwrap_or_default())
    }

    async fn activate_version(
        &self,
        resource: &ResourceKey,
        version: PolicyVersionNumber,
        network: Network,
        associated_properties: &[String],
    ) -> Result<Activation, StoreError> {
        let mut state = self.state.lock();
        state.counters.activate_version += 1;
        let key = (resource.clone(), network);
        let records = state.activations.entry(key).or_default();
        if let Some(existing) = records.iter_mut().find(|a| a.version == version) {
            existing.status = ActivationStatus::Pending;
            existing.submitted_at = Some(Utc::now());
            return Ok(existing.clone());
        }
        let activation = Activation {
            resource: resource.clone(),
            network,
            version,
            status: ActivationStatus::Pending,
            submitted_at: Some(Utc::now()),
            activated_at: None,
            associated_properties: associated_properties.to_vec(),
        };
        records.push(activation.clone());
        Ok(activation)
    }

    async fn deactivate_version(
        &self,
        resource: &ResourceKey,
        version: PolicyVersionNumber,
        network: Network,
    ) -> Result<Activation, StoreError> {
        let mut state = self.state.lock();
        state.counters.deactivate_version += 1;
        let key = (resource.clone(), network);
        let record = state
            .activations
            .get_mut(&key)
            .and_then(|records| records.iter_mut().find(|a| a.version == version))
            .ok_or_else(|| not_found("activation", version))?;
        record.status = ActivationStatus::Pending;
        record.submitted_at = Some(Utc::now());
        Ok(record.clone())
    }
}
