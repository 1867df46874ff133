//! Version lifecycle integration tests: immutability routing, fail-fast
//! validation, teardown, and the end-to-end activation scenarios.

use std::sync::Arc;
use std::time::Duration;

use clp_engine::{EngineError, PollConfig, VersionContent, VersionLifecycleManager};
use clp_model::{
    ActivationStatus, GroupId, MatchRule, Network, PhasedReleaseRule, Policy, PolicyFlavor,
    PolicyId, PolicyVersionNumber, ResourceKey, WeightedTarget,
};
use clp_testkit::InMemoryPolicyStore;
use pretty_assertions::assert_eq;
use tokio::sync::watch;

const POLICY_ID: PolicyId = PolicyId::new(100);

fn fast_config() -> PollConfig {
    PollConfig::new()
        .with_poll_interval(Duration::from_millis(1))
        .with_timeout(Some(Duration::from_secs(5)))
        .with_delete_retry_backoff(Duration::from_millis(1))
}

fn seeded_store() -> Arc<InMemoryPolicyStore> {
    let store = Arc::new(InMemoryPolicyStore::new());
    store.seed_policy(Policy {
        policy_id: POLICY_ID,
        name: "checkout-rollout".to_string(),
        group_id: GroupId::new(12),
        flavor: PolicyFlavor::PhasedRelease,
        description: None,
    });
    store
}

fn manager(store: &Arc<InMemoryPolicyStore>, config: PollConfig) -> VersionLifecycleManager {
    VersionLifecycleManager::new(
        Arc::clone(store) as Arc<dyn clp_engine::PolicyStore>,
        config,
    )
}

fn split_content(weights: &[(&str, u32)]) -> VersionContent {
    VersionContent {
        description: Some("traffic split".to_string()),
        match_rules: vec![MatchRule::PhasedRelease(PhasedReleaseRule {
            name: "split".to_string(),
            forward_settings: weights
                .iter()
                .map(|(origin, percent)| WeightedTarget {
                    origin_id: (*origin).to_string(),
                    percent: *percent,
                })
                .collect(),
            ..PhasedReleaseRule::default()
        })],
    }
}

fn rule_weights(rule: &MatchRule) -> Vec<u32> {
    let MatchRule::PhasedRelease(cd) = rule else {
        panic!("expected a phased-release rule");
    };
    cd.forward_settings.iter().map(|t| t.percent).collect()
}

#[tokio::test]
async fn first_change_creates_version_one() {
    let store = seeded_store();
    let manager = manager(&store, fast_config());

    let version = manager
        .create_or_update(
            POLICY_ID,
            PolicyFlavor::PhasedRelease,
            split_content(&[("a", 60), ("b", 40)]),
            None,
        )
        .await
        .expect("first version");

    assert_eq!(version.version, PolicyVersionNumber::new(1));
    assert_eq!(store.counters().create_policy_version, 1);
    assert_eq!(store.counters().update_policy_version, 0);
}

#[tokio::test]
async fn mutable_version_is_updated_in_place() {
    let store = seeded_store();
    let manager = manager(&store, fast_config());

    manager
        .create_or_update(
            POLICY_ID,
            PolicyFlavor::PhasedRelease,
            split_content(&[("a", 60), ("b", 40)]),
            None,
        )
        .await
        .expect("first version");
    let updated = manager
        .create_or_update(
            POLICY_ID,
            PolicyFlavor::PhasedRelease,
            split_content(&[("a", 50), ("b", 50)]),
            None,
        )
        .await
        .expect("in-place update");

    // No activation exists, so version 1 was mutated, not superseded.
    assert_eq!(updated.version, PolicyVersionNumber::new(1));
    assert_eq!(store.counters().create_policy_version, 1);
    assert_eq!(store.counters().update_policy_version, 1);
    let stored = store
        .stored_version(POLICY_ID, PolicyVersionNumber::new(1))
        .expect("version 1");
    assert_eq!(rule_weights(&stored.match_rules[0]), vec![50, 50]);
}

#[tokio::test]
async fn active_version_routes_update_to_a_new_version() {
    let store = seeded_store();
    let manager = manager(&store, fast_config());

    manager
        .create_or_update(
            POLICY_ID,
            PolicyFlavor::PhasedRelease,
            split_content(&[("a", 60), ("b", 40)]),
            None,
        )
        .await
        .expect("first version");
    store.seed_activation(
        "100",
        Network::Staging,
        PolicyVersionNumber::new(1),
        ActivationStatus::Active,
    );

    let updated = manager
        .create_or_update(
            POLICY_ID,
            PolicyFlavor::PhasedRelease,
            split_content(&[("a", 50), ("b", 50)]),
            None,
        )
        .await
        .expect("routed to new version");

    assert_eq!(updated.version, PolicyVersionNumber::new(2));
    // Version 1 is untouched and still active on staging.
    let original = store
        .stored_version(POLICY_ID, PolicyVersionNumber::new(1))
        .expect("version 1");
    assert_eq!(rule_weights(&original.match_rules[0]), vec![60, 40]);
    assert_eq!(
        store.activation_status("100", Network::Staging, PolicyVersionNumber::new(1)),
        Some(ActivationStatus::Active)
    );
}

#[tokio::test]
async fn pending_activation_also_makes_a_version_immutable() {
    let store = seeded_store();
    let manager = manager(&store, fast_config());

    manager
        .create_or_update(
            POLICY_ID,
            PolicyFlavor::PhasedRelease,
            split_content(&[("a", 60), ("b", 40)]),
            None,
        )
        .await
        .expect("first version");
    store.seed_activation(
        "100",
        Network::Production,
        PolicyVersionNumber::new(1),
        ActivationStatus::Pending,
    );

    let updated = manager
        .create_or_update(
            POLICY_ID,
            PolicyFlavor::PhasedRelease,
            split_content(&[("a", 50), ("b", 50)]),
            None,
        )
        .await
        .expect("routed to new version");
    assert_eq!(updated.version, PolicyVersionNumber::new(2));
}

#[tokio::test]
async fn invalid_rules_fail_before_any_remote_mutation() {
    let store = seeded_store();
    let manager = manager(&store, fast_config());

    let err = manager
        .create_or_update(
            POLICY_ID,
            PolicyFlavor::PhasedRelease,
            split_content(&[("a", 60), ("b", 39)]),
            None,
        )
        .await
        .expect_err("weights sum to 99");

    let EngineError::Validation(validation) = err else {
        panic!("expected a validation error");
    };
    assert!(
        validation
            .violations
            .iter()
            .any(|v| v.message.contains("got 99"))
    );
    assert_eq!(store.counters().create_policy_version, 0);
    assert_eq!(store.counters().update_policy_version, 0);
    assert_eq!(store.counters().list_activations, 0);
}

#[tokio::test]
async fn end_to_end_create_then_activate_on_staging() {
    let store = seeded_store();
    let manager = manager(&store, fast_config());
    let (_tx, mut cancel) = watch::channel(false);

    let version = manager
        .create_or_update(
            POLICY_ID,
            PolicyFlavor::PhasedRelease,
            split_content(&[("a", 60), ("b", 40)]),
            None,
        )
        .await
        .expect("version 1 created");
    assert_eq!(version.version, PolicyVersionNumber::new(1));

    store.script_statuses(
        "100",
        Network::Staging,
        [ActivationStatus::Pending, ActivationStatus::Active],
    );
    let activation = manager
        .activations()
        .activate(
            &ResourceKey::from(POLICY_ID),
            version.version,
            Network::Staging,
            &[],
            &mut cancel,
        )
        .await
        .expect("activation reaches active");

    assert_eq!(activation.status, ActivationStatus::Active);
    assert_eq!(activation.version, PolicyVersionNumber::new(1));
}

#[tokio::test]
async fn delete_deactivates_then_removes_versions_and_container() {
    let store = seeded_store();
    let manager = manager(&store, fast_config());
    let (_tx, mut cancel) = watch::channel(false);

    manager
        .create_or_update(
            POLICY_ID,
            PolicyFlavor::PhasedRelease,
            split_content(&[("a", 60), ("b", 40)]),
            None,
        )
        .await
        .expect("version 1");
    store.seed_activation(
        "100",
        Network::Staging,
        PolicyVersionNumber::new(1),
        ActivationStatus::Active,
    );
    manager
        .create_or_update(
            POLICY_ID,
            PolicyFlavor::PhasedRelease,
            split_content(&[("a", 50), ("b", 50)]),
            None,
        )
        .await
        .expect("version 2");

    // Sweep listing, short-circuit listing, then two polls.
    store.script_statuses(
        "100",
        Network::Staging,
        [
            ActivationStatus::Active,
            ActivationStatus::Active,
            ActivationStatus::Pending,
            ActivationStatus::Inactive,
        ],
    );

    manager
        .delete(POLICY_ID, &mut cancel)
        .await
        .expect("teardown");

    assert!(!store.policy_exists(POLICY_ID));
    assert_eq!(store.counters().deactivate_version, 1);
    assert_eq!(store.counters().delete_policy_version, 2);
    assert_eq!(store.counters().delete_policy, 1);
}

#[tokio::test]
async fn delete_retries_pending_conflicts_within_the_bound() {
    let store = seeded_store();
    let manager = manager(&store, fast_config());
    let (_tx, mut cancel) = watch::channel(false);

    store.fail_delete_policy_times(2);
    manager
        .delete(POLICY_ID, &mut cancel)
        .await
        .expect("third attempt succeeds");
    assert_eq!(store.counters().delete_policy, 3);
    assert!(!store.policy_exists(POLICY_ID));
}

#[tokio::test]
async fn delete_surfaces_conflict_after_exhausting_retries() {
    let store = seeded_store();
    let manager = manager(&store, fast_config());
    let (_tx, mut cancel) = watch::channel(false);

    store.fail_delete_policy_times(5);
    let err = manager
        .delete(POLICY_ID, &mut cancel)
        .await
        .expect_err("conflict outlives the retry bound");

    match err {
        EngineError::DeleteConflictExhausted {
            policy_id,
            attempts,
        } => {
            assert_eq!(policy_id, POLICY_ID);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected DeleteConflictExhausted, got {other:?}"),
    }
    assert!(store.policy_exists(POLICY_ID));
}

#[tokio::test]
async fn explicit_target_version_is_respected() {
    let store = seeded_store();
    let manager = manager(&store, fast_config());

    manager
        .create_or_update(
            POLICY_ID,
            PolicyFlavor::PhasedRelease,
            split_content(&[("a", 60), ("b", 40)]),
            None,
        )
        .await
        .expect("version 1");
    manager
        .create_or_update(
            POLICY_ID,
            PolicyFlavor::PhasedRelease,
            split_content(&[("a", 70), ("b", 30)]),
            None,
        )
        .await
        .expect("in-place update of version 1");
    store.seed_activation(
        "100",
        Network::Staging,
        PolicyVersionNumber::new(1),
        ActivationStatus::Active,
    );

    // Explicitly targeting the now-immutable version 1 creates version 2.
    let updated = manager
        .create_or_update(
            POLICY_ID,
            PolicyFlavor::PhasedRelease,
            split_content(&[("a", 50), ("b", 50)]),
            Some(PolicyVersionNumber::new(1)),
        )
        .await
        .expect("new version");
    assert_eq!(updated.version, PolicyVersionNumber::new(2));
}
