//! Sync engine behaviour against in-memory stores

mod common;

use common::{map, vm, FakeComputeTags, FakeNodeLabels, RecordingSink};
use std::sync::atomic::Ordering;
use tag_label_sync::config::{ConfigOptions, ConflictPolicy, SyncDirection};
use tag_label_sync::sync::{Diagnostic, SyncEngine, SyncError, SyncPass};

const NODE: &str = "aks-nodepool1-12345678-vmss000000";

const LONG_VALUE: &str = "Good_night_good_night._parting_is_such_sweet_sorrow._That_I_shall_say_good_night_till_it_be_morrow";
const LONG_VALUE_TRUNCATED: &str = "Good_night_good_night._parting_is_such_sweet_sorrow._That_I_sha";

fn options(direction: SyncDirection, policy: ConflictPolicy) -> ConfigOptions {
    ConfigOptions {
        sync_direction: direction,
        conflict_policy: policy,
        ..ConfigOptions::default()
    }
}

#[tokio::test]
async fn test_arm_tags_become_prefixed_labels() {
    let tags = FakeComputeTags::with(map(&[("env", "prod")]));
    let labels = FakeNodeLabels::with(map(&[("kubernetes.io/arch", "amd64")]));
    let sink = RecordingSink::default();
    let engine = SyncEngine::new(&tags, &labels, &sink);
    let options = ConfigOptions::default();

    let outcome = engine.reconcile(NODE, &vm(), &options).await.unwrap();

    assert_eq!(outcome.labels_applied, 1);
    assert_eq!(outcome.tags_applied, 0);
    assert_eq!(
        labels.labels(),
        map(&[("azure.tags/env", "prod"), ("kubernetes.io/arch", "amd64")])
    );
    assert_eq!(labels.set_calls(), 1);
    assert_eq!(tags.set_calls(), 0);
    assert!(sink.take().is_empty());
}

#[tokio::test]
async fn test_second_pass_writes_nothing() {
    let tags = FakeComputeTags::with(map(&[("env", "prod"), ("team", "infra")]));
    let labels = FakeNodeLabels::with(map(&[
        ("agentpool", "nodepool1"),
        ("azure.tags/pool", "gpu"),
    ]));
    let sink = RecordingSink::default();
    let engine = SyncEngine::new(&tags, &labels, &sink);
    let options = options(SyncDirection::TwoWay, ConflictPolicy::ArmPrecedence);

    let first = engine.reconcile(NODE, &vm(), &options).await.unwrap();
    assert_eq!(first.labels_applied, 3);
    assert_eq!(first.tags_applied, 2);
    assert_eq!(labels.labels()["azure.tags/agentpool"], "nodepool1");
    let labels_after_first = labels.labels();
    let tags_after_first = tags.tags();

    let second = engine.reconcile(NODE, &vm(), &options).await.unwrap();
    assert!(second.is_noop());
    assert_eq!(labels.labels(), labels_after_first);
    assert_eq!(tags.tags(), tags_after_first);
    assert_eq!(labels.set_calls(), 1);
    assert_eq!(tags.set_calls(), 1);
}

#[tokio::test]
async fn test_unprefixed_label_converges_in_one_pass() {
    let tags = FakeComputeTags::default();
    let labels = FakeNodeLabels::with(map(&[("agentpool", "nodepool1")]));
    let sink = RecordingSink::default();
    let engine = SyncEngine::new(&tags, &labels, &sink);
    let options = options(SyncDirection::TwoWay, ConflictPolicy::ArmPrecedence);

    let first = engine.reconcile(NODE, &vm(), &options).await.unwrap();
    assert_eq!(first.tags_applied, 1);
    assert_eq!(first.labels_applied, 1);
    assert_eq!(tags.tags(), map(&[("agentpool", "nodepool1")]));
    assert_eq!(
        labels.labels(),
        map(&[
            ("agentpool", "nodepool1"),
            ("azure.tags/agentpool", "nodepool1"),
        ])
    );

    let second = engine.reconcile(NODE, &vm(), &options).await.unwrap();
    assert!(second.is_noop());
    assert_eq!(labels.set_calls(), 1);
    assert_eq!(tags.set_calls(), 1);
    assert!(sink.take().is_empty());
}

#[tokio::test]
async fn test_labels_mapping_to_one_tag_converge() {
    let tags = FakeComputeTags::with(map(&[("env", "c")]));
    let labels = FakeNodeLabels::with(map(&[("azure.tags/env", "b"), ("env", "a")]));
    let sink = RecordingSink::default();
    let engine = SyncEngine::new(&tags, &labels, &sink);
    let options = options(SyncDirection::TwoWay, ConflictPolicy::NodePrecedence);

    let first = engine.reconcile(NODE, &vm(), &options).await.unwrap();
    assert_eq!(first.tags_applied, 1);
    assert_eq!(first.labels_applied, 0);
    assert_eq!(tags.tags(), map(&[("env", "b")]));
    assert_eq!(
        sink.take(),
        vec![
            Diagnostic::Conflict {
                pass: SyncPass::TagsToLabels,
                key: "azure.tags/env".to_string(),
                existing: "b".to_string(),
                incoming: "c".to_string(),
            },
            Diagnostic::LabelNameCollision {
                tag: "env".to_string(),
                kept: "azure.tags/env".to_string(),
                skipped: "env".to_string(),
            },
        ]
    );

    for _ in 0..4 {
        let outcome = engine.reconcile(NODE, &vm(), &options).await.unwrap();
        assert!(outcome.is_noop());
        assert_eq!(tags.tags(), map(&[("env", "b")]));
    }
    assert_eq!(tags.set_calls(), 1);
    assert_eq!(labels.set_calls(), 0);
}

#[tokio::test]
async fn test_label_written_during_pass_is_kept() {
    let tags = FakeComputeTags::with(map(&[("env", "prod")]));
    let labels = FakeNodeLabels::default();
    labels.write_after_next_read("team", "infra");
    let sink = RecordingSink::default();
    let engine = SyncEngine::new(&tags, &labels, &sink);
    let options = ConfigOptions::default();

    let err = engine.reconcile(NODE, &vm(), &options).await.unwrap_err();
    assert!(matches!(err, SyncError::PersistLabels { .. }));
    assert_eq!(labels.labels(), map(&[("team", "infra")]));

    // The retry reads the other writer's label and builds on it
    let outcome = engine.reconcile(NODE, &vm(), &options).await.unwrap();
    assert_eq!(outcome.labels_applied, 1);
    assert_eq!(
        labels.labels(),
        map(&[("azure.tags/env", "prod"), ("team", "infra")])
    );
    assert_eq!(labels.set_calls(), 2);
}

#[tokio::test]
async fn test_two_way_arm_precedence_overwrites_label_and_reports_tag_conflict() {
    let tags = FakeComputeTags::with(map(&[("env", "prod")]));
    let labels = FakeNodeLabels::with(map(&[("azure.tags/env", "staging")]));
    let sink = RecordingSink::default();
    let engine = SyncEngine::new(&tags, &labels, &sink);
    let options = options(SyncDirection::TwoWay, ConflictPolicy::ArmPrecedence);

    let outcome = engine.reconcile(NODE, &vm(), &options).await.unwrap();

    assert_eq!(labels.labels(), map(&[("azure.tags/env", "prod")]));
    assert_eq!(tags.tags(), map(&[("env", "prod")]));
    assert_eq!(tags.set_calls(), 0);
    assert_eq!(outcome.diagnostics, 1);
    assert_eq!(
        sink.take(),
        vec![Diagnostic::Conflict {
            pass: SyncPass::LabelsToTags,
            key: "env".to_string(),
            existing: "prod".to_string(),
            incoming: "staging".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_two_way_node_precedence_overwrites_tag() {
    let tags = FakeComputeTags::with(map(&[("env", "prod")]));
    let labels = FakeNodeLabels::with(map(&[("azure.tags/env", "staging")]));
    let sink = RecordingSink::default();
    let engine = SyncEngine::new(&tags, &labels, &sink);
    let options = options(SyncDirection::TwoWay, ConflictPolicy::NodePrecedence);

    engine.reconcile(NODE, &vm(), &options).await.unwrap();

    assert_eq!(tags.tags(), map(&[("env", "staging")]));
    assert_eq!(labels.labels(), map(&[("azure.tags/env", "staging")]));
    assert_eq!(labels.set_calls(), 0);
    assert_eq!(
        sink.take(),
        vec![Diagnostic::Conflict {
            pass: SyncPass::TagsToLabels,
            key: "azure.tags/env".to_string(),
            existing: "staging".to_string(),
            incoming: "prod".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_ignore_policy_reports_both_sides_and_writes_nothing() {
    let tags = FakeComputeTags::with(map(&[("env", "prod")]));
    let labels = FakeNodeLabels::with(map(&[("azure.tags/env", "staging")]));
    let sink = RecordingSink::default();
    let engine = SyncEngine::new(&tags, &labels, &sink);
    let options = options(SyncDirection::TwoWay, ConflictPolicy::Ignore);

    let outcome = engine.reconcile(NODE, &vm(), &options).await.unwrap();

    assert!(outcome.is_noop());
    assert_eq!(outcome.diagnostics, 2);
    assert_eq!(labels.set_calls(), 0);
    assert_eq!(tags.set_calls(), 0);
}

#[tokio::test]
async fn test_node_to_arm_copies_labels_and_skips_system_labels() {
    let tags = FakeComputeTags::with(map(&[("env", "prod")]));
    let labels = FakeNodeLabels::with(map(&[
        ("azure.tags/team", "infra"),
        ("kubernetes.io/hostname", "aks-nodepool1-0"),
        ("pool", "gpu"),
    ]));
    let sink = RecordingSink::default();
    let engine = SyncEngine::new(&tags, &labels, &sink);
    let options = options(SyncDirection::NodeToArm, ConflictPolicy::ArmPrecedence);

    let outcome = engine.reconcile(NODE, &vm(), &options).await.unwrap();

    assert_eq!(outcome.tags_applied, 2);
    assert_eq!(
        tags.tags(),
        map(&[("env", "prod"), ("pool", "gpu"), ("team", "infra")])
    );
    // Tags are never copied to labels in this direction
    assert!(!labels.labels().contains_key("azure.tags/env"));
    assert_eq!(labels.set_calls(), 0);

    let diagnostics = sink.take();
    assert_eq!(
        diagnostics,
        vec![Diagnostic::InvalidTagName {
            label: "kubernetes.io/hostname".to_string(),
        }]
    );
    assert!(!diagnostics[0].publish_as_event());
}

#[tokio::test]
async fn test_arm_to_node_never_writes_tags() {
    let tags = FakeComputeTags::with(map(&[("env", "prod")]));
    let labels = FakeNodeLabels::with(map(&[("pool", "gpu")]));
    let sink = RecordingSink::default();
    let engine = SyncEngine::new(&tags, &labels, &sink);
    let options = options(SyncDirection::ArmToNode, ConflictPolicy::NodePrecedence);

    engine.reconcile(NODE, &vm(), &options).await.unwrap();

    assert_eq!(tags.tags(), map(&[("env", "prod")]));
    assert_eq!(tags.set_calls(), 0);
}

#[tokio::test]
async fn test_full_tag_set_blocks_labels_to_tags() {
    let tags = FakeComputeTags::with(map(&[("a", "1"), ("b", "2")]));
    let labels = FakeNodeLabels::with(map(&[("c", "3")]));
    let sink = RecordingSink::default();
    let engine = SyncEngine::new(&tags, &labels, &sink);
    let options = ConfigOptions {
        max_tags: 2,
        ..options(SyncDirection::NodeToArm, ConflictPolicy::ArmPrecedence)
    };

    let outcome = engine.reconcile(NODE, &vm(), &options).await.unwrap();

    assert!(outcome.is_noop());
    assert_eq!(tags.set_calls(), 0);
    assert_eq!(
        sink.take(),
        vec![Diagnostic::TagLimitReached { count: 2, max: 2 }]
    );
}

#[tokio::test]
async fn test_new_tags_stop_at_limit() {
    let tags = FakeComputeTags::with(map(&[("a", "1"), ("b", "2")]));
    let labels = FakeNodeLabels::with(map(&[("c", "3"), ("d", "4")]));
    let sink = RecordingSink::default();
    let engine = SyncEngine::new(&tags, &labels, &sink);
    let options = ConfigOptions {
        max_tags: 3,
        ..options(SyncDirection::NodeToArm, ConflictPolicy::ArmPrecedence)
    };

    let outcome = engine.reconcile(NODE, &vm(), &options).await.unwrap();

    assert_eq!(outcome.tags_applied, 1);
    assert_eq!(tags.tags(), map(&[("a", "1"), ("b", "2"), ("c", "3")]));
    assert_eq!(
        sink.take(),
        vec![Diagnostic::TagLimitReached { count: 3, max: 3 }]
    );
}

#[tokio::test]
async fn test_long_tag_value_converges() {
    let tags = FakeComputeTags::with(map(&[("motto", LONG_VALUE)]));
    let labels = FakeNodeLabels::default();
    let sink = RecordingSink::default();
    let engine = SyncEngine::new(&tags, &labels, &sink);
    let options = options(SyncDirection::TwoWay, ConflictPolicy::NodePrecedence);

    engine.reconcile(NODE, &vm(), &options).await.unwrap();
    assert_eq!(
        labels.labels(),
        map(&[("azure.tags/motto", LONG_VALUE_TRUNCATED)])
    );

    // The truncated label must not be written back over the full tag value
    let outcome = engine.reconcile(NODE, &vm(), &options).await.unwrap();
    assert!(outcome.is_noop());
    assert_eq!(tags.tags(), map(&[("motto", LONG_VALUE)]));
    assert_eq!(tags.set_calls(), 0);
    assert!(sink.take().is_empty());
}

#[tokio::test]
async fn test_invalid_label_is_skipped_and_others_applied() {
    let tags = FakeComputeTags::with(map(&[("cost center", "42"), ("env", "prod")]));
    let labels = FakeNodeLabels::default();
    let sink = RecordingSink::default();
    let engine = SyncEngine::new(&tags, &labels, &sink);

    let outcome = engine
        .reconcile(NODE, &vm(), &ConfigOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.labels_applied, 1);
    assert_eq!(labels.labels(), map(&[("azure.tags/env", "prod")]));
    assert_eq!(
        sink.take(),
        vec![Diagnostic::InvalidLabel {
            tag: "cost center".to_string(),
            label: "azure.tags/cost center".to_string(),
            value: "42".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_tag_name_collision_keeps_one_tag() {
    let tags = FakeComputeTags::with(map(&[("k8s-role", "b"), ("role", "a")]));
    let labels = FakeNodeLabels::default();
    let sink = RecordingSink::default();
    let engine = SyncEngine::new(&tags, &labels, &sink);
    let options = ConfigOptions {
        tag_prefix: "k8s-".to_string(),
        ..ConfigOptions::default()
    };

    engine.reconcile(NODE, &vm(), &options).await.unwrap();

    assert_eq!(labels.labels(), map(&[("azure.tags/role", "b")]));
    assert_eq!(
        sink.take(),
        vec![Diagnostic::TagNameCollision {
            label: "azure.tags/role".to_string(),
            kept: "k8s-role".to_string(),
            skipped: "role".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_fetch_failure_writes_nothing() {
    let tags = FakeComputeTags::with(map(&[("env", "prod")]));
    let labels = FakeNodeLabels::default();
    labels.fail_get.store(true, Ordering::SeqCst);
    let sink = RecordingSink::default();
    let engine = SyncEngine::new(&tags, &labels, &sink);

    let err = engine
        .reconcile(NODE, &vm(), &ConfigOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::FetchLabels { .. }));

    labels.fail_get.store(false, Ordering::SeqCst);
    tags.fail_get.store(true, Ordering::SeqCst);
    let err = engine
        .reconcile(NODE, &vm(), &ConfigOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::FetchTags { .. }));

    assert_eq!(labels.set_calls(), 0);
    assert_eq!(tags.set_calls(), 0);
}

#[tokio::test]
async fn test_label_persist_failure_does_not_block_tags() {
    let tags = FakeComputeTags::with(map(&[("env", "prod")]));
    let labels = FakeNodeLabels::with(map(&[("team", "infra")]));
    labels.fail_set.store(true, Ordering::SeqCst);
    let sink = RecordingSink::default();
    let engine = SyncEngine::new(&tags, &labels, &sink);
    let options = options(SyncDirection::TwoWay, ConflictPolicy::ArmPrecedence);

    let err = engine.reconcile(NODE, &vm(), &options).await.unwrap_err();

    assert!(matches!(err, SyncError::PersistLabels { .. }));
    assert_eq!(tags.tags(), map(&[("env", "prod"), ("team", "infra")]));
    assert_eq!(labels.labels(), map(&[("team", "infra")]));
}

#[tokio::test]
async fn test_both_persist_failures_are_returned() {
    let tags = FakeComputeTags::with(map(&[("env", "prod")]));
    let labels = FakeNodeLabels::with(map(&[("team", "infra")]));
    labels.fail_set.store(true, Ordering::SeqCst);
    tags.fail_set.store(true, Ordering::SeqCst);
    let sink = RecordingSink::default();
    let engine = SyncEngine::new(&tags, &labels, &sink);
    let options = options(SyncDirection::TwoWay, ConflictPolicy::ArmPrecedence);

    let err = engine.reconcile(NODE, &vm(), &options).await.unwrap_err();

    match err {
        SyncError::PersistBoth { labels, tags } => {
            assert!(matches!(*labels, SyncError::PersistLabels { .. }));
            assert!(matches!(*tags, SyncError::PersistTags { .. }));
        }
        other => panic!("expected PersistBoth, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unrecognized_policy_fails_only_on_conflict() {
    let sink = RecordingSink::default();
    let options = options(
        SyncDirection::TwoWay,
        ConflictPolicy::Unrecognized("tags-win".to_string()),
    );

    let tags = FakeComputeTags::with(map(&[("env", "prod")]));
    let labels = FakeNodeLabels::default();
    let engine = SyncEngine::new(&tags, &labels, &sink);
    engine.reconcile(NODE, &vm(), &options).await.unwrap();
    assert_eq!(labels.labels(), map(&[("azure.tags/env", "prod")]));

    let tags = FakeComputeTags::with(map(&[("env", "prod")]));
    let labels = FakeNodeLabels::with(map(&[("azure.tags/env", "staging")]));
    let engine = SyncEngine::new(&tags, &labels, &sink);
    let err = engine.reconcile(NODE, &vm(), &options).await.unwrap_err();
    assert!(matches!(err, SyncError::Config(ref raw) if raw == "tags-win"));
    assert_eq!(labels.set_calls(), 0);
    assert_eq!(tags.set_calls(), 0);
}
