mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{pinned_coordinates, ScriptedFetcher};
use regostore_policy_store::{
    PolicyReader, RefreshCause, RegoObjectCategory, RegoStore, SchedulerState,
};

#[tokio::test(start_paused = true)]
async fn one_shot_store_fetches_once_and_never_schedules() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let store = RegoStore::builder(pinned_coordinates(0))
        .with_fetcher(fetcher.clone())
        .open()
        .await
        .unwrap();

    assert_eq!(fetcher.cycles_seen(), 1);
    assert_eq!(store.scheduler_state(), SchedulerState::Stopped);
    assert!(!store.start_watching());

    tokio::time::sleep(Duration::from_secs(6 * 3600)).await;
    assert_eq!(fetcher.cycles_seen(), 1);
    assert_eq!(store.generation(), 1);
}

#[tokio::test]
async fn negative_interval_is_one_shot() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let store = RegoStore::builder(pinned_coordinates(-1))
        .with_fetcher(fetcher.clone())
        .open()
        .await
        .unwrap();
    assert_eq!(store.scheduler_state(), SchedulerState::Stopped);
    assert!(store.refresh_period().is_none());
}

#[tokio::test]
async fn failed_refresh_leaves_every_category_untouched() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let store = RegoStore::builder(pinned_coordinates(0))
        .with_fetcher(fetcher.clone())
        .open()
        .await
        .unwrap();

    let frameworks = store.frameworks();
    let controls = store.controls();
    let rules = store.rules();
    let attack_tracks = store.attack_tracks();
    let exceptions = store.exception_policies();
    let inputs = store.default_config_inputs();
    let control_rules = store.control_rule_relations();
    let framework_controls = store.framework_control_relations();

    fetcher.set_version(2);
    fetcher.fail_on(RegoObjectCategory::Controls);
    let err = store.refresh_once().await.unwrap_err();
    assert_eq!(err.category, RegoObjectCategory::Controls);
    assert!(err.is_fetch());

    assert!(Arc::ptr_eq(&frameworks, &store.frameworks()));
    assert!(Arc::ptr_eq(&controls, &store.controls()));
    assert!(Arc::ptr_eq(&rules, &store.rules()));
    assert!(Arc::ptr_eq(&attack_tracks, &store.attack_tracks()));
    assert!(Arc::ptr_eq(&exceptions, &store.exception_policies()));
    assert!(Arc::ptr_eq(&inputs, &store.default_config_inputs()));
    assert!(Arc::ptr_eq(&control_rules, &store.control_rule_relations()));
    assert!(Arc::ptr_eq(
        &framework_controls,
        &store.framework_control_relations()
    ));
    for category in RegoObjectCategory::ALL {
        assert_eq!(store.category_generation(category), 1);
    }
    assert_eq!(store.framework_names(), vec!["NSA-v1", "MITRE-v1"]);

    let metrics = store.metrics().snapshot();
    assert_eq!(metrics.cycles_succeeded, 1);
    assert_eq!(metrics.cycles_failed, 1);
    assert_eq!(
        metrics.last_failed_category,
        Some(RegoObjectCategory::Controls)
    );
}

#[tokio::test]
async fn malformed_payload_aborts_the_cycle() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let store = RegoStore::builder(pinned_coordinates(0))
        .with_fetcher(fetcher.clone())
        .open()
        .await
        .unwrap();

    fetcher.set_version(2);
    fetcher.corrupt(RegoObjectCategory::DefaultConfigInputs);
    let err = store.refresh_once().await.unwrap_err();
    assert_eq!(err.category, RegoObjectCategory::DefaultConfigInputs);
    assert!(matches!(err.cause, RefreshCause::Parse(_)));
    assert_eq!(store.default_config_inputs().name, "default-v1");
    assert_eq!(store.generation(), 1);

    fetcher.heal();
    assert_eq!(store.refresh_once().await.unwrap(), 2);
    assert_eq!(store.default_config_inputs().name, "default-v2");
    assert_eq!(store.rules()[0].rule, "package armo_builtins # v2");
}

#[tokio::test]
async fn open_surfaces_first_cycle_failure() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.fail_on(RegoObjectCategory::AttackTracks);
    let err = RegoStore::builder(pinned_coordinates(0))
        .with_fetcher(fetcher)
        .open()
        .await
        .err()
        .unwrap();
    assert_eq!(err.category, RegoObjectCategory::AttackTracks);
}

#[tokio::test]
async fn lookups_resolve_relations_and_skip_dangling_ids() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let store = RegoStore::builder(pinned_coordinates(0))
        .with_fetcher(fetcher)
        .open()
        .await
        .unwrap();

    let nsa = store.framework_by_name("nsa-V1").unwrap();
    let ids: Vec<&str> = nsa
        .controls
        .iter()
        .map(|control| control.control_id.as_str())
        .collect();
    assert_eq!(ids, vec!["C-0001", "C-0002"]);
    assert_eq!(nsa.controls[0].rules[0].name, "rule-privileged");

    let mitre = store.framework_by_name("MITRE-v1").unwrap();
    assert_eq!(mitre.controls.len(), 1);
    assert!(store
        .framework_control_relations()
        .contains("MITRE-v1", "C-9999"));

    let exec = store.control_by_id("C-0002").unwrap();
    let rule_names: Vec<&str> = exec.rules.iter().map(|rule| rule.name.as_str()).collect();
    assert_eq!(rule_names, vec!["rule-exec"]);
    assert!(store
        .control_rule_relations()
        .contains("C-0002", "rule-missing"));

    assert!(store.control_by_name("privileged container v1").is_some());
    assert!(store.rule_by_name("rule-missing").is_none());
    assert_eq!(
        store.attack_track_by_name("container-v1").unwrap().kind,
        "AttackTrack"
    );
    assert_eq!(store.control_ids(), vec!["C-0001", "C-0002"]);
    assert_eq!(store.rule_names(), vec!["rule-privileged", "rule-exec"]);
    assert!(store.framework_by_name("CIS").is_none());
}

#[tokio::test]
async fn floating_tag_requests_extensionless_artifacts() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let coordinates = regostore_policy_store::StoreCoordinates::production(0).with_branch("master");
    let store = RegoStore::builder(coordinates)
        .with_fetcher(fetcher)
        .open()
        .await
        .unwrap();
    let source = store.resolved_source();
    assert!(source.strip_file_extension);
    assert_eq!(source.branch, "");
    assert_eq!(
        source.artifact_path(RegoObjectCategory::Rules),
        "rules".to_string()
    );
}
