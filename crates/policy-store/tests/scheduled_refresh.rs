mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{pinned_coordinates, ScriptedFetcher};
use parking_lot::Mutex;
use regostore_policy_store::{
    PolicyReader, RefreshError, RegoObjectCategory, RegoStore, SchedulerState,
};
use tokio::time::Instant;

async fn wait_for_cycles(store: &RegoStore, target: u64) {
    let period = store.refresh_period().expect("scheduled store");
    let deadline = Instant::now() + period * 2;
    while store.metrics().cycles_completed() < target {
        assert!(
            Instant::now() < deadline,
            "cycle {target} did not run within two periods"
        );
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn failed_third_cycle_keeps_cycle_two_and_retries_next_interval() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let reported: Arc<Mutex<Vec<RegoObjectCategory>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_reported = reported.clone();
    let started = Instant::now();
    let store = RegoStore::builder(pinned_coordinates(5))
        .with_fetcher(fetcher.clone())
        .with_error_sink(Arc::new(move |err: &RefreshError| {
            sink_reported.lock().push(err.category);
        }))
        .open()
        .await
        .unwrap();
    assert_eq!(store.scheduler_state(), SchedulerState::Running);
    assert_eq!(store.refresh_period(), Some(Duration::from_secs(300)));
    assert_eq!(store.metrics().cycles_completed(), 1);

    fetcher.set_version(2);
    wait_for_cycles(&store, 2).await;
    assert_eq!(store.framework_names(), vec!["NSA-v2", "MITRE-v2"]);
    assert_eq!(store.generation(), 2);

    fetcher.set_version(3);
    fetcher.fail_on(RegoObjectCategory::Rules);
    wait_for_cycles(&store, 3).await;
    assert_eq!(store.framework_names(), vec!["NSA-v2", "MITRE-v2"]);
    assert_eq!(store.default_config_inputs().name, "default-v2");
    assert_eq!(store.generation(), 2);
    assert_eq!(*reported.lock(), vec![RegoObjectCategory::Rules]);
    assert_eq!(store.scheduler_state(), SchedulerState::Running);

    fetcher.heal();
    fetcher.set_version(4);
    wait_for_cycles(&store, 4).await;
    assert_eq!(store.framework_names(), vec!["NSA-v4", "MITRE-v4"]);
    assert_eq!(store.generation(), 3);

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(15 * 60));
    assert!(elapsed < Duration::from_secs(15 * 60 + 5));

    assert!(store.stop_watching());
}

#[tokio::test(start_paused = true)]
async fn stop_watching_prevents_further_cycles() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let store = RegoStore::builder(pinned_coordinates(5))
        .with_fetcher(fetcher.clone())
        .open()
        .await
        .unwrap();

    wait_for_cycles(&store, 2).await;
    assert!(store.stop_watching());
    assert_eq!(store.scheduler_state(), SchedulerState::Stopped);
    assert!(!store.stop_watching());

    tokio::time::sleep(Duration::from_secs(30 * 60)).await;
    assert_eq!(fetcher.cycles_seen(), 2);

    assert!(store.start_watching());
    wait_for_cycles(&store, 3).await;
    store.shutdown();
}

#[tokio::test(start_paused = true)]
async fn start_keeps_watching_after_failed_first_cycle() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.fail_on(RegoObjectCategory::Frameworks);
    let (store, first) = RegoStore::builder(pinned_coordinates(5))
        .with_fetcher(fetcher.clone())
        .start()
        .await;
    assert_eq!(first.unwrap_err().category, RegoObjectCategory::Frameworks);
    assert_eq!(store.scheduler_state(), SchedulerState::Running);
    assert!(store.frameworks().is_empty());

    fetcher.heal();
    wait_for_cycles(&store, 2).await;
    assert_eq!(store.generation(), 1);
    assert_eq!(store.framework_names(), vec!["NSA-v1", "MITRE-v1"]);
}

#[tokio::test(start_paused = true)]
async fn panicking_error_sink_does_not_stop_the_scheduler() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let store = RegoStore::builder(pinned_coordinates(1))
        .with_fetcher(fetcher.clone())
        .with_error_sink(Arc::new(|_: &RefreshError| panic!("sink exploded")))
        .open()
        .await
        .unwrap();

    fetcher.fail_on(RegoObjectCategory::ExceptionPolicies);
    wait_for_cycles(&store, 2).await;
    fetcher.heal();
    wait_for_cycles(&store, 3).await;
    assert_eq!(store.metrics().cycles_failed(), 1);
    assert_eq!(store.generation(), 2);
    assert_eq!(store.scheduler_state(), SchedulerState::Running);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_store_ends_the_refresh_loop() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let store = RegoStore::builder(pinned_coordinates(5))
        .with_fetcher(fetcher.clone())
        .open()
        .await
        .unwrap();
    drop(store);

    tokio::time::sleep(Duration::from_secs(20 * 60)).await;
    assert_eq!(fetcher.cycles_seen(), 1);
}
