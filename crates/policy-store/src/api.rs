use std::mem;
use std::panic;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use regostore_core_types::{
    AttackTrack, Control, CustomerConfig, Framework, PolicyRule, PostureExceptionPolicy,
};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::category::RegoObjectCategory;
use crate::coordinates::{resolve_root, ResolvedSource, StoreCoordinates};
use crate::errors::RefreshError;
use crate::fetch::{ArtifactFetcher, HttpFetcher};
use crate::metrics::RefreshMetrics;
use crate::model::{StoreSettings, DEFAULT_FETCH_TIMEOUT_SECS};
use crate::parse::{ArtifactParser, JsonArtifactParser};
use crate::relations::{RelationTable, RelationTables};
use crate::scheduler::{logging_sink, ErrorSink, RefreshScheduler, SchedulerState};
use crate::snapshot::{Snapshot, SnapshotBuilder};

/// A category value together with the publish that produced it.
#[derive(Debug)]
pub struct Published<T> {
    pub generation: u64,
    pub value: Arc<T>,
}

impl<T> Published<T> {
    pub fn new(generation: u64, value: Arc<T>) -> Self {
        Self { generation, value }
    }
}

impl<T> Clone for Published<T> {
    fn clone(&self) -> Self {
        Self {
            generation: self.generation,
            value: Arc::clone(&self.value),
        }
    }
}

impl<T: Default> Default for Published<T> {
    fn default() -> Self {
        Self::new(0, Arc::new(T::default()))
    }
}

/// Read side of the store. Each accessor observes one complete published
/// value of its category; two accessor calls may straddle a publish.
pub trait PolicyReader: Send + Sync {
    fn frameworks(&self) -> Arc<Vec<Framework>>;
    fn controls(&self) -> Arc<Vec<Control>>;
    fn rules(&self) -> Arc<Vec<PolicyRule>>;
    fn attack_tracks(&self) -> Arc<Vec<AttackTrack>>;
    fn exception_policies(&self) -> Arc<Vec<PostureExceptionPolicy>>;
    fn default_config_inputs(&self) -> Arc<CustomerConfig>;
    fn control_rule_relations(&self) -> Arc<RelationTable>;
    fn framework_control_relations(&self) -> Arc<RelationTable>;

    /// Case-insensitive; `controls` is filled from the framework/control
    /// relations, skipping ids with no matching control.
    fn framework_by_name(&self, name: &str) -> Option<Framework> {
        let mut framework = self
            .frameworks()
            .iter()
            .find(|framework| framework.name.eq_ignore_ascii_case(name))
            .cloned()?;
        framework.controls = self.controls_for_framework(&framework.name);
        Some(framework)
    }

    fn controls_for_framework(&self, framework_name: &str) -> Vec<Control> {
        let relations = self.framework_control_relations();
        let controls = self.controls();
        relations
            .related_to(framework_name)
            .iter()
            .filter_map(|id| controls.iter().find(|control| &control.control_id == id))
            .map(|control| self.with_resolved_rules(control.clone()))
            .collect()
    }

    fn control_by_id(&self, control_id: &str) -> Option<Control> {
        let control = self
            .controls()
            .iter()
            .find(|control| control.control_id.eq_ignore_ascii_case(control_id))
            .cloned()?;
        Some(self.with_resolved_rules(control))
    }

    fn control_by_name(&self, name: &str) -> Option<Control> {
        let control = self
            .controls()
            .iter()
            .find(|control| control.name.eq_ignore_ascii_case(name))
            .cloned()?;
        Some(self.with_resolved_rules(control))
    }

    fn rule_by_name(&self, name: &str) -> Option<PolicyRule> {
        self.rules()
            .iter()
            .find(|rule| rule.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    fn attack_track_by_name(&self, name: &str) -> Option<AttackTrack> {
        self.attack_tracks()
            .iter()
            .find(|track| track.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    fn framework_names(&self) -> Vec<String> {
        self.frameworks()
            .iter()
            .map(|framework| framework.name.clone())
            .collect()
    }

    fn control_ids(&self) -> Vec<String> {
        self.controls()
            .iter()
            .map(|control| control.control_id.clone())
            .collect()
    }

    fn control_names(&self) -> Vec<String> {
        self.controls()
            .iter()
            .map(|control| control.name.clone())
            .collect()
    }

    fn rule_names(&self) -> Vec<String> {
        self.rules().iter().map(|rule| rule.name.clone()).collect()
    }

    /// Replaces `rules` with the rules the control/rule table links to it.
    fn with_resolved_rules(&self, mut control: Control) -> Control {
        let relations = self.control_rule_relations();
        let rules = self.rules();
        control.rules = relations
            .related_to(&control.control_id)
            .iter()
            .filter_map(|name| rules.iter().find(|rule| &rule.name == name).cloned())
            .collect();
        control
    }
}

#[derive(Clone)]
pub struct RegoStoreBuilder {
    coordinates: StoreCoordinates,
    fetcher: Option<Arc<dyn ArtifactFetcher>>,
    parser: Arc<dyn ArtifactParser>,
    error_sink: ErrorSink,
    metrics: RefreshMetrics,
    fetch_timeout: Duration,
}

impl RegoStoreBuilder {
    pub fn new(coordinates: StoreCoordinates) -> Self {
        Self {
            coordinates,
            fetcher: None,
            parser: Arc::new(JsonArtifactParser),
            error_sink: logging_sink(),
            metrics: RefreshMetrics::default(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }

    pub fn from_settings(settings: &StoreSettings) -> Self {
        let mut builder = Self::new(settings.coordinates.clone());
        builder.fetch_timeout = settings.fetch_timeout();
        builder
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn ArtifactParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_error_sink(mut self, sink: ErrorSink) -> Self {
        self.error_sink = sink;
        self
    }

    pub fn with_metrics(mut self, metrics: RefreshMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// An empty store (generation 0); nothing is fetched.
    pub fn build(self) -> Arc<RegoStore> {
        let fetcher: Arc<dyn ArtifactFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(self.fetch_timeout)),
        };
        let source = resolve_root(&self.coordinates);
        let builder = SnapshotBuilder::new(source.clone(), fetcher, self.parser);
        Arc::new(RegoStore {
            scheduler: RefreshScheduler::new(self.coordinates.refresh_interval_minutes),
            coordinates: self.coordinates,
            source,
            builder,
            attack_tracks: RwLock::new(Published::default()),
            controls: RwLock::new(Published::default()),
            default_config_inputs: RwLock::new(Published::default()),
            exception_policies: RwLock::new(Published::default()),
            frameworks: RwLock::new(Published::default()),
            rules: RwLock::new(Published::default()),
            control_rules: RwLock::new(Published::default()),
            framework_controls: RwLock::new(Published::default()),
            generation: AtomicU64::new(0),
            refresh_gate: AsyncMutex::new(()),
            error_sink: self.error_sink,
            metrics: self.metrics,
        })
    }

    /// Runs exactly one refresh cycle before returning. With a positive
    /// interval the background scheduler starts afterwards; otherwise none is
    /// ever spawned.
    pub async fn open(self) -> Result<Arc<RegoStore>, RefreshError> {
        let store = self.build();
        store.refresh_once().await?;
        store.activate_scheduler();
        Ok(store)
    }

    /// Like [`open`](Self::open) but keeps the store, and keeps watching,
    /// when the first cycle fails.
    pub async fn start(self) -> (Arc<RegoStore>, Result<u64, RefreshError>) {
        let store = self.build();
        let first = store.refresh_once().await;
        store.activate_scheduler();
        (store, first)
    }
}

/// Holds the published policy artifacts behind one lock per category.
pub struct RegoStore {
    coordinates: StoreCoordinates,
    source: ResolvedSource,
    builder: SnapshotBuilder,
    attack_tracks: RwLock<Published<Vec<AttackTrack>>>,
    controls: RwLock<Published<Vec<Control>>>,
    default_config_inputs: RwLock<Published<CustomerConfig>>,
    exception_policies: RwLock<Published<Vec<PostureExceptionPolicy>>>,
    frameworks: RwLock<Published<Vec<Framework>>>,
    rules: RwLock<Published<Vec<PolicyRule>>>,
    control_rules: RwLock<Published<RelationTable>>,
    framework_controls: RwLock<Published<RelationTable>>,
    generation: AtomicU64,
    // one refresh cycle at a time, whether manual or scheduled
    refresh_gate: AsyncMutex<()>,
    scheduler: RefreshScheduler,
    error_sink: ErrorSink,
    metrics: RefreshMetrics,
}

impl RegoStore {
    pub fn builder(coordinates: StoreCoordinates) -> RegoStoreBuilder {
        RegoStoreBuilder::new(coordinates)
    }

    pub fn coordinates(&self) -> &StoreCoordinates {
        &self.coordinates
    }

    pub fn resolved_source(&self) -> &ResolvedSource {
        &self.source
    }

    pub fn metrics(&self) -> RefreshMetrics {
        self.metrics.clone()
    }

    /// Generation of the latest publish; 0 until the first one.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn category_generation(&self, category: RegoObjectCategory) -> u64 {
        match category {
            RegoObjectCategory::AttackTracks => self.attack_tracks.read().generation,
            RegoObjectCategory::Controls => self.controls.read().generation,
            RegoObjectCategory::DefaultConfigInputs => self.default_config_inputs.read().generation,
            RegoObjectCategory::ExceptionPolicies => self.exception_policies.read().generation,
            RegoObjectCategory::Frameworks => self.frameworks.read().generation,
            RegoObjectCategory::Rules => self.rules.read().generation,
        }
    }

    pub fn frameworks_published(&self) -> Published<Vec<Framework>> {
        self.frameworks.read().clone()
    }

    pub fn controls_published(&self) -> Published<Vec<Control>> {
        self.controls.read().clone()
    }

    pub fn rules_published(&self) -> Published<Vec<PolicyRule>> {
        self.rules.read().clone()
    }

    pub fn attack_tracks_published(&self) -> Published<Vec<AttackTrack>> {
        self.attack_tracks.read().clone()
    }

    pub fn exception_policies_published(&self) -> Published<Vec<PostureExceptionPolicy>> {
        self.exception_policies.read().clone()
    }

    pub fn default_config_inputs_published(&self) -> Published<CustomerConfig> {
        self.default_config_inputs.read().clone()
    }

    pub fn control_rule_relations_published(&self) -> Published<RelationTable> {
        self.control_rules.read().clone()
    }

    pub fn framework_control_relations_published(&self) -> Published<RelationTable> {
        self.framework_controls.read().clone()
    }

    /// Swaps in a complete snapshot and its relation tables.
    ///
    /// Category locks are taken in [`RegoObjectCategory::ALL`] order, then the
    /// relation locks. Only `Arc` swaps happen under the locks; the retired
    /// values are dropped after every lock is released.
    pub fn publish(&self, snapshot: Snapshot, relations: RelationTables) -> u64 {
        let Snapshot {
            attack_tracks,
            controls,
            default_config_inputs,
            exception_policies,
            frameworks,
            rules,
        } = snapshot;
        let RelationTables {
            control_rules,
            framework_controls,
        } = relations;

        let (generation, retired) = {
            let mut attack_tracks_slot = self.attack_tracks.write();
            let mut controls_slot = self.controls.write();
            let mut default_config_inputs_slot = self.default_config_inputs.write();
            let mut exception_policies_slot = self.exception_policies.write();
            let mut frameworks_slot = self.frameworks.write();
            let mut rules_slot = self.rules.write();
            let mut control_rules_slot = self.control_rules.write();
            let mut framework_controls_slot = self.framework_controls.write();

            let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
            let retired = (
                mem::replace(
                    &mut *attack_tracks_slot,
                    Published::new(generation, attack_tracks),
                ),
                mem::replace(&mut *controls_slot, Published::new(generation, controls)),
                mem::replace(
                    &mut *default_config_inputs_slot,
                    Published::new(generation, default_config_inputs),
                ),
                mem::replace(
                    &mut *exception_policies_slot,
                    Published::new(generation, exception_policies),
                ),
                mem::replace(&mut *frameworks_slot, Published::new(generation, frameworks)),
                mem::replace(&mut *rules_slot, Published::new(generation, rules)),
                mem::replace(
                    &mut *control_rules_slot,
                    Published::new(generation, Arc::new(control_rules)),
                ),
                mem::replace(
                    &mut *framework_controls_slot,
                    Published::new(generation, Arc::new(framework_controls)),
                ),
            );
            (generation, retired)
        };
        drop(retired);

        info!(generation, "published policy snapshot");
        generation
    }

    /// Builds a fresh snapshot and publishes it. On failure nothing published
    /// changes.
    pub async fn refresh_once(&self) -> Result<u64, RefreshError> {
        let _gate = self.refresh_gate.lock().await;
        self.metrics.record_cycle_started();
        match self.builder.build().await {
            Ok((snapshot, relations)) => {
                let generation = self.publish(snapshot, relations);
                self.metrics.record_cycle_succeeded(generation);
                Ok(generation)
            }
            Err(err) => {
                warn!(
                    category = %err.category,
                    error = %err,
                    generation = self.generation(),
                    "policy refresh failed; keeping published snapshot"
                );
                self.metrics.record_cycle_failed(&err);
                Err(err)
            }
        }
    }

    /// Starts periodic refresh. Returns false for one-shot stores or when
    /// already running.
    pub fn start_watching(self: &Arc<Self>) -> bool {
        self.scheduler.start(self)
    }

    pub fn stop_watching(&self) -> bool {
        self.scheduler.stop()
    }

    pub fn shutdown(&self) {
        self.scheduler.stop();
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn refresh_period(&self) -> Option<Duration> {
        self.scheduler.period()
    }

    pub(crate) fn report_error(&self, err: &RefreshError) {
        let sink = Arc::clone(&self.error_sink);
        if panic::catch_unwind(panic::AssertUnwindSafe(|| (sink)(err))).is_err() {
            warn!("policy refresh error sink panicked; continuing");
        }
    }

    fn activate_scheduler(self: &Arc<Self>) {
        if self.coordinates.watch() {
            self.start_watching();
        } else {
            self.scheduler.mark_stopped();
        }
    }
}

impl PolicyReader for RegoStore {
    fn frameworks(&self) -> Arc<Vec<Framework>> {
        Arc::clone(&self.frameworks.read().value)
    }

    fn controls(&self) -> Arc<Vec<Control>> {
        Arc::clone(&self.controls.read().value)
    }

    fn rules(&self) -> Arc<Vec<PolicyRule>> {
        Arc::clone(&self.rules.read().value)
    }

    fn attack_tracks(&self) -> Arc<Vec<AttackTrack>> {
        Arc::clone(&self.attack_tracks.read().value)
    }

    fn exception_policies(&self) -> Arc<Vec<PostureExceptionPolicy>> {
        Arc::clone(&self.exception_policies.read().value)
    }

    fn default_config_inputs(&self) -> Arc<CustomerConfig> {
        Arc::clone(&self.default_config_inputs.read().value)
    }

    fn control_rule_relations(&self) -> Arc<RelationTable> {
        Arc::clone(&self.control_rules.read().value)
    }

    fn framework_control_relations(&self) -> Arc<RelationTable> {
        Arc::clone(&self.framework_controls.read().value)
    }
}

impl Drop for RegoStore {
    fn drop(&mut self) {
        self.scheduler.stop();
    }
}
