use std::sync::Arc;

use futures::future::try_join_all;
use regostore_core_types::{
    AttackTrack, Control, CustomerConfig, Framework, PolicyRule, PostureExceptionPolicy,
};
use tracing::debug;

use crate::category::RegoObjectCategory;
use crate::coordinates::ResolvedSource;
use crate::errors::{ParseError, RefreshError};
use crate::fetch::ArtifactFetcher;
use crate::parse::ArtifactParser;
use crate::relations::{derive_relations, RelationTables};

/// All categories from a single refresh cycle.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub attack_tracks: Arc<Vec<AttackTrack>>,
    pub controls: Arc<Vec<Control>>,
    pub default_config_inputs: Arc<CustomerConfig>,
    pub exception_policies: Arc<Vec<PostureExceptionPolicy>>,
    pub frameworks: Arc<Vec<Framework>>,
    pub rules: Arc<Vec<PolicyRule>>,
}

/// Runs one fetch/parse/derive cycle without touching any store.
#[derive(Clone)]
pub struct SnapshotBuilder {
    source: ResolvedSource,
    fetcher: Arc<dyn ArtifactFetcher>,
    parser: Arc<dyn ArtifactParser>,
}

impl SnapshotBuilder {
    pub fn new(
        source: ResolvedSource,
        fetcher: Arc<dyn ArtifactFetcher>,
        parser: Arc<dyn ArtifactParser>,
    ) -> Self {
        Self {
            source,
            fetcher,
            parser,
        }
    }

    pub fn source(&self) -> &ResolvedSource {
        &self.source
    }

    /// Fetches every category concurrently; the cycle fails on the first
    /// category that cannot be fetched or parsed.
    pub async fn build(&self) -> Result<(Snapshot, RelationTables), RefreshError> {
        let payloads = try_join_all(
            RegoObjectCategory::ALL
                .iter()
                .map(|category| self.fetch_category(*category)),
        )
        .await?;

        let mut snapshot = Snapshot::default();
        for (category, bytes) in payloads {
            self.parse_into(&mut snapshot, category, &bytes)
                .map_err(|err| RefreshError::new(category, err))?;
        }
        let relations = derive_relations(&snapshot);
        debug!(
            frameworks = snapshot.frameworks.len(),
            controls = snapshot.controls.len(),
            rules = snapshot.rules.len(),
            control_rules = relations.control_rules.len(),
            framework_controls = relations.framework_controls.len(),
            "candidate snapshot assembled"
        );
        Ok((snapshot, relations))
    }

    async fn fetch_category(
        &self,
        category: RegoObjectCategory,
    ) -> Result<(RegoObjectCategory, Vec<u8>), RefreshError> {
        let path = self.source.artifact_path(category);
        self.fetcher
            .fetch(&self.source.root, &path)
            .await
            .map(|bytes| (category, bytes))
            .map_err(|err| RefreshError::new(category, err))
    }

    fn parse_into(
        &self,
        snapshot: &mut Snapshot,
        category: RegoObjectCategory,
        bytes: &[u8],
    ) -> Result<(), ParseError> {
        let parser = self.parser.as_ref();
        match category {
            RegoObjectCategory::AttackTracks => {
                snapshot.attack_tracks = Arc::new(parser.parse_attack_tracks(bytes)?)
            }
            RegoObjectCategory::Controls => {
                snapshot.controls = Arc::new(parser.parse_controls(bytes)?)
            }
            RegoObjectCategory::DefaultConfigInputs => {
                snapshot.default_config_inputs =
                    Arc::new(parser.parse_default_config_inputs(bytes)?)
            }
            RegoObjectCategory::ExceptionPolicies => {
                snapshot.exception_policies = Arc::new(parser.parse_exception_policies(bytes)?)
            }
            RegoObjectCategory::Frameworks => {
                snapshot.frameworks = Arc::new(parser.parse_frameworks(bytes)?)
            }
            RegoObjectCategory::Rules => snapshot.rules = Arc::new(parser.parse_rules(bytes)?),
        }
        Ok(())
    }
}
