#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use regostore_policy_store::{ArtifactFetcher, FetchError, RegoObjectCategory, StoreCoordinates};
use serde_json::json;

/// Serves versioned payloads; every framework, control and rule name carries
/// the current version so tests can tell which cycle produced a value.
pub struct ScriptedFetcher {
    version: AtomicU64,
    frameworks_fetches: AtomicU64,
    failing: Mutex<HashSet<RegoObjectCategory>>,
    malformed: Mutex<HashSet<RegoObjectCategory>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self {
            version: AtomicU64::new(1),
            frameworks_fetches: AtomicU64::new(0),
            failing: Mutex::new(HashSet::new()),
            malformed: Mutex::new(HashSet::new()),
        }
    }

    pub fn set_version(&self, version: u64) {
        self.version.store(version, Ordering::SeqCst);
    }

    pub fn fail_on(&self, category: RegoObjectCategory) {
        self.failing.lock().insert(category);
    }

    pub fn corrupt(&self, category: RegoObjectCategory) {
        self.malformed.lock().insert(category);
    }

    pub fn heal(&self) {
        self.failing.lock().clear();
        self.malformed.lock().clear();
    }

    /// Each cycle fetches frameworks exactly once.
    pub fn cycles_seen(&self) -> u64 {
        self.frameworks_fetches.load(Ordering::SeqCst)
    }

    fn category_for(path: &str) -> Option<RegoObjectCategory> {
        let name = path.trim_end_matches(".json");
        RegoObjectCategory::ALL
            .into_iter()
            .find(|category| category.artifact_name() == name)
    }
}

#[async_trait]
impl ArtifactFetcher for ScriptedFetcher {
    async fn fetch(&self, _root: &str, relative_path: &str) -> Result<Vec<u8>, FetchError> {
        let category = Self::category_for(relative_path)
            .ok_or_else(|| FetchError::NotFound(relative_path.to_string()))?;
        if category == RegoObjectCategory::Frameworks {
            self.frameworks_fetches.fetch_add(1, Ordering::SeqCst);
        }
        if self.failing.lock().contains(&category) {
            return Err(FetchError::Transport(format!("{relative_path}: connection reset")));
        }
        if self.malformed.lock().contains(&category) {
            return Ok(b"<html>rate limited</html>".to_vec());
        }
        let version = self.version.load(Ordering::SeqCst);
        Ok(payload(category, version))
    }
}

pub fn payload(category: RegoObjectCategory, version: u64) -> Vec<u8> {
    let value = match category {
        RegoObjectCategory::Frameworks => json!([
            {"name": format!("NSA-v{version}"), "controlsIDs": ["C-0001", "C-0002"]},
            {"name": format!("MITRE-v{version}"), "controlsIDs": ["C-0002", "C-9999"]}
        ]),
        RegoObjectCategory::Controls => json!([
            {"controlID": "C-0001", "name": format!("Privileged container v{version}"), "rulesNames": ["rule-privileged"]},
            {"controlID": "C-0002", "name": format!("Exec into container v{version}"), "rulesNames": ["rule-exec", "rule-missing"]}
        ]),
        RegoObjectCategory::Rules => json!([
            {"name": "rule-privileged", "rule": format!("package armo_builtins # v{version}")},
            {"name": "rule-exec", "rule": format!("package armo_builtins # v{version}")}
        ]),
        RegoObjectCategory::AttackTracks => json!([
            {
                "apiVersion": "regolibrary.kubescape/v1alpha1",
                "kind": "AttackTrack",
                "metadata": {"name": format!("container-v{version}")},
                "spec": {"version": version}
            }
        ]),
        RegoObjectCategory::ExceptionPolicies => json!([
            {"name": format!("exclude-kube-system-v{version}"), "policyType": "postureExceptionPolicy", "actions": ["alertOnly"]}
        ]),
        RegoObjectCategory::DefaultConfigInputs => json!({
            "name": format!("default-v{version}"),
            "settings": {"postureControlInputs": {"imageRepositoryAllowList": []}}
        }),
    };
    serde_json::to_vec(&value).unwrap_or_default()
}

pub fn pinned_coordinates(refresh_interval_minutes: i64) -> StoreCoordinates {
    StoreCoordinates::new(
        "https://example.invalid",
        "kubescape",
        "regolibrary",
        "releases",
        "v2.0.0",
    )
    .with_refresh_interval(refresh_interval_minutes)
}
