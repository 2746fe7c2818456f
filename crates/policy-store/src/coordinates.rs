use serde::{Deserialize, Serialize};

use crate::category::RegoObjectCategory;

/// Tag fragments that mark a release as floating rather than pinned.
pub const FLOATING_TAG_MARKERS: [&str; 2] = ["latest", "download"];
pub const DEFAULT_BRANCH: &str = "master";
pub const ARTIFACT_EXTENSION: &str = ".json";
/// Longest accepted refresh interval, one leap year.
pub const MAX_REFRESH_INTERVAL_MINUTES: i64 = 366 * 24 * 60;

/// Where the policy artifacts live. Built once per store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCoordinates {
    pub base_location: String,
    pub owner: String,
    pub repository: String,
    pub path: String,
    pub tag: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub refresh_interval_minutes: i64,
}

impl StoreCoordinates {
    pub fn new(
        base_location: impl Into<String>,
        owner: impl Into<String>,
        repository: impl Into<String>,
        path: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            base_location: base_location.into(),
            owner: owner.into(),
            repository: repository.into(),
            path: path.into(),
            tag: tag.into(),
            branch: String::new(),
            refresh_interval_minutes: 0,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_refresh_interval(mut self, minutes: i64) -> Self {
        self.refresh_interval_minutes = minutes;
        self
    }

    /// Public release files: `https://github.com/kubescape/regolibrary/releases/latest/download`.
    pub fn production(refresh_interval_minutes: i64) -> Self {
        Self::new(
            "https://github.com",
            "kubescape",
            "regolibrary",
            "releases",
            "latest/download",
        )
        .with_refresh_interval(refresh_interval_minutes)
    }

    /// Pre-release files published from the `dev` branch.
    pub fn development(refresh_interval_minutes: i64) -> Self {
        Self::new(
            "https://raw.githubusercontent.com",
            "kubescape",
            "regolibrary",
            "releaseDev",
            "",
        )
        .with_branch("dev")
        .with_refresh_interval(refresh_interval_minutes)
    }

    /// A positive interval turns on background refresh.
    pub fn watch(&self) -> bool {
        self.refresh_interval_minutes > 0
    }

    pub fn is_floating_tag(&self) -> bool {
        FLOATING_TAG_MARKERS
            .iter()
            .any(|marker| self.tag.contains(marker))
    }
}

/// Output of [`resolve_root`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSource {
    pub root: String,
    pub branch: String,
    pub strip_file_extension: bool,
}

impl ResolvedSource {
    /// Path of a category's artifact relative to `root`.
    pub fn artifact_path(&self, category: RegoObjectCategory) -> String {
        if self.strip_file_extension {
            category.artifact_name().to_string()
        } else {
            format!("{}{}", category.artifact_name(), ARTIFACT_EXTENSION)
        }
    }

    pub fn artifact_url(&self, category: RegoObjectCategory) -> String {
        join_url(&self.root, &self.artifact_path(category))
    }
}

/// Computes the fetch root for a set of coordinates.
///
/// Floating tags strip artifact extensions, and a default-branch pin next to a
/// floating tag is dropped so the tag resolves on its own.
pub fn resolve_root(coordinates: &StoreCoordinates) -> ResolvedSource {
    let mut branch = coordinates.branch.clone();
    let strip_file_extension = coordinates.is_floating_tag();
    if strip_file_extension && branch.eq_ignore_ascii_case(DEFAULT_BRANCH) {
        branch.clear();
    }

    let segments = [
        coordinates.base_location.as_str(),
        coordinates.owner.as_str(),
        coordinates.repository.as_str(),
        coordinates.path.as_str(),
        coordinates.tag.as_str(),
        branch.as_str(),
    ];
    let root = segments
        .iter()
        .fold(String::new(), |acc, segment| join_url(&acc, segment));

    ResolvedSource {
        root,
        branch,
        strip_file_extension,
    }
}

pub(crate) fn join_url(base: &str, segment: &str) -> String {
    let segment = segment.trim_matches('/');
    if segment.is_empty() {
        return base.to_string();
    }
    if base.is_empty() {
        return segment.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), segment)
}
