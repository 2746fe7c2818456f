use std::fmt;

use serde::{Deserialize, Serialize};

/// Artifact kinds fetched and locked independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegoObjectCategory {
    AttackTracks,
    Controls,
    DefaultConfigInputs,
    ExceptionPolicies,
    Frameworks,
    Rules,
}

impl RegoObjectCategory {
    /// Every category, alphabetical by name. Write locks are taken in this order.
    pub const ALL: [RegoObjectCategory; 6] = [
        RegoObjectCategory::AttackTracks,
        RegoObjectCategory::Controls,
        RegoObjectCategory::DefaultConfigInputs,
        RegoObjectCategory::ExceptionPolicies,
        RegoObjectCategory::Frameworks,
        RegoObjectCategory::Rules,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegoObjectCategory::AttackTracks => "AttackTracks",
            RegoObjectCategory::Controls => "Controls",
            RegoObjectCategory::DefaultConfigInputs => "DefaultConfigInputs",
            RegoObjectCategory::ExceptionPolicies => "ExceptionPolicies",
            RegoObjectCategory::Frameworks => "Frameworks",
            RegoObjectCategory::Rules => "Rules",
        }
    }

    /// Release asset name without extension.
    pub fn artifact_name(&self) -> &'static str {
        match self {
            RegoObjectCategory::AttackTracks => "attack_tracks",
            RegoObjectCategory::Controls => "controls",
            RegoObjectCategory::DefaultConfigInputs => "default-config-inputs",
            RegoObjectCategory::ExceptionPolicies => "exceptions",
            RegoObjectCategory::Frameworks => "frameworks",
            RegoObjectCategory::Rules => "rules",
        }
    }
}

impl fmt::Display for RegoObjectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
