use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single rego rule as published in `rules.json`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyRule {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    pub rule: String,
    #[serde(rename = "ruleLanguage", skip_serializing_if = "Option::is_none")]
    pub rule_language: Option<String>,
    #[serde(rename = "match")]
    pub match_rules: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    #[serde(rename = "ruleQuery", skip_serializing_if = "Option::is_none")]
    pub rule_query: Option<String>,
    #[serde(rename = "resourceEnumerator", skip_serializing_if = "Option::is_none")]
    pub resource_enumerator: Option<String>,
    pub attributes: Map<String, Value>,
}

/// A control groups rules under a stable `controlID`.
///
/// `rules_names` is the authoritative reference list in release payloads;
/// `rules` is only populated when a payload embeds them or when a lookup
/// resolves them from the control/rule relation table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Control {
    #[serde(rename = "controlID")]
    pub control_id: String,
    pub name: String,
    pub description: String,
    pub remediation: String,
    #[serde(rename = "baseScore", skip_serializing_if = "Option::is_none")]
    pub base_score: Option<f64>,
    #[serde(rename = "rulesNames")]
    pub rules_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<PolicyRule>,
    pub attributes: Map<String, Value>,
}

impl Control {
    /// Rule names referenced by this control, listed names first, then any
    /// embedded rule not already listed.
    pub fn referenced_rule_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules_names.iter().map(String::as_str).collect();
        for rule in &self.rules {
            if !names.contains(&rule.name.as_str()) {
                names.push(rule.name.as_str());
            }
        }
        names
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Framework {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    pub description: String,
    #[serde(rename = "controlsIDs")]
    pub controls_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub controls: Vec<Control>,
    pub attributes: Map<String, Value>,
}

impl Framework {
    /// Control ids referenced by this framework, same ordering rule as
    /// [`Control::referenced_rule_names`].
    pub fn referenced_control_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.controls_ids.iter().map(String::as_str).collect();
        for control in &self.controls {
            if !ids.contains(&control.control_id.as_str()) {
                ids.push(control.control_id.as_str());
            }
        }
        ids
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackTrackMetadata {
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackTrack {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: AttackTrackMetadata,
    pub spec: Value,
}

impl AttackTrack {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostureExceptionPolicy {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(rename = "policyType")]
    pub policy_type: String,
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
    #[serde(rename = "posturePolicies")]
    pub posture_policies: Vec<Value>,
}

/// Default configuration inputs consumed by rules (`default-config-inputs.json`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Value>,
    pub settings: Value,
}
