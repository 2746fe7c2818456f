use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::snapshot::Snapshot;

/// Many-to-many association between two identifier kinds.
///
/// `pairs` keeps insertion order (source collection order); the maps are
/// lookup indexes over the same pairs. Tables are built once and never
/// mutated after publication.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTable {
    pairs: Vec<(String, String)>,
    forward: BTreeMap<String, Vec<String>>,
    reverse: BTreeMap<String, Vec<String>>,
}

impl RelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, left: &str, right: &str) {
        let targets = self.forward.entry(left.to_string()).or_default();
        if targets.iter().any(|existing| existing == right) {
            return;
        }
        targets.push(right.to_string());
        self.reverse
            .entry(right.to_string())
            .or_default()
            .push(left.to_string());
        self.pairs.push((left.to_string(), right.to_string()));
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn contains(&self, left: &str, right: &str) -> bool {
        self.forward
            .get(left)
            .map(|targets| targets.iter().any(|target| target == right))
            .unwrap_or(false)
    }

    /// Right-hand ids associated with `left`, in recorded order.
    pub fn related_to(&self, left: &str) -> &[String] {
        self.forward.get(left).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Left-hand ids associated with `right`, in recorded order.
    pub fn related_from(&self, right: &str) -> &[String] {
        self.reverse.get(right).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Control→rule and framework→control tables derived from one snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTables {
    /// control id → rule name
    pub control_rules: RelationTable,
    /// framework name → control id
    pub framework_controls: RelationTable,
}

/// Derives both tables. References to ids missing from the snapshot are kept.
pub fn derive_relations(snapshot: &Snapshot) -> RelationTables {
    let mut control_rules = RelationTable::new();
    for control in snapshot.controls.iter() {
        for rule_name in control.referenced_rule_names() {
            control_rules.record(&control.control_id, rule_name);
        }
    }

    let mut framework_controls = RelationTable::new();
    for framework in snapshot.frameworks.iter() {
        for control_id in framework.referenced_control_ids() {
            framework_controls.record(&framework.name, control_id);
        }
    }

    RelationTables {
        control_rules,
        framework_controls,
    }
}
