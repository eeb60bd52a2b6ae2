//! Per-document rule overrides read from front-matter.
//!
//! ```yaml
//! auto-rewrite:
//!   smart-quotes: false        # disable
//!   title-case: true           # enable with the rule's own pattern
//!   mention: ["alice", "/bo+b/i", "{{mainRule}}"]
//! ```

use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideEntry {
    /// `true`: keep the rule with its primary pattern.
    Enabled,
    /// `false` or an empty list.
    Disabled,
    /// Replace the primary pattern with these override pattern strings.
    Patterns(Vec<String>),
}

/// Override block of one document, keyed by rule key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentOverrides {
    entries: BTreeMap<String, OverrideEntry>,
}

impl DocumentOverrides {
    /// Read the block stored under `namespace` in parsed front-matter.
    ///
    /// Missing front-matter or namespace yields an empty override set;
    /// malformed entries are skipped with a warning.
    pub fn from_front_matter(front_matter: Option<&Value>, namespace: &str) -> Self {
        let Some(block) = front_matter.and_then(|fm| fm.get(namespace)) else {
            return Self::default();
        };
        let Value::Object(map) = block else {
            tracing::warn!(namespace, "override block is not a mapping; ignoring it");
            return Self::default();
        };

        let mut entries = BTreeMap::new();
        for (key, value) in map {
            match parse_entry(value) {
                Some(entry) => {
                    entries.insert(key.clone(), entry);
                }
                None => tracing::warn!(
                    rule = %key,
                    "override must be true, false or a list of strings; ignoring it"
                ),
            }
        }
        Self { entries }
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, OverrideEntry)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, rule_key: &str) -> Option<&OverrideEntry> {
        self.entries.get(rule_key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_entry(value: &Value) -> Option<OverrideEntry> {
    match value {
        Value::Bool(true) => Some(OverrideEntry::Enabled),
        Value::Bool(false) => Some(OverrideEntry::Disabled),
        Value::Array(items) if items.is_empty() => Some(OverrideEntry::Disabled),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(OverrideEntry::Patterns),
        _ => None,
    }
}
