//! Versioned rule snapshots.
//!
//! The engine never sees a mutable rule list. The authoring side edits a
//! [`RuleStore`], which validates every change and publishes a new
//! immutable [`RuleSnapshot`]; each pass holds one snapshot for its whole
//! duration.

use crate::config::schema::{validate_rules, Rule, ValidationError, ValidationIssue};
use std::sync::Arc;

/// An immutable, versioned view of the rule list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSnapshot {
    version: u64,
    rules: Arc<[Rule]>,
}

impl RuleSnapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn get(&self, key: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.key.as_str())
    }
}

/// Owner of the rule list; publishes a new snapshot after every valid edit.
#[derive(Debug, Clone)]
pub struct RuleStore {
    current: Arc<RuleSnapshot>,
}

impl RuleStore {
    pub fn new(rules: Vec<Rule>) -> Result<Self, ValidationError> {
        let rules: Vec<Rule> = rules.into_iter().map(prepare).collect();
        check(&rules)?;
        Ok(Self {
            current: Arc::new(RuleSnapshot {
                version: 1,
                rules: rules.into(),
            }),
        })
    }

    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        Arc::clone(&self.current)
    }

    /// Add a rule at the front of the list.
    pub fn add(&mut self, rule: Rule) -> Result<Arc<RuleSnapshot>, ValidationError> {
        let mut rules = Vec::with_capacity(self.current.rules.len() + 1);
        rules.push(prepare(rule));
        rules.extend(self.current.rules.iter().cloned());
        self.publish(rules)
    }

    /// Replace the rule stored under `key`, keeping its position. The rule
    /// may change its key; an unknown `key` adds the rule at the front.
    pub fn update(&mut self, key: &str, rule: Rule) -> Result<Arc<RuleSnapshot>, ValidationError> {
        let mut rules = self.current.rules.to_vec();
        match rules.iter().position(|existing| existing.key == key) {
            Some(idx) => rules[idx] = prepare(rule),
            None => rules.insert(0, prepare(rule)),
        }
        self.publish(rules)
    }

    pub fn remove(&mut self, key: &str) -> Result<Arc<RuleSnapshot>, ValidationError> {
        let before = self.current.rules.len();
        let rules: Vec<Rule> = self
            .current
            .rules
            .iter()
            .filter(|rule| rule.key != key)
            .cloned()
            .collect();
        if rules.len() == before {
            return Err(ValidationError {
                issues: vec![ValidationIssue::UnknownKey {
                    key: key.to_string(),
                }],
            });
        }
        self.publish(rules)
    }

    fn publish(&mut self, rules: Vec<Rule>) -> Result<Arc<RuleSnapshot>, ValidationError> {
        check(&rules)?;
        let next = Arc::new(RuleSnapshot {
            version: self.current.version + 1,
            rules: rules.into(),
        });
        tracing::debug!(version = next.version, rules = next.rules.len(), "published rule snapshot");
        self.current = Arc::clone(&next);
        Ok(next)
    }
}

/// Fill authoring defaults: empty flags mean global.
fn prepare(mut rule: Rule) -> Rule {
    if rule.pattern.flags.trim().is_empty() {
        rule.pattern.flags = "g".to_string();
    }
    rule
}

fn check(rules: &[Rule]) -> Result<(), ValidationError> {
    let issues = validate_rules(rules);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { issues })
    }
}
