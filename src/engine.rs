//! The rewrite pass.
//!
//! One pass reads the active note, runs every enabled rule over it and asks
//! the host to apply all accepted replacements as a single atomic edit.
//! Rule failures are isolated: a rule whose pattern, override or transform
//! fails is reported and skipped while the others still apply.

use crate::config::overrides::DocumentOverrides;
use crate::config::schema::EngineConfig;
use crate::config::store::RuleSnapshot;
use crate::document::Document;
use crate::edit::{resolve_overlaps, to_editor_changes, EditError, PendingEdit};
use crate::matcher::collect_occurrences;
use crate::normalize::{normalize_checked, NormalizeError, Normalizer};
use crate::placeholder::PlaceholderContext;
use crate::regions::ProtectedRegions;
use crate::resolver::{resolve_rules, ProcessedRule, SkipReason};
use crate::transform::TransformError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PassError {
    #[error("no active file")]
    NoActiveFile,

    #[error("normalizer broke offset alignment: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("host rejected the edit batch: {0}")]
    Apply(#[source] EditError),
}

/// Host-provided values for one pass.
#[derive(Debug, Clone, Default)]
pub struct PassContext {
    /// Values exposed as `{{editor.*}}`.
    pub editor: Value,
    /// Values exposed as `{{file.*}}`; `None` when no note is active.
    pub file: Option<Value>,
    /// Parsed front-matter of the active note.
    pub front_matter: Option<Value>,
}

#[derive(Debug, Clone)]
pub enum RuleOutcome {
    /// At least one edit was accepted.
    Rewrote { matches: usize, edits: usize },
    /// The rule ran but produced no accepted edit.
    Unchanged { matches: usize },
    Skipped(SkipReason),
    Failed(TransformError),
}

#[derive(Debug, Clone)]
pub struct RuleReport {
    pub key: String,
    pub outcome: RuleOutcome,
}

/// The edits a pass would make, before anything is applied.
#[derive(Debug, Clone)]
pub struct PassPlan {
    pub snapshot_version: u64,
    pub rules: Vec<RuleReport>,
    /// Accepted edits in rule order, then occurrence order.
    pub edits: Vec<PendingEdit>,
}

#[derive(Debug, Clone)]
pub struct PassReport {
    pub snapshot_version: u64,
    pub rules: Vec<RuleReport>,
    pub edits: Vec<PendingEdit>,
    /// Whether the host was asked to apply anything.
    pub applied: bool,
}

impl PassReport {
    pub fn outcome(&self, key: &str) -> Option<&RuleOutcome> {
        self.rules
            .iter()
            .find(|report| report.key == key)
            .map(|report| &report.outcome)
    }
}

pub struct Engine {
    config: EngineConfig,
    rules: Arc<RuleSnapshot>,
    normalizer: Box<dyn Normalizer + Send + Sync>,
}

impl Engine {
    pub fn new(config: EngineConfig, rules: Arc<RuleSnapshot>) -> Self {
        let normalizer: Box<dyn Normalizer + Send + Sync> = Box::new(config.normalization);
        Self {
            config,
            rules,
            normalizer,
        }
    }

    /// Replace the configured normalization with a custom one.
    pub fn with_normalizer(mut self, normalizer: impl Normalizer + Send + Sync + 'static) -> Self {
        self.normalizer = Box::new(normalizer);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn rules(&self) -> &Arc<RuleSnapshot> {
        &self.rules
    }

    /// Switch to a newer rule snapshot; passes already running keep theirs.
    pub fn set_rules(&mut self, rules: Arc<RuleSnapshot>) {
        self.rules = rules;
    }

    /// Compute the edits for `document` without applying them.
    pub fn plan<D: Document + ?Sized>(
        &self,
        document: &D,
        context: &PassContext,
    ) -> Result<PassPlan, PassError> {
        let file = context.file.as_ref().ok_or(PassError::NoActiveFile)?;
        let snapshot = Arc::clone(&self.rules);

        let raw = document.text();
        let normalized = normalize_checked(self.normalizer.as_ref(), raw)?;
        let regions = ProtectedRegions::scan(raw);
        let overrides =
            DocumentOverrides::from_front_matter(context.front_matter.as_ref(), &self.config.namespace_key);
        let placeholders = PlaceholderContext::new(&context.editor, file);

        let resolved = resolve_rules(
            snapshot.rules(),
            &overrides,
            &placeholders,
            self.normalizer.as_ref(),
        );

        let mut outcomes: HashMap<String, RuleOutcome> = HashMap::new();
        let mut matches: HashMap<String, usize> = HashMap::new();
        let mut candidates = Vec::new();

        for rule in &resolved.enabled {
            match rule_edits(rule, raw, &normalized, &regions, &placeholders) {
                Ok((count, edits)) => {
                    matches.insert(rule.key().to_string(), count);
                    candidates.extend(edits);
                }
                Err(error) => {
                    tracing::warn!(rule = %rule.key(), %error, "transform failed; dropping this rule's edits");
                    outcomes.insert(rule.key().to_string(), RuleOutcome::Failed(error));
                }
            }
        }
        for (key, reason) in resolved.skipped {
            outcomes.insert(key, RuleOutcome::Skipped(reason));
        }

        let edits = resolve_overlaps(candidates);
        for (key, count) in matches {
            let accepted = edits.iter().filter(|edit| edit.rule_key == key).count();
            let outcome = if accepted > 0 {
                RuleOutcome::Rewrote {
                    matches: count,
                    edits: accepted,
                }
            } else {
                RuleOutcome::Unchanged { matches: count }
            };
            outcomes.insert(key, outcome);
        }

        let rules = snapshot
            .rules()
            .iter()
            .filter_map(|rule| {
                outcomes.remove(&rule.key).map(|outcome| RuleReport {
                    key: rule.key.clone(),
                    outcome,
                })
            })
            .collect();

        tracing::debug!(
            version = snapshot.version(),
            enabled = resolved.enabled.len(),
            regions = regions.len(),
            edits = edits.len(),
            "planned rewrite pass"
        );

        Ok(PassPlan {
            snapshot_version: snapshot.version(),
            rules,
            edits,
        })
    }

    /// Run one pass: plan, then request exactly one atomic apply if there
    /// is anything to change.
    pub fn run_pass<D: Document + ?Sized>(
        &self,
        document: &mut D,
        context: &PassContext,
    ) -> Result<PassReport, PassError> {
        let plan = self.plan(&*document, context)?;

        let applied = !plan.edits.is_empty();
        if applied {
            let changes = to_editor_changes(&plan.edits, &*document);
            document.apply_edits(changes).map_err(PassError::Apply)?;
        }

        Ok(PassReport {
            snapshot_version: plan.snapshot_version,
            rules: plan.rules,
            edits: plan.edits,
            applied,
        })
    }
}

/// Match and transform one rule. Returns the match count and the edits;
/// any transform error discards all of the rule's edits.
fn rule_edits(
    rule: &ProcessedRule,
    raw: &str,
    normalized: &str,
    regions: &ProtectedRegions,
    placeholders: &PlaceholderContext<'_>,
) -> Result<(usize, Vec<PendingEdit>), TransformError> {
    let occurrences = collect_occurrences(rule, raw, normalized, regions);
    let mut edits = Vec::new();
    for occurrence in &occurrences {
        let Some(replacement) = rule.program.eval(occurrence, placeholders)? else {
            continue;
        };
        if replacement == occurrence.original {
            continue;
        }
        edits.push(PendingEdit::new(
            rule.key(),
            occurrence.start,
            occurrence.end,
            replacement,
            &occurrence.original,
        ));
    }
    Ok((occurrences.len(), edits))
}
