//! Rule resolution: merge the global rule list with one document's
//! overrides and compile what is left.

use crate::config::overrides::{DocumentOverrides, OverrideEntry};
use crate::config::schema::Rule;
use crate::normalize::Normalizer;
use crate::pattern::{self, CompiledPattern, PatternError};
use crate::placeholder::PlaceholderContext;
use crate::transform::{Program, TransformError};
use std::fmt;

/// A rule that is enabled for the current document, ready to run.
#[derive(Debug, Clone)]
pub struct ProcessedRule {
    pub rule: Rule,
    /// The primary pattern, or the document's override patterns in order.
    pub patterns: Vec<CompiledPattern>,
    pub program: Program,
}

impl ProcessedRule {
    pub fn key(&self) -> &str {
        &self.rule.key
    }
}

#[derive(Debug, Clone)]
pub enum SkipReason {
    /// The document set the rule to `false` or `[]`.
    DisabledByDocument,
    InvalidPattern(PatternError),
    InvalidOverride { entry: String, error: PatternError },
    InvalidTransform(TransformError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DisabledByDocument => write!(f, "disabled by document"),
            SkipReason::InvalidPattern(e) => write!(f, "invalid pattern: {e}"),
            SkipReason::InvalidOverride { entry, error } => {
                write!(f, "invalid override pattern '{entry}': {error}")
            }
            SkipReason::InvalidTransform(e) => write!(f, "invalid transform: {e}"),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResolvedRules {
    /// Enabled rules in rule-list order.
    pub enabled: Vec<ProcessedRule>,
    pub skipped: Vec<(String, SkipReason)>,
}

pub fn resolve_rules(
    rules: &[Rule],
    overrides: &DocumentOverrides,
    context: &PlaceholderContext<'_>,
    normalizer: &dyn Normalizer,
) -> ResolvedRules {
    warn_unknown_override_keys(rules, overrides);

    let mut resolved = ResolvedRules::default();
    for rule in rules {
        match resolve_rule(rule, overrides.get(&rule.key), context, normalizer) {
            Ok(processed) => resolved.enabled.push(processed),
            Err(SkipReason::DisabledByDocument) => {
                tracing::debug!(rule = %rule.key, "rule disabled by document");
                resolved
                    .skipped
                    .push((rule.key.clone(), SkipReason::DisabledByDocument));
            }
            Err(reason) => {
                tracing::warn!(rule = %rule.key, "rule skipped for this document: {reason}");
                resolved.skipped.push((rule.key.clone(), reason));
            }
        }
    }
    resolved
}

fn resolve_rule(
    rule: &Rule,
    entry: Option<&OverrideEntry>,
    context: &PlaceholderContext<'_>,
    normalizer: &dyn Normalizer,
) -> Result<ProcessedRule, SkipReason> {
    let patterns = match entry {
        Some(OverrideEntry::Disabled) => return Err(SkipReason::DisabledByDocument),
        None | Some(OverrideEntry::Enabled) => vec![pattern::compile_primary(&rule.pattern, context, normalizer)
            .map_err(SkipReason::InvalidPattern)?],
        Some(OverrideEntry::Patterns(entries)) => entries
            .iter()
            .map(|entry| {
                pattern::compile_override(entry, &rule.pattern, context, normalizer).map_err(|error| {
                    SkipReason::InvalidOverride {
                        entry: entry.clone(),
                        error,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
    };
    let program = Program::parse(&rule.transform).map_err(SkipReason::InvalidTransform)?;

    Ok(ProcessedRule {
        rule: rule.clone(),
        patterns,
        program,
    })
}

fn warn_unknown_override_keys(rules: &[Rule], overrides: &DocumentOverrides) {
    for key in overrides.keys() {
        if rules.iter().any(|rule| rule.key == key) {
            continue;
        }
        match closest_key(key, rules) {
            Some(suggestion) => tracing::warn!(
                key,
                "document overrides unknown rule '{key}'; did you mean '{suggestion}'?"
            ),
            None => tracing::warn!(key, "document overrides unknown rule '{key}'"),
        }
    }
}

/// The rule key nearest to `key` by edit distance, if reasonably close.
fn closest_key<'r>(key: &str, rules: &'r [Rule]) -> Option<&'r str> {
    rules
        .iter()
        .map(|rule| (strsim::levenshtein(key, &rule.key), rule.key.as_str()))
        .filter(|(distance, candidate)| *distance <= (candidate.len().max(key.len()) / 3).max(1))
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate)
}
