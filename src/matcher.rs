//! Match engine: scan normalized text, map spans back onto the raw text.

use crate::pattern::CompiledPattern;
use crate::regions::ProtectedRegions;
use crate::resolver::ProcessedRule;
use regex::Captures;

/// One capture group of a match, sliced from both texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureGroup {
    pub start: usize,
    pub end: usize,
    pub original: String,
    pub normalized: String,
}

/// A single match of a rule.
///
/// `start`/`end` index the normalized text and, since normalization keeps
/// every char at the same offset, the raw text as well. `groups[0]` is the
/// whole match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub start: usize,
    pub end: usize,
    pub groups: Vec<Option<CaptureGroup>>,
    pub original: String,
    pub normalized: String,
}

impl Occurrence {
    pub fn span(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    fn from_captures(captures: &Captures<'_>, raw: &str) -> Option<Self> {
        let whole = captures.get(0)?;
        let mut groups = Vec::with_capacity(captures.len());
        for m in captures.iter() {
            let group = match m {
                Some(m) => Some(CaptureGroup {
                    start: m.start(),
                    end: m.end(),
                    original: raw.get(m.range())?.to_string(),
                    normalized: m.as_str().to_string(),
                }),
                None => None,
            };
            groups.push(group);
        }
        Some(Self {
            start: whole.start(),
            end: whole.end(),
            original: raw.get(whole.range())?.to_string(),
            normalized: whole.as_str().to_string(),
            groups,
        })
    }
}

/// All non-overlapping matches of one pattern, in scan order.
///
/// Each search resumes at the end of the previous match, so an empty match
/// may directly follow a non-empty one. Only an empty match moves the scan
/// forward by one char.
pub fn scan(pattern: &CompiledPattern, raw: &str, normalized: &str) -> Vec<Occurrence> {
    debug_assert_eq!(raw.len(), normalized.len());
    let regex = pattern.regex();
    let mut occurrences = Vec::new();
    let mut pos = 0;

    while pos <= normalized.len() {
        let Some(captures) = regex.captures_at(normalized, pos) else {
            break;
        };
        let Some(whole) = captures.get(0) else {
            break;
        };

        match Occurrence::from_captures(&captures, raw) {
            Some(occurrence) => occurrences.push(occurrence),
            None => tracing::warn!(
                pattern = pattern.as_str(),
                "match span does not fall on raw text char boundaries; skipping it"
            ),
        }

        pos = if whole.is_empty() {
            let step = normalized[whole.end()..].chars().next().map_or(1, char::len_utf8);
            whole.end() + step
        } else {
            whole.end()
        };
    }

    occurrences
}

/// Occurrences of an enabled rule: every compiled pattern in declaration
/// order, minus matches fully inside a region kind the rule ignores.
pub fn collect_occurrences(
    rule: &ProcessedRule,
    raw: &str,
    normalized: &str,
    regions: &ProtectedRegions,
) -> Vec<Occurrence> {
    let ignore = rule.rule.ignore;
    rule.patterns
        .iter()
        .flat_map(|pattern| scan(pattern, raw, normalized))
        .filter(|occurrence| !regions.is_protected(&occurrence.span(), |kind| ignore.ignores(kind)))
        .collect()
}
