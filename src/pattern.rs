//! Pattern compilation.
//!
//! Turns a rule's primary pattern, or one of a document's override pattern
//! strings, into an executable [`CompiledPattern`]. Flags use the familiar
//! single-letter syntax; `g` (global, non-overlapping scan) is always part
//! of the effective flags because the match engine always scans globally.

use crate::cache;
use crate::config::schema::PatternSpec;
use crate::normalize::Normalizer;
use crate::placeholder::{self, PlaceholderContext, PlaceholderError, ResolveMode};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Override entry meaning "use the rule's primary pattern unchanged".
pub const MAIN_RULE_SENTINEL: &str = "{{mainRule}}";

/// Slot in a primary pattern that receives an escaped override literal.
pub const OVERRIDE_SLOT: &str = "{{frontmatterString}}";

static ANY_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{.*?\}\}").expect("valid token regex"));

#[derive(Error, Debug, Clone)]
pub enum PatternError {
    #[error("unsupported regex flag '{flag}'")]
    InvalidFlag { flag: char },

    #[error("invalid regex /{source_text}/: {error}")]
    Regex {
        source_text: String,
        #[source]
        error: regex::Error,
    },

    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),

    #[error("pattern contains {{{{frontmatterString}}}} but the document provides no override value")]
    MissingOverrideValue,

    #[error("override pattern is empty")]
    EmptyOverride,
}

/// Parsed regex flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub case_insensitive: bool,
    pub multi_line: bool,
    pub dot_matches_new_line: bool,
    pub ignore_whitespace: bool,
    pub unicode: bool,
    /// `g` was missing and has been appended.
    pub global_appended: bool,
}

impl Flags {
    pub fn parse(flags: &str) -> Result<Self, PatternError> {
        let mut parsed = Flags::default();
        let mut global = false;
        for flag in flags.chars() {
            match flag {
                'g' => global = true,
                'i' => parsed.case_insensitive = true,
                'm' => parsed.multi_line = true,
                's' => parsed.dot_matches_new_line = true,
                'x' => parsed.ignore_whitespace = true,
                'u' => parsed.unicode = true,
                c if c.is_whitespace() => {}
                other => return Err(PatternError::InvalidFlag { flag: other }),
            }
        }
        parsed.global_appended = !global;
        Ok(parsed)
    }

    /// Canonical flag string; always contains `g`.
    pub fn effective(&self) -> String {
        let mut out = String::from("g");
        for (enabled, letter) in [
            (self.case_insensitive, 'i'),
            (self.multi_line, 'm'),
            (self.dot_matches_new_line, 's'),
            (self.ignore_whitespace, 'x'),
            (self.unicode, 'u'),
        ] {
            if enabled {
                out.push(letter);
            }
        }
        out
    }
}

/// An executable pattern plus the flags it was built with.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    regex: Regex,
    flags: String,
}

impl CompiledPattern {
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Effective flags, always including `g`.
    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Build a regex from an already-resolved source.
pub fn build(source: &str, flags: &str) -> Result<CompiledPattern, PatternError> {
    let parsed = Flags::parse(flags)?;
    if parsed.global_appended {
        tracing::warn!(pattern = source, flags, "regex flags lack 'g'; appending it");
    }
    let effective = parsed.effective();

    let regex = cache::get_or_compile(source, &effective, || {
        RegexBuilder::new(source)
            .case_insensitive(parsed.case_insensitive)
            .multi_line(parsed.multi_line)
            .dot_matches_new_line(parsed.dot_matches_new_line)
            .ignore_whitespace(parsed.ignore_whitespace)
            .build()
            .map_err(|error| PatternError::Regex {
                source_text: source.to_string(),
                error,
            })
    })?;

    Ok(CompiledPattern {
        regex,
        flags: effective,
    })
}

/// Compile a rule's primary pattern, resolving its placeholders strictly.
///
/// Patterns run against the normalized view, so substituted values are
/// normalized too; the pattern text itself is left as written.
pub fn compile_primary(
    spec: &PatternSpec,
    context: &PlaceholderContext<'_>,
    normalizer: &dyn Normalizer,
) -> Result<CompiledPattern, PatternError> {
    if spec.source.contains(OVERRIDE_SLOT) {
        return Err(PatternError::MissingOverrideValue);
    }
    let source = resolve_values(&spec.source, context, ResolveMode::Strict, normalizer)?;
    build(&source, &spec.flags)
}

/// Compile one override pattern string from a document's configuration.
///
/// Plain literals match case-sensitively against the normalized view.
pub fn compile_override(
    entry: &str,
    primary: &PatternSpec,
    context: &PlaceholderContext<'_>,
    normalizer: &dyn Normalizer,
) -> Result<CompiledPattern, PatternError> {
    let trimmed = entry.trim();
    if trimmed.is_empty() {
        return Err(PatternError::EmptyOverride);
    }
    if trimmed == MAIN_RULE_SENTINEL {
        return compile_primary(primary, context, normalizer);
    }

    if let Some((body, flags)) = split_regex_literal(trimmed) {
        let source = resolve_values(body, context, ResolveMode::Lenient, normalizer)?;
        match build(&source, flags) {
            Ok(compiled) => return Ok(compiled),
            Err(e @ PatternError::Regex { .. }) | Err(e @ PatternError::InvalidFlag { .. }) => {
                tracing::debug!(entry, error = %e, "regex literal failed; treating it as plain text");
            }
            Err(e) => return Err(e),
        }
    }

    let literal = normalizer.normalize(&placeholder::resolve(entry, context, ResolveMode::Lenient)?);
    let escaped = regex::escape(&literal);

    if primary.source.contains(OVERRIDE_SLOT) {
        let mut source = String::new();
        for (idx, piece) in primary.source.split(OVERRIDE_SLOT).enumerate() {
            if idx > 0 {
                source.push_str(&escaped);
            }
            source.push_str(&resolve_values(piece, context, ResolveMode::Strict, normalizer)?);
        }
        return build(&source, &primary.flags);
    }

    build(&word_bounded(&literal, &escaped), "g")
}

fn resolve_values(
    template: &str,
    context: &PlaceholderContext<'_>,
    mode: ResolveMode,
    normalizer: &dyn Normalizer,
) -> Result<String, PlaceholderError> {
    placeholder::resolve_mapped(template, context, mode, |value| normalizer.normalize(value))
}

/// Wrap an escaped literal in `\b` on each side whose edge char is a word char.
fn word_bounded(literal: &str, escaped: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut out = String::with_capacity(escaped.len() + 4);
    if literal.chars().next().is_some_and(is_word) {
        out.push_str(r"\b");
    }
    out.push_str(escaped);
    if literal.chars().last().is_some_and(is_word) {
        out.push_str(r"\b");
    }
    out
}

/// Split `/body/flags` into its parts. Flags must be ASCII letters.
fn split_regex_literal(entry: &str) -> Option<(&str, &str)> {
    let rest = entry.strip_prefix('/')?;
    let close = rest.rfind('/')?;
    let (body, flags) = (&rest[..close], &rest[close + 1..]);
    if body.is_empty() || !flags.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((body, flags))
}

/// Check a primary pattern's flags and regex syntax without a document
/// context. Placeholders are replaced by a neutral literal. Returns the
/// number of capture groups (excluding the whole match).
pub fn check_syntax(spec: &PatternSpec) -> Result<usize, PatternError> {
    Flags::parse(&spec.flags)?;
    let neutral = ANY_TOKEN.replace_all(&spec.source, "x");
    let regex = Regex::new(&neutral).map_err(|error| PatternError::Regex {
        source_text: spec.source.clone(),
        error,
    })?;
    Ok(regex.captures_len().saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalization;
    use serde_json::{json, Value};

    const FOLD: Normalization = Normalization::CaseFold;

    fn ctx_values() -> (Value, Value) {
        (json!({ "lineCount": 3 }), json!({ "basename": "my note" }))
    }

    #[test]
    fn test_flags_auto_append_global() {
        let flags = Flags::parse("i").unwrap();
        assert!(flags.global_appended);
        assert_eq!(flags.effective(), "gi");

        let compiled = build("abc", "i").unwrap();
        assert_eq!(compiled.flags(), "gi");
        assert!(compiled.regex().is_match("ABC"));
    }

    #[test]
    fn test_flags_reject_unknown() {
        assert!(matches!(
            Flags::parse("gy"),
            Err(PatternError::InvalidFlag { flag: 'y' })
        ));
    }

    #[test]
    fn test_flags_collapse_duplicates() {
        assert_eq!(Flags::parse("ggiim").unwrap().effective(), "gim");
    }

    #[test]
    fn test_compile_primary_resolves_placeholders() {
        let (editor, file) = ctx_values();
        let ctx = PlaceholderContext::new(&editor, &file);
        let spec = PatternSpec::new(r"\b{{file.basename}}\b", "gi");
        let compiled = compile_primary(&spec, &ctx, &FOLD).unwrap();
        assert_eq!(compiled.as_str(), r"\bmy note\b");
        assert!(compiled.regex().is_match("about My Note today"));
    }

    #[test]
    fn test_compile_primary_unknown_root_is_fatal() {
        let (editor, file) = ctx_values();
        let ctx = PlaceholderContext::new(&editor, &file);
        let spec = PatternSpec::new("{{vault.name}}", "g");
        let err = compile_primary(&spec, &ctx, &FOLD).unwrap_err();
        assert!(matches!(
            err,
            PatternError::Placeholder(PlaceholderError::UnknownRoot { ref root, .. }) if root == "vault"
        ));
    }

    #[test]
    fn test_primary_with_slot_needs_override() {
        let (editor, file) = ctx_values();
        let ctx = PlaceholderContext::new(&editor, &file);
        let spec = PatternSpec::new(r"@{{frontmatterString}}\b", "g");
        assert!(matches!(
            compile_primary(&spec, &ctx, &FOLD),
            Err(PatternError::MissingOverrideValue)
        ));
    }

    #[test]
    fn test_override_main_rule_sentinel() {
        let (editor, file) = ctx_values();
        let ctx = PlaceholderContext::new(&editor, &file);
        let primary = PatternSpec::new("colou?r", "g");
        let compiled = compile_override("{{mainRule}}", &primary, &ctx, &FOLD).unwrap();
        assert_eq!(compiled.as_str(), "colou?r");
    }

    #[test]
    fn test_override_regex_literal() {
        let (editor, file) = ctx_values();
        let ctx = PlaceholderContext::new(&editor, &file);
        let primary = PatternSpec::new("unused", "g");
        let compiled = compile_override("/fo+/i", &primary, &ctx, &FOLD).unwrap();
        assert_eq!(compiled.as_str(), "fo+");
        assert_eq!(compiled.flags(), "gi");
    }

    #[test]
    fn test_override_bad_regex_literal_falls_back_to_text() {
        let (editor, file) = ctx_values();
        let ctx = PlaceholderContext::new(&editor, &file);
        let primary = PatternSpec::new("unused", "g");
        let compiled = compile_override("/a(b/", &primary, &ctx, &FOLD).unwrap();
        assert!(compiled.regex().is_match("x /a(b/ y"));
    }

    #[test]
    fn test_override_plain_literal_is_word_bounded_and_case_sensitive() {
        let (editor, file) = ctx_values();
        let ctx = PlaceholderContext::new(&editor, &file);
        let primary = PatternSpec::new("unused", "gi");
        let compiled = compile_override("a.b", &primary, &ctx, &FOLD).unwrap();
        assert_eq!(compiled.as_str(), r"\ba\.b\b");
        assert_eq!(compiled.flags(), "g");
        assert!(compiled.regex().is_match("see a.b here"));
        assert!(!compiled.regex().is_match("see axb here"));
        assert!(!compiled.regex().is_match("see A.B here"));
        assert!(!compiled.regex().is_match("see ba.bc here"));
    }

    #[test]
    fn test_override_literal_keeps_unknown_tokens() {
        let (editor, file) = ctx_values();
        let ctx = PlaceholderContext::new(&editor, &file);
        let primary = PatternSpec::new("unused", "g");
        let compiled = compile_override("{{not.editor.or.file}}", &primary, &ctx, &FOLD).unwrap();
        assert!(compiled.regex().is_match("literal {{not.editor.or.file}} text"));
    }

    #[test]
    fn test_override_literal_resolves_known_tokens() {
        let (editor, file) = ctx_values();
        let ctx = PlaceholderContext::new(&editor, &file);
        let primary = PatternSpec::new("unused", "g");
        let compiled = compile_override("{{file.basename}}", &primary, &ctx, &FOLD).unwrap();
        assert_eq!(compiled.as_str(), r"\bmy note\b");
    }

    #[test]
    fn test_override_fills_slot_in_primary() {
        let (editor, file) = ctx_values();
        let ctx = PlaceholderContext::new(&editor, &file);
        let primary = PatternSpec::new(r"@{{frontmatterString}}\b", "gi");
        let compiled = compile_override("c++", &primary, &ctx, &FOLD).unwrap();
        assert_eq!(compiled.as_str(), r"@c\+\+\b");
        assert_eq!(compiled.flags(), "gi");
    }

    #[test]
    fn test_empty_override_rejected() {
        let (editor, file) = ctx_values();
        let ctx = PlaceholderContext::new(&editor, &file);
        let primary = PatternSpec::new("x", "g");
        assert!(matches!(
            compile_override("  ", &primary, &ctx, &FOLD),
            Err(PatternError::EmptyOverride)
        ));
    }

    #[test]
    fn test_check_syntax_ignores_placeholders() {
        let spec = PatternSpec::new(r"(\w+) {{file.basename}} {{frontmatterString}}", "g");
        assert_eq!(check_syntax(&spec).unwrap(), 1);
        assert!(check_syntax(&PatternSpec::new("(", "g")).is_err());
        assert!(check_syntax(&PatternSpec::new("a", "gz")).is_err());
    }

    #[test]
    fn test_substituted_values_follow_the_normalized_view() {
        let editor = json!({});
        let file = json!({ "basename": "My Note" });
        let ctx = PlaceholderContext::new(&editor, &file);

        let spec = PatternSpec::new(r"\b{{file.basename}}\b", "g");
        let compiled = compile_primary(&spec, &ctx, &FOLD).unwrap();
        assert_eq!(compiled.as_str(), r"\bmy note\b");

        let compiled = compile_primary(&spec, &ctx, &Normalization::Identity).unwrap();
        assert_eq!(compiled.as_str(), r"\bMy Note\b");
    }

    #[test]
    fn test_override_literal_is_normalized() {
        let (editor, file) = ctx_values();
        let ctx = PlaceholderContext::new(&editor, &file);
        let primary = PatternSpec::new("unused", "g");
        let compiled = compile_override("Alice", &primary, &ctx, &FOLD).unwrap();
        assert_eq!(compiled.as_str(), r"\balice\b");

        let slot = PatternSpec::new(r"@{{frontmatterString}}", "g");
        let compiled = compile_override("Ann", &slot, &ctx, &FOLD).unwrap();
        assert_eq!(compiled.as_str(), "@ann");
    }

    #[test]
    fn test_override_literal_keeps_surrounding_whitespace() {
        let (editor, file) = ctx_values();
        let ctx = PlaceholderContext::new(&editor, &file);
        let primary = PatternSpec::new("unused", "g");
        let compiled = compile_override(" to ", &primary, &ctx, &FOLD).unwrap();
        assert_eq!(compiled.as_str(), " to ");
        assert!(compiled.regex().is_match("up to here"));
        assert!(!compiled.regex().is_match("tomato"));

        let compiled = compile_override("  {{mainRule}} ", &primary, &ctx, &FOLD).unwrap();
        assert_eq!(compiled.as_str(), "unused");
    }
}
