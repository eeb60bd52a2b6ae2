use super::{context_for, engine, rule};
use auto_rewrite::config::IgnoreSpec;
use auto_rewrite::engine::RuleOutcome;
use auto_rewrite::resolver::SkipReason;
use auto_rewrite::{Document, TextDocument};

fn note(front_matter: &str, body: &str) -> TextDocument {
    TextDocument::new(format!("---\n{front_matter}\n---\n{body}"))
}

fn body(doc: &TextDocument) -> &str {
    let text = doc.text();
    let start = text.find("\n---\n").map_or(0, |idx| idx + 5);
    &text[start..]
}

#[test]
fn false_disables_rule_for_this_note() {
    let engine = engine(vec![rule("arrow", "->", "g", r#""→""#)]);
    let mut doc = note("auto-rewrite:\n  arrow: false", "a -> b");
    let ctx = context_for(&doc, "x");
    let report = engine.run_pass(&mut doc, &ctx).unwrap();

    assert_eq!(body(&doc), "a -> b");
    assert_eq!(doc.apply_calls(), 0);
    assert!(matches!(
        report.outcome("arrow"),
        Some(RuleOutcome::Skipped(SkipReason::DisabledByDocument))
    ));
}

#[test]
fn empty_list_disables_rule() {
    let engine = engine(vec![rule("arrow", "->", "g", r#""→""#)]);
    let mut doc = note("auto-rewrite:\n  arrow: []", "a -> b");
    let ctx = context_for(&doc, "x");
    engine.run_pass(&mut doc, &ctx).unwrap();
    assert_eq!(body(&doc), "a -> b");
}

#[test]
fn true_keeps_primary_pattern() {
    let engine = engine(vec![rule("arrow", "->", "g", r#""→""#)]);
    let mut doc = note("auto-rewrite:\n  arrow: true", "a -> b");
    let ctx = context_for(&doc, "x");
    engine.run_pass(&mut doc, &ctx).unwrap();
    assert_eq!(body(&doc), "a → b");
}

#[test]
fn override_patterns_replace_primary() {
    let engine = engine(vec![rule("name", "nobody", "g", r#"wrap("[[", "]]")"#).with_ignore(
        IgnoreSpec {
            frontmatter: true,
            ..IgnoreSpec::default()
        },
    )]);
    let mut doc = note(
        "auto-rewrite:\n  name: [\"alice\", \"/bo+b/\", \"{{mainRule}}\"]",
        "alice met booob and nobody else; malice stays",
    );
    let ctx = context_for(&doc, "x");
    engine.run_pass(&mut doc, &ctx).unwrap();
    assert_eq!(
        body(&doc),
        "[[alice]] met [[booob]] and [[nobody]] else; malice stays"
    );
}

#[test]
fn override_literal_fills_slot_in_primary() {
    let engine = engine(vec![rule("mention", r"@{{frontmatterString}}\b", "g", "upper")]);
    let mut doc = note("auto-rewrite:\n  mention: [\"ann\"]", "ping @ann and @anna");
    let ctx = context_for(&doc, "x");
    engine.run_pass(&mut doc, &ctx).unwrap();
    assert_eq!(body(&doc), "ping @ANN and @anna");
}

#[test]
fn invalid_override_disables_only_that_rule() {
    let engine = engine(vec![
        rule("title", "x", "g", "upper"),
        rule("arrow", "->", "g", r#""→""#),
    ]);
    // `{{file}}` resolves to a mapping, which is never a valid pattern value.
    let mut doc = note("auto-rewrite:\n  title: [\"{{file}}\"]", "x -> y");
    let ctx = context_for(&doc, "x");
    let report = engine.run_pass(&mut doc, &ctx).unwrap();

    assert_eq!(body(&doc), "x → y");
    assert!(matches!(
        report.outcome("title"),
        Some(RuleOutcome::Skipped(SkipReason::InvalidOverride { .. }))
    ));
}

#[test]
fn unknown_override_keys_are_ignored() {
    let engine = engine(vec![rule("arrow", "->", "g", r#""→""#)]);
    let mut doc = note("auto-rewrite:\n  arow: false", "a -> b");
    let ctx = context_for(&doc, "x");
    engine.run_pass(&mut doc, &ctx).unwrap();
    assert_eq!(body(&doc), "a → b");
}

#[test]
fn capitalized_override_literal_matches_under_case_folding() {
    let engine = engine(vec![rule("mention", "nobody", "g", r#"wrap("[[", "]]")"#).with_ignore(
        IgnoreSpec {
            frontmatter: true,
            ..IgnoreSpec::default()
        },
    )]);
    let mut doc = note("auto-rewrite:\n  mention: [\"Alice\"]", "Alice met Bob");
    let ctx = context_for(&doc, "x");
    let report = engine.run_pass(&mut doc, &ctx).unwrap();

    assert_eq!(body(&doc), "[[Alice]] met Bob");
    assert!(matches!(
        report.outcome("mention"),
        Some(RuleOutcome::Rewrote { matches: 1, edits: 1 })
    ));
}

#[test]
fn capitalized_slot_value_matches_under_case_folding() {
    let engine = engine(vec![rule("mention", r"@{{frontmatterString}}\b", "g", "upper")]);
    let mut doc = note("auto-rewrite:\n  mention: [\"Ann\"]", "ping @Ann");
    let ctx = context_for(&doc, "x");
    engine.run_pass(&mut doc, &ctx).unwrap();
    assert_eq!(body(&doc), "ping @ANN");
}
