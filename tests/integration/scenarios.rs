use super::{context_for, engine, rule};
use auto_rewrite::config::IgnoreSpec;
use auto_rewrite::engine::RuleOutcome;
use auto_rewrite::resolver::SkipReason;
use auto_rewrite::{Document, TextDocument};

#[test]
fn title_case_rule_rewrites_every_mention() {
    let engine = engine(vec![rule(
        "title-case",
        r"\b{{file.basename}}\b",
        "gi",
        r#"title_case | wrap("**")"#,
    )
    .with_ignore(IgnoreSpec {
        headings: true,
        ..IgnoreSpec::default()
    })]);

    let mut doc = TextDocument::new("my note is about my note");
    let ctx = context_for(&doc, "my note");
    let report = engine.run_pass(&mut doc, &ctx).unwrap();

    assert_eq!(doc.text(), "**My Note** is about **My Note**");
    assert_eq!(report.edits.len(), 2);
    assert_eq!(doc.apply_calls(), 1);
    assert!(matches!(
        report.outcome("title-case"),
        Some(RuleOutcome::Rewrote { matches: 2, edits: 2 })
    ));
}

#[test]
fn all_edits_of_a_pass_arrive_in_one_apply_call() {
    let engine = engine(vec![
        rule("arrow", "->", "g", r#""→""#),
        rule("teh", r"\bteh\b", "g", r#""the""#),
    ]);
    let mut doc = TextDocument::new("teh a -> b\nand teh end");
    let ctx = context_for(&doc, "x");
    let report = engine.run_pass(&mut doc, &ctx).unwrap();

    assert_eq!(doc.text(), "the a → b\nand the end");
    assert_eq!(doc.apply_calls(), 1);
    // Rule order, then occurrence order.
    let keys: Vec<_> = report.edits.iter().map(|e| e.rule_key.as_str()).collect();
    assert_eq!(keys, vec!["arrow", "teh", "teh"]);
}

#[test]
fn failing_rule_does_not_block_others() {
    let engine = engine(vec![
        // Valid program, but the template needs a value this note lacks.
        rule("stamp", "today", "g", r#"template("{{file.created}}")"#),
        rule("upper", "shout", "g", "upper"),
    ]);
    let mut doc = TextDocument::new("today I shout");
    let ctx = context_for(&doc, "x");
    let report = engine.run_pass(&mut doc, &ctx).unwrap();

    assert_eq!(doc.text(), "today I SHOUT");
    assert!(matches!(report.outcome("stamp"), Some(RuleOutcome::Failed(_))));
}

#[test]
fn unknown_placeholder_root_disables_only_that_rule() {
    let engine = engine(vec![
        rule("vault", "{{vault.name}}", "g", "upper"),
        rule("ok", "ok", "g", "upper"),
    ]);
    let mut doc = TextDocument::new("ok");
    let ctx = context_for(&doc, "x");
    let report = engine.run_pass(&mut doc, &ctx).unwrap();

    assert_eq!(doc.text(), "OK");
    assert!(matches!(
        report.outcome("vault"),
        Some(RuleOutcome::Skipped(SkipReason::InvalidPattern(_)))
    ));
}

#[test]
fn protected_regions_are_left_alone() {
    let text = "---\ntags: foo\n---\nfoo\n```\nfoo\n```\n~~~\nfoo\n~~~\n# foo\nfoo";
    let engine = engine(vec![rule("foo", "foo", "g", "upper").with_ignore(IgnoreSpec {
        frontmatter: true,
        fenced_tilde: true,
        fenced_backtick: true,
        headings: true,
    })]);
    let mut doc = TextDocument::new(text);
    let ctx = context_for(&doc, "x");
    engine.run_pass(&mut doc, &ctx).unwrap();

    assert_eq!(
        doc.text(),
        "---\ntags: foo\n---\nFOO\n```\nfoo\n```\n~~~\nfoo\n~~~\n# foo\nFOO"
    );
}

#[test]
fn only_opted_in_region_kinds_are_protected() {
    let text = "```\nfoo\n```\n# foo";
    let engine = engine(vec![rule("foo", "foo", "g", "upper").with_ignore(IgnoreSpec {
        fenced_backtick: true,
        ..IgnoreSpec::default()
    })]);
    let mut doc = TextDocument::new(text);
    let ctx = context_for(&doc, "x");
    engine.run_pass(&mut doc, &ctx).unwrap();

    assert_eq!(doc.text(), "```\nfoo\n```\n# FOO");
}

#[test]
fn matches_spanning_a_region_edge_are_rewritten() {
    // Strict containment: the match crosses the end of the heading line.
    let engine = engine(vec![rule("join", r"title\nbody", "g", r#""joined""#).with_ignore(
        IgnoreSpec {
            headings: true,
            ..IgnoreSpec::default()
        },
    )]);
    let mut doc = TextDocument::new("# title\nbody");
    let ctx = context_for(&doc, "x");
    engine.run_pass(&mut doc, &ctx).unwrap();
    assert_eq!(doc.text(), "# joined");
}

#[test]
fn groups_and_normalized_text() {
    let engine = engine(vec![rule(
        "link",
        r"\[\[(\w+)\]\]",
        "g",
        r#"group(1) | template("[[$1|$1]]")"#,
    )]);
    let mut doc = TextDocument::new("see [[Alpha]] and [[beta]]");
    let ctx = context_for(&doc, "x");
    engine.run_pass(&mut doc, &ctx).unwrap();
    assert_eq!(doc.text(), "see [[Alpha|Alpha]] and [[beta|beta]]");
}

#[test]
fn report_carries_snapshot_version() {
    let engine = engine(vec![rule("a", "a", "g", "upper")]);
    let mut doc = TextDocument::new("a");
    let ctx = context_for(&doc, "x");
    let report = engine.run_pass(&mut doc, &ctx).unwrap();
    assert_eq!(report.snapshot_version, engine.rules().version());
    assert!(report.applied);
}

#[test]
fn capitalized_basename_matches_without_i_flag() {
    let engine = engine(vec![rule(
        "title",
        r"\b{{file.basename}}\b",
        "g",
        r#"wrap("**")"#,
    )]);
    let mut doc = TextDocument::new("My Note is here");
    let ctx = context_for(&doc, "My Note");
    let report = engine.run_pass(&mut doc, &ctx).unwrap();

    assert_eq!(doc.text(), "**My Note** is here");
    assert!(matches!(
        report.outcome("title"),
        Some(RuleOutcome::Rewrote { matches: 1, edits: 1 })
    ));
}
