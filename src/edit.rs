use crate::document::{Document, Position};
use std::fs;
use std::io::Write;
use std::ops::Range;
use std::path::Path;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// A replacement computed by a rule, addressed in raw-text byte offsets.
///
/// Every rewrite the engine produces goes through this primitive; the
/// expected before-text guards against the document changing between
/// matching and applying.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PendingEdit does nothing until it is assembled and applied"]
pub struct PendingEdit {
    /// Key of the rule that produced the edit.
    pub rule_key: String,
    /// Starting byte offset (inclusive)
    pub start: usize,
    /// Ending byte offset (exclusive)
    pub end: usize,
    pub replacement: String,
    pub expected: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (used for long spans)
    Hash(u64),
}

impl EditVerification {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Exact text for short spans, a hash for anything over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("before-text verification failed at [{start}, {end}): expected {expected}, found {found:?}")]
    BeforeTextMismatch {
        start: usize,
        end: usize,
        expected: String,
        found: String,
    },

    #[error("invalid byte range [{start}, {end}) in text of length {len}")]
    InvalidRange { start: usize, end: usize, len: usize },

    #[error("edits overlap: {first:?} and {second:?}")]
    Overlap {
        first: Range<usize>,
        second: Range<usize>,
    },

    #[error("position {line}:{column} is outside the document")]
    InvalidPosition { line: usize, column: usize },

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PendingEdit {
    pub fn new(
        rule_key: impl Into<String>,
        start: usize,
        end: usize,
        replacement: impl Into<String>,
        expected_before: &str,
    ) -> Self {
        Self {
            rule_key: rule_key.into(),
            start,
            end,
            replacement: replacement.into(),
            expected: EditVerification::from_text(expected_before),
        }
    }

    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    fn overlaps(&self, other: &PendingEdit) -> bool {
        spans_overlap(&self.span(), &other.span())
    }
}

/// Half-open spans overlap when they share a byte. Two insertions at the
/// same offset also conflict, since their order would be ambiguous.
fn spans_overlap(a: &Range<usize>, b: &Range<usize>) -> bool {
    (a.start < b.end && b.start < a.end) || (a.is_empty() && b.is_empty() && a.start == b.start)
}

/// Keep edits in the given order, dropping any edit that overlaps one
/// already accepted.
pub fn resolve_overlaps(edits: Vec<PendingEdit>) -> Vec<PendingEdit> {
    let mut accepted: Vec<PendingEdit> = Vec::with_capacity(edits.len());
    for edit in edits {
        if let Some(winner) = accepted.iter().find(|kept| kept.overlaps(&edit)) {
            tracing::warn!(
                dropped_rule = %edit.rule_key,
                kept_rule = %winner.rule_key,
                start = edit.start,
                end = edit.end,
                "dropping edit that overlaps an earlier one"
            );
            continue;
        }
        accepted.push(edit);
    }
    accepted
}

/// A change addressed the way editors address text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorChange {
    pub from: Position,
    pub to: Position,
    pub text: String,
    pub expected: EditVerification,
}

/// Convert raw-offset edits into editor changes, preserving order.
pub fn to_editor_changes<D: Document + ?Sized>(edits: &[PendingEdit], document: &D) -> Vec<EditorChange> {
    edits
        .iter()
        .map(|edit| EditorChange {
            from: document.offset_to_position(edit.start),
            to: document.offset_to_position(edit.end),
            text: edit.replacement.clone(),
            expected: edit.expected.clone(),
        })
        .collect()
}

/// A verified replacement of `range` inside a text.
#[derive(Debug, Clone)]
pub struct Splice<'a> {
    pub range: Range<usize>,
    pub text: &'a str,
    pub expected: &'a EditVerification,
}

/// Apply a set of replacements to `text` as one unit.
///
/// Every span is validated and verified before anything is changed;
/// overlapping spans are rejected. Replacements are applied bottom-to-top
/// so earlier offsets stay valid.
pub fn splice_all(text: &str, mut splices: Vec<Splice<'_>>) -> Result<String, EditError> {
    for splice in &splices {
        let Range { start, end } = splice.range;
        if start > end || end > text.len() || !text.is_char_boundary(start) || !text.is_char_boundary(end) {
            return Err(EditError::InvalidRange {
                start,
                end,
                len: text.len(),
            });
        }
        let current = &text[start..end];
        if !splice.expected.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                start,
                end,
                expected: format!("{:?}", splice.expected),
                found: current.to_string(),
            });
        }
    }

    // Descending by start; at equal starts the wider span goes first so an
    // insertion at the same offset lands before its replacement.
    splices.sort_by(|a, b| {
        b.range
            .start
            .cmp(&a.range.start)
            .then(b.range.end.cmp(&a.range.end))
    });
    for pair in splices.windows(2) {
        let (later, earlier) = (&pair[0].range, &pair[1].range);
        if spans_overlap(earlier, later) {
            return Err(EditError::Overlap {
                first: earlier.clone(),
                second: later.clone(),
            });
        }
    }

    let mut out = text.to_string();
    for splice in &splices {
        out.replace_range(splice.range.clone(), splice.text);
    }
    Ok(out)
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or the file is left untouched.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    // Keep the original permissions on the replacement file.
    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(temp.path(), metadata.permissions())?;
    }

    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splice<'a>(range: Range<usize>, text: &'a str, expected: &'a EditVerification) -> Splice<'a> {
        Splice {
            range,
            text,
            expected,
        }
    }

    #[test]
    fn test_edit_verification_exact_match() {
        let verify = EditVerification::ExactMatch("hello world".to_string());
        assert!(verify.matches("hello world"));
        assert!(!verify.matches("hello"));
    }

    #[test]
    fn test_edit_verification_hash_for_large_spans() {
        let text = "x".repeat(2000);
        let verify = EditVerification::from_text(&text);
        assert!(matches!(verify, EditVerification::Hash(_)));
        assert!(verify.matches(&text));
        assert!(!verify.matches("x"));
        assert!(matches!(
            EditVerification::from_text("small"),
            EditVerification::ExactMatch(_)
        ));
    }

    #[test]
    fn test_resolve_overlaps_keeps_first() {
        let edits = vec![
            PendingEdit::new("a", 0, 5, "X", "hello"),
            PendingEdit::new("b", 3, 8, "Y", "lo wo"),
            PendingEdit::new("c", 5, 6, "_", " "),
            PendingEdit::new("d", 5, 5, "!", ""),
        ];
        let kept = resolve_overlaps(edits);
        let keys: Vec<_> = kept.iter().map(|e| e.rule_key.as_str()).collect();
        // "d" is an insertion at 5, touching but not overlapping "a" and "c".
        assert_eq!(keys, vec!["a", "c", "d"]);
    }

    #[test]
    fn test_same_point_insertions_conflict() {
        let edits = vec![
            PendingEdit::new("a", 2, 2, "X", ""),
            PendingEdit::new("b", 2, 2, "Y", ""),
        ];
        assert_eq!(resolve_overlaps(edits).len(), 1);
    }

    #[test]
    fn test_splice_all_applies_bottom_up() {
        let e1 = EditVerification::from_text("line1");
        let e3 = EditVerification::from_text("line3");
        let out = splice_all(
            "line1\nline2\nline3\n",
            vec![splice(0..5, "LINE1", &e1), splice(12..17, "L3", &e3)],
        )
        .unwrap();
        assert_eq!(out, "LINE1\nline2\nL3\n");
    }

    #[test]
    fn test_splice_all_insertion_next_to_replacement() {
        let empty = EditVerification::from_text("");
        let word = EditVerification::from_text("cd");
        let out = splice_all(
            "abcdef",
            vec![splice(2..2, "[", &empty), splice(2..4, "CD", &word)],
        )
        .unwrap();
        assert_eq!(out, "ab[CDef");
    }

    #[test]
    fn test_splice_all_rejects_mismatch_and_bad_ranges() {
        let expected = EditVerification::from_text("nope");
        assert!(matches!(
            splice_all("hello", vec![splice(0..4, "x", &expected)]),
            Err(EditError::BeforeTextMismatch { .. })
        ));
        let any = EditVerification::from_text("");
        assert!(matches!(
            splice_all("hello", vec![splice(3..9, "x", &any)]),
            Err(EditError::InvalidRange { .. })
        ));
        assert!(matches!(
            splice_all("é", vec![splice(1..1, "x", &any)]),
            Err(EditError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_splice_all_rejects_overlap() {
        let a = EditVerification::from_text("hel");
        let b = EditVerification::from_text("llo");
        assert!(matches!(
            splice_all("hello", vec![splice(0..3, "x", &a), splice(2..5, "y", &b)]),
            Err(EditError::Overlap { .. })
        ));
    }

    #[test]
    fn test_atomic_write() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("note.md");
        fs::write(&file_path, b"original content").unwrap();

        atomic_write(&file_path, b"modified content").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "modified content");
    }
}
