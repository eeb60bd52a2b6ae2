//! The host document surface and an in-memory implementation of it.

use crate::edit::{splice_all, EditError, EditorChange, Splice};
use crate::regions::ProtectedRegions;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Zero-based line and byte column within that line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// What the engine needs from the editor holding the active note.
pub trait Document {
    fn text(&self) -> &str;

    fn offset_to_position(&self, offset: usize) -> Position {
        offset_to_position(self.text(), offset)
    }

    /// Apply every change as one atomic edit (a single undo step).
    fn apply_edits(&mut self, changes: Vec<EditorChange>) -> Result<(), EditError>;
}

pub fn offset_to_position(text: &str, offset: usize) -> Position {
    let offset = offset.min(text.len());
    let before = &text.as_bytes()[..offset];
    let line = before.iter().filter(|b| **b == b'\n').count();
    let line_start = before
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |idx| idx + 1);
    Position::new(line, offset - line_start)
}

pub fn position_to_offset(text: &str, position: Position) -> Result<usize, EditError> {
    let invalid = || EditError::InvalidPosition {
        line: position.line,
        column: position.column,
    };
    let line_start = if position.line == 0 {
        0
    } else {
        text.match_indices('\n')
            .nth(position.line - 1)
            .map(|(idx, _)| idx + 1)
            .ok_or_else(invalid)?
    };
    let line_end = text[line_start..]
        .find('\n')
        .map_or(text.len(), |idx| line_start + idx);
    let offset = line_start + position.column;
    if offset > line_end {
        return Err(invalid());
    }
    Ok(offset)
}

/// A note held in memory, optionally backed by a file path.
#[derive(Debug, Clone, Default)]
pub struct TextDocument {
    text: String,
    path: Option<PathBuf>,
    apply_calls: usize,
}

impl TextDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            path: None,
            apply_calls: 0,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of `apply_edits` calls received so far.
    pub fn apply_calls(&self) -> usize {
        self.apply_calls
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Parsed YAML front-matter, if the note has a well-formed block.
    pub fn front_matter(&self) -> Option<Value> {
        parse_front_matter(&self.text)
    }

    /// Editor-style context values for this note.
    pub fn editor_context(&self) -> Value {
        serde_json::json!({
            "lineCount": self.text.lines().count(),
            "length": self.text.len(),
        })
    }
}

impl Document for TextDocument {
    fn text(&self) -> &str {
        &self.text
    }

    fn apply_edits(&mut self, changes: Vec<EditorChange>) -> Result<(), EditError> {
        self.apply_calls += 1;
        let splices = changes
            .iter()
            .map(|change| {
                Ok(Splice {
                    range: position_to_offset(&self.text, change.from)?
                        ..position_to_offset(&self.text, change.to)?,
                    text: &change.text,
                    expected: &change.expected,
                })
            })
            .collect::<Result<Vec<_>, EditError>>()?;
        self.text = splice_all(&self.text, splices)?;
        Ok(())
    }
}

/// Parse the leading `---` block as YAML into a JSON value.
///
/// Returns `None` when there is no block, the block is empty, or it is not
/// valid YAML (logged at warn level).
pub fn parse_front_matter(text: &str) -> Option<Value> {
    let region = ProtectedRegions::scan(text).frontmatter.first().copied()?;
    let block = &text[region.start..region.end];
    let body = block
        .split_once('\n')
        .map(|(_, rest)| rest)
        .unwrap_or_default();
    let body = body.rsplit_once('\n').map(|(head, _)| head).unwrap_or_default();

    match serde_yaml::from_str::<Value>(body) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, "front-matter is not valid YAML; ignoring it");
            None
        }
    }
}
