//! Declarative transform programs.
//!
//! A rule's replacement is computed by a small pipeline language instead of
//! arbitrary code:
//!
//! ```text
//! group(1) | title_case | wrap("**")
//! template("[[$0]]")
//! lower | skip_if_eq("ok") | "OK"
//! ```
//!
//! Sources replace the current value, operations rewrite it. The value
//! starts as the raw text of the match. A program that ends with no value
//! (or an empty one) produces no edit.

mod parser;

use crate::matcher::Occurrence;
use crate::placeholder::{self, PlaceholderContext, PlaceholderError, ResolveMode};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum TransformError {
    #[error("transform program is empty")]
    Empty,

    #[error("invalid transform '{input}' at offset {offset}: {message}")]
    Syntax {
        input: String,
        offset: usize,
        message: String,
    },

    #[error("unknown transform stage '{stage}'")]
    UnknownStage { stage: String },

    #[error("stage '{stage}' takes {expected}")]
    Arity {
        stage: String,
        expected: &'static str,
    },

    #[error("group {index} does not exist; the match has {available} capture group(s)")]
    GroupOutOfRange { index: usize, available: usize },

    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Original,
    Normalized,
    Group(usize),
    NormalizedGroup(usize),
    Literal(String),
    Template(Template),
    Upper,
    Lower,
    TitleCase,
    Capitalize,
    Trim,
    Prefix(String),
    Suffix(String),
    Wrap(String, String),
    Replace(String, String),
    Skip,
    SkipIfEq(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pieces: Vec<TemplatePiece>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplatePiece {
    /// Literal text; may contain `{{editor.*}}`/`{{file.*}}` placeholders.
    Text(String),
    Group(usize),
}

impl Template {
    fn highest_group(&self) -> Option<usize> {
        self.pieces
            .iter()
            .filter_map(|piece| match piece {
                TemplatePiece::Group(n) => Some(*n),
                TemplatePiece::Text(_) => None,
            })
            .max()
    }

    fn expand(
        &self,
        occurrence: &Occurrence,
        context: &PlaceholderContext<'_>,
    ) -> Result<String, TransformError> {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                TemplatePiece::Text(text) => {
                    out.push_str(&placeholder::resolve(text, context, ResolveMode::Strict)?)
                }
                TemplatePiece::Group(n) => {
                    if let Some(group) = group(occurrence, *n)? {
                        out.push_str(&group.original);
                    }
                }
            }
        }
        Ok(out)
    }
}

/// A parsed transform program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    stages: Vec<Stage>,
}

impl Program {
    pub fn parse(source: &str) -> Result<Self, TransformError> {
        Ok(Self {
            stages: parser::parse_program(source)?,
        })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Highest capture group index the program refers to, if any.
    pub fn highest_group(&self) -> Option<usize> {
        self.stages
            .iter()
            .filter_map(|stage| match stage {
                Stage::Group(n) | Stage::NormalizedGroup(n) => Some(*n),
                Stage::Template(template) => template.highest_group(),
                _ => None,
            })
            .max()
    }

    /// Run the program against one occurrence.
    ///
    /// Returns `Ok(None)` when the program decides not to rewrite this
    /// occurrence: `skip`, a matching `skip_if_eq`, a group that did not
    /// participate, or an empty result.
    pub fn eval(
        &self,
        occurrence: &Occurrence,
        context: &PlaceholderContext<'_>,
    ) -> Result<Option<String>, TransformError> {
        let mut value = occurrence.original.clone();

        for stage in &self.stages {
            value = match stage {
                Stage::Original => occurrence.original.clone(),
                Stage::Normalized => occurrence.normalized.clone(),
                Stage::Group(n) => match group(occurrence, *n)? {
                    Some(group) => group.original.clone(),
                    None => return Ok(None),
                },
                Stage::NormalizedGroup(n) => match group(occurrence, *n)? {
                    Some(group) => group.normalized.clone(),
                    None => return Ok(None),
                },
                Stage::Literal(text) => text.clone(),
                Stage::Template(template) => template.expand(occurrence, context)?,
                Stage::Upper => value.to_uppercase(),
                Stage::Lower => value.to_lowercase(),
                Stage::TitleCase => title_case(&value),
                Stage::Capitalize => capitalize(&value),
                Stage::Trim => value.trim().to_string(),
                Stage::Prefix(prefix) => format!("{prefix}{value}"),
                Stage::Suffix(suffix) => format!("{value}{suffix}"),
                Stage::Wrap(open, close) => format!("{open}{value}{close}"),
                Stage::Replace(from, to) => value.replace(from.as_str(), to),
                Stage::Skip => return Ok(None),
                Stage::SkipIfEq(other) if value == *other => return Ok(None),
                Stage::SkipIfEq(_) => value,
            };
        }

        Ok(Some(value).filter(|v| !v.is_empty()))
    }
}

fn group<'o>(
    occurrence: &'o Occurrence,
    index: usize,
) -> Result<Option<&'o crate::matcher::CaptureGroup>, TransformError> {
    match occurrence.groups.get(index) {
        Some(group) => Ok(group.as_ref()),
        None => Err(TransformError::GroupOutOfRange {
            index,
            available: occurrence.groups.len().saturating_sub(1),
        }),
    }
}

/// Upper-case the first letter of every whitespace-separated word and
/// lower-case the rest.
fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for ch in value.chars() {
        if ch.is_whitespace() {
            at_word_start = true;
            out.push(ch);
        } else if at_word_start {
            at_word_start = false;
            out.extend(ch.to_uppercase());
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
