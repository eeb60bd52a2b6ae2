//! Matching view of a document.
//!
//! Patterns run against a normalized copy of the raw text, while slicing and
//! editor positions use the raw text. Both use the same byte offsets, so a
//! normalizer must never change the UTF-8 width of any char: the output has
//! the same length as the input and the same char boundaries.

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("normalization changed text length from {raw} to {normalized} bytes")]
    LengthChanged { raw: usize, normalized: usize },

    #[error("normalization moved a char boundary at byte {offset}")]
    BoundaryMoved { offset: usize },
}

/// A char-for-char transformation of document text.
pub trait Normalizer {
    fn normalize(&self, raw: &str) -> String;
}

/// Built-in normalization modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Normalization {
    /// Match against the raw text as-is.
    Identity,
    /// Lowercase every char whose lowercase form has the same UTF-8 width.
    #[default]
    CaseFold,
}

impl Normalizer for Normalization {
    fn normalize(&self, raw: &str) -> String {
        match self {
            Normalization::Identity => raw.to_string(),
            Normalization::CaseFold => raw.chars().map(fold_char).collect(),
        }
    }
}

/// Lowercase a single char, keeping it when folding would change its width
/// or expand it into several chars (e.g. `İ`).
fn fold_char(ch: char) -> char {
    let mut lower = ch.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(lc), None) if lc.len_utf8() == ch.len_utf8() => lc,
        _ => ch,
    }
}

/// Normalize `raw` and reject any result that would break offset arithmetic.
pub fn normalize_checked<N: Normalizer + ?Sized>(
    normalizer: &N,
    raw: &str,
) -> Result<String, NormalizeError> {
    let normalized = normalizer.normalize(raw);
    if normalized.len() != raw.len() {
        return Err(NormalizeError::LengthChanged {
            raw: raw.len(),
            normalized: normalized.len(),
        });
    }
    if let Some((offset, _)) = raw
        .char_indices()
        .find(|(offset, _)| !normalized.is_char_boundary(*offset))
    {
        return Err(NormalizeError::BoundaryMoved { offset });
    }
    Ok(normalized)
}
