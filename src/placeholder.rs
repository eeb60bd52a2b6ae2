//! `{{root.path}}` placeholder expansion.
//!
//! Placeholders are resolved against two read-only roots, `editor` and
//! `file`, before a pattern is compiled. Lookups walk JSON objects (and
//! arrays by index); only strings and numbers may be substituted.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{(.*?)\}\}").expect("valid token regex"));

pub const EDITOR_ROOT: &str = "editor";
pub const FILE_ROOT: &str = "file";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderError {
    #[error("unsupported placeholder root '{root}' in '{path}' (expected 'editor' or 'file')")]
    UnknownRoot { root: String, path: String },

    #[error(
        "placeholder '{path}' resolved to {found}; only strings or numbers can be used in {{{{}}}} placeholders"
    )]
    UnsupportedType { path: String, found: &'static str },
}

/// How unresolvable tokens are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Every token must resolve to a string or number.
    Strict,
    /// Tokens with an unknown root, or that resolve to nothing, stay as literal text.
    Lenient,
}

/// The two capability roots visible to placeholders.
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderContext<'a> {
    pub editor: &'a Value,
    pub file: &'a Value,
}

impl<'a> PlaceholderContext<'a> {
    pub fn new(editor: &'a Value, file: &'a Value) -> Self {
        Self { editor, file }
    }

    /// Look up a dotted path. `Ok(None)` means the path is "undefined".
    pub fn lookup(&self, path: &str) -> Result<Option<&'a Value>, PlaceholderError> {
        let mut parts = path.split('.');
        let root = parts.next().unwrap_or_default();
        let mut current = match root {
            EDITOR_ROOT => self.editor,
            FILE_ROOT => self.file,
            _ => {
                return Err(PlaceholderError::UnknownRoot {
                    root: root.to_string(),
                    path: path.to_string(),
                })
            }
        };

        for part in parts {
            let next = match current {
                Value::Object(map) => map.get(part),
                Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return Ok(None),
            }
        }

        Ok(Some(current))
    }
}

/// Expand every `{{path}}` token in `template`.
pub fn resolve(
    template: &str,
    context: &PlaceholderContext<'_>,
    mode: ResolveMode,
) -> Result<String, PlaceholderError> {
    resolve_mapped(template, context, mode, str::to_string)
}

/// Like [`resolve`], but every substituted value goes through `map` first.
/// Text outside the tokens, and tokens left in place, are copied unchanged.
pub fn resolve_mapped(
    template: &str,
    context: &PlaceholderContext<'_>,
    mode: ResolveMode,
    map: impl Fn(&str) -> String,
) -> Result<String, PlaceholderError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in TOKEN.captures_iter(template) {
        let (Some(token), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&template[last..token.start()]);
        last = token.end();

        match expand_token(inner.as_str().trim(), context, mode)? {
            Some(text) => out.push_str(&map(text.as_str())),
            None => out.push_str(token.as_str()),
        }
    }

    out.push_str(&template[last..]);
    Ok(out)
}

/// `Ok(None)` means the token is passed through untouched (lenient mode only).
fn expand_token(
    path: &str,
    context: &PlaceholderContext<'_>,
    mode: ResolveMode,
) -> Result<Option<String>, PlaceholderError> {
    let value = match context.lookup(path) {
        Ok(value) => value,
        Err(PlaceholderError::UnknownRoot { .. }) if mode == ResolveMode::Lenient => {
            return Ok(None)
        }
        Err(e) => return Err(e),
    };

    match value {
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        None if mode == ResolveMode::Lenient => Ok(None),
        other => Err(PlaceholderError::UnsupportedType {
            path: path.to_string(),
            found: type_name(other),
        }),
    }
}

fn type_name(value: Option<&Value>) -> &'static str {
    match value {
        None => "undefined",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}
