//! auto-rewrite: rule-driven rewriting of Markdown notes
//!
//! Users describe rewrites as rules: a regex pattern (with `{{file.*}}` and
//! `{{editor.*}}` placeholders), a set of regions to leave alone and a small
//! transform program. A pass runs every rule over the active note and hands
//! the editor one atomic batch of verified byte-span replacements.
//!
//! # Architecture
//!
//! Patterns match against a normalized copy of the note that keeps every
//! char at the same byte offset, so each match maps straight back onto the
//! raw text. Every replacement compiles down to a [`PendingEdit`] that
//! records the text it expects to replace.
//!
//! # Safety
//!
//! - Edits verify their expected before-text before applying
//! - One apply call per pass; nothing is applied if any edit fails
//! - Overlapping edits never reach the editor
//! - A failing rule is skipped without affecting the others
//! - Atomic file writes in the CLI (tempfile + fsync + rename)
//!
//! # Example
//!
//! ```
//! use auto_rewrite::config::{EngineConfig, PatternSpec, Rule, RuleStore};
//! use auto_rewrite::document::{Document, TextDocument};
//! use auto_rewrite::engine::{Engine, PassContext};
//! use serde_json::json;
//!
//! let rule = Rule::new(
//!     "Title",
//!     "title",
//!     PatternSpec::new(r"\b{{file.basename}}\b", "gi"),
//!     r#"title_case | wrap("**")"#,
//! );
//! let store = RuleStore::new(vec![rule]).unwrap();
//! let engine = Engine::new(EngineConfig::default(), store.snapshot());
//!
//! let mut note = TextDocument::new("my note is about my note");
//! let context = PassContext {
//!     editor: json!({}),
//!     file: Some(json!({ "basename": "my note" })),
//!     front_matter: None,
//! };
//! engine.run_pass(&mut note, &context).unwrap();
//! assert_eq!(note.text(), "**My Note** is about **My Note**");
//! ```

pub mod cache;
pub mod config;
pub mod document;
pub mod edit;
pub mod engine;
pub mod matcher;
pub mod normalize;
pub mod pattern;
pub mod placeholder;
pub mod regions;
pub mod resolver;
pub mod schedule;
pub mod transform;

// Re-exports
pub use config::{
    load_from_path, load_from_str, load_or_default, ConfigError, DocumentOverrides, EngineConfig,
    OverrideEntry, PatternSpec, Rule, RuleConfig, RuleSnapshot, RuleStore, ValidationError,
};
pub use document::{Document, Position, TextDocument};
pub use edit::{EditError, EditVerification, EditorChange, PendingEdit};
pub use engine::{Engine, PassContext, PassError, PassReport, RuleOutcome};
pub use normalize::{Normalization, Normalizer};
pub use schedule::{KeyStroke, Trigger, TriggerScheduler};
pub use transform::{Program, TransformError};
