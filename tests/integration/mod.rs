//! Engine-level scenarios run against in-memory notes.

mod overrides;
mod scenarios;

use auto_rewrite::config::{PatternSpec, Rule, RuleStore};
use auto_rewrite::engine::{Engine, PassContext};
use auto_rewrite::{EngineConfig, TextDocument};
use serde_json::json;

pub(crate) fn engine(rules: Vec<Rule>) -> Engine {
    let store = RuleStore::new(rules).unwrap();
    Engine::new(EngineConfig::default(), store.snapshot())
}

pub(crate) fn rule(key: &str, source: &str, flags: &str, transform: &str) -> Rule {
    Rule::new(format!("rule {key}"), key, PatternSpec::new(source, flags), transform)
}

/// Context the way a host would build it for `doc`.
pub(crate) fn context_for(doc: &TextDocument, basename: &str) -> PassContext {
    PassContext {
        editor: doc.editor_context(),
        file: Some(json!({
            "basename": basename,
            "name": format!("{basename}.md"),
            "extension": "md",
        })),
        front_matter: doc.front_matter(),
    }
}
