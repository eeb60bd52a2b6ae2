pub mod loader;
pub mod overrides;
pub mod schema;
pub mod store;

pub use loader::{load_from_path, load_from_str, load_or_default, ConfigError, StoreFormat};
pub use overrides::{DocumentOverrides, OverrideEntry};
pub use schema::{
    EngineConfig, IgnoreSpec, PatternSpec, Rule, RuleConfig, ValidationError, ValidationIssue,
    DEFAULT_NAMESPACE_KEY,
};
pub use store::{RuleSnapshot, RuleStore};
