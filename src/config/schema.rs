use crate::normalize::Normalization;
use crate::pattern;
use crate::regions::RegionKind;
use crate::transform::Program;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// Front-matter key that holds per-document overrides.
pub const DEFAULT_NAMESPACE_KEY: &str = "auto-rewrite";

/// A persisted rule store: engine settings plus the ordered rule list.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct RuleConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let issues = validate_rules(&self.rules);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

/// Check every rule and collect all problems instead of stopping at the first.
pub(crate) fn validate_rules(rules: &[Rule]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();

    for rule in rules {
        let key = rule.key.trim();
        if key.is_empty() {
            issues.push(ValidationIssue::MissingField {
                rule_key: None,
                field: "key",
            });
            continue;
        }
        if !is_valid_key(key) {
            issues.push(ValidationIssue::InvalidKey {
                key: key.to_string(),
            });
        }
        if !seen.insert(key) {
            issues.push(ValidationIssue::DuplicateKey {
                key: key.to_string(),
            });
        }
        if rule.name.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                rule_key: Some(key.to_string()),
                field: "name",
            });
        }
        let group_count = if rule.pattern.source.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                rule_key: Some(key.to_string()),
                field: "pattern.source",
            });
            None
        } else {
            match pattern::check_syntax(&rule.pattern) {
                Ok(groups) => Some(groups),
                Err(e) => {
                    issues.push(ValidationIssue::InvalidPattern {
                        rule_key: key.to_string(),
                        message: e.to_string(),
                    });
                    None
                }
            }
        };
        if rule.transform.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                rule_key: Some(key.to_string()),
                field: "transform",
            });
            continue;
        }
        match Program::parse(&rule.transform) {
            Ok(program) => {
                if let (Some(groups), Some(highest)) = (group_count, program.highest_group()) {
                    if highest > groups {
                        issues.push(ValidationIssue::InvalidTransform {
                            rule_key: key.to_string(),
                            message: format!(
                                "references group {highest} but the pattern has {groups} capture group(s)"
                            ),
                        });
                    }
                }
            }
            Err(e) => issues.push(ValidationIssue::InvalidTransform {
                rule_key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }

    issues
}

fn is_valid_key(key: &str) -> bool {
    key.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// Engine-wide settings, read from the `[engine]` table of a rule store.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub normalization: Normalization,
    pub namespace_key: String,
    pub fallback_delay_ms: u64,
    pub commit_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            normalization: Normalization::default(),
            namespace_key: DEFAULT_NAMESPACE_KEY.to_string(),
            fallback_delay_ms: 1500,
            commit_delay_ms: 150,
        }
    }
}

impl EngineConfig {
    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }

    pub fn commit_delay(&self) -> Duration {
        Duration::from_millis(self.commit_delay_ms)
    }
}

/// A user-authored rewrite rule.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(from = "RawRule")]
pub struct Rule {
    pub name: String,
    /// Unique, stable identity used by overrides, updates and deletes.
    pub key: String,
    pub description: Option<String>,
    pub pattern: PatternSpec,
    pub ignore: IgnoreSpec,
    /// Source of the transform program.
    pub transform: String,
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        key: impl Into<String>,
        pattern: PatternSpec,
        transform: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            description: None,
            pattern,
            ignore: IgnoreSpec::default(),
            transform: transform.into(),
        }
    }

    pub fn with_ignore(mut self, ignore: IgnoreSpec) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PatternSpec {
    #[serde(alias = "pattern")]
    pub source: String,
    #[serde(default = "default_flags")]
    pub flags: String,
}

impl PatternSpec {
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            flags: flags.into(),
        }
    }
}

fn default_flags() -> String {
    "g".to_string()
}

/// Region kinds a rule refuses to rewrite inside.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct IgnoreSpec {
    #[serde(default)]
    pub frontmatter: bool,
    #[serde(default, alias = "tilde")]
    pub fenced_tilde: bool,
    #[serde(default, alias = "backtick")]
    pub fenced_backtick: bool,
    #[serde(default, alias = "titles")]
    pub headings: bool,
}

impl IgnoreSpec {
    pub fn ignores(&self, kind: RegionKind) -> bool {
        match kind {
            RegionKind::Frontmatter => self.frontmatter,
            RegionKind::FencedTilde => self.fenced_tilde,
            RegionKind::FencedBacktick => self.fenced_backtick,
            RegionKind::Heading => self.headings,
        }
    }

    pub fn any(&self) -> bool {
        self.frontmatter || self.fenced_tilde || self.fenced_backtick || self.headings
    }
}

/// On-disk shape, accepting both the nested layout and the flat camelCase
/// fields written by older stores.
#[derive(Deserialize)]
struct RawRule {
    #[serde(default)]
    name: String,
    #[serde(default)]
    key: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(alias = "regex")]
    pattern: PatternSpec,
    #[serde(default)]
    ignore: IgnoreSpec,
    #[serde(default, alias = "ignoreFrontmatter")]
    ignore_frontmatter: bool,
    #[serde(default, alias = "ignoreTildeBlocks")]
    ignore_tilde_blocks: bool,
    #[serde(default, alias = "ignoreBackQuoteBlocks")]
    ignore_backquote_blocks: bool,
    #[serde(default, alias = "ignoreTitles")]
    ignore_titles: bool,
    #[serde(default)]
    transform: String,
}

impl From<RawRule> for Rule {
    fn from(raw: RawRule) -> Self {
        let ignore = IgnoreSpec {
            frontmatter: raw.ignore.frontmatter || raw.ignore_frontmatter,
            fenced_tilde: raw.ignore.fenced_tilde || raw.ignore_tilde_blocks,
            fenced_backtick: raw.ignore.fenced_backtick || raw.ignore_backquote_blocks,
            headings: raw.ignore.headings || raw.ignore_titles,
        };
        Self {
            name: raw.name.trim().to_string(),
            key: raw.key.trim().to_string(),
            description: raw
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            pattern: raw.pattern,
            ignore,
            transform: raw.transform.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingField {
        rule_key: Option<String>,
        field: &'static str,
    },
    InvalidKey {
        key: String,
    },
    DuplicateKey {
        key: String,
    },
    UnknownKey {
        key: String,
    },
    InvalidPattern {
        rule_key: String,
        message: String,
    },
    InvalidTransform {
        rule_key: String,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { rule_key, field } => match rule_key {
                Some(key) => write!(f, "rule '{key}' missing required field '{field}'"),
                None => write!(f, "rule missing required field '{field}'"),
            },
            ValidationIssue::InvalidKey { key } => write!(
                f,
                "rule key '{key}' may only contain lowercase letters, numbers, dashes and underscores"
            ),
            ValidationIssue::DuplicateKey { key } => {
                write!(f, "a rule with key '{key}' already exists")
            }
            ValidationIssue::UnknownKey { key } => write!(f, "no rule with key '{key}'"),
            ValidationIssue::InvalidPattern { rule_key, message } => {
                write!(f, "rule '{rule_key}' has an invalid pattern: {message}")
            }
            ValidationIssue::InvalidTransform { rule_key, message } => {
                write!(f, "rule '{rule_key}' has an invalid transform: {message}")
            }
        }
    }
}
