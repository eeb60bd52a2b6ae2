use crate::config::schema::{validate_rules, Rule, RuleConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Serialization format of a rule store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    Toml,
    Json,
}

impl StoreFormat {
    /// Pick the format from a file extension; anything but `.json` is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => StoreFormat::Json,
            _ => StoreFormat::Toml,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Json {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Io { .. } => self,
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Json { path: None, source } => ConfigError::Json {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read rule store from {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse rule store TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse rule store TOML: {}", source),
            },
            ConfigError::Json { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse rule store JSON ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse rule store JSON: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid rule store ({}): {}", path.display(), source),
                None => write!(f, "invalid rule store: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Json { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

/// Parse without validating.
pub fn parse_str(input: &str, format: StoreFormat) -> Result<RuleConfig, ConfigError> {
    match format {
        StoreFormat::Toml => toml_edit::de::from_str(input)
            .map_err(|source| ConfigError::Toml { path: None, source }),
        StoreFormat::Json => serde_json::from_str(input)
            .map_err(|source| ConfigError::Json { path: None, source }),
    }
}

/// Parse and validate a rule store.
pub fn load_from_str(input: &str, format: StoreFormat) -> Result<RuleConfig, ConfigError> {
    let config = parse_str(input, format)?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<RuleConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents, StoreFormat::from_path(path)).map_err(|error| error.with_path(path))
}

/// Load a rule store, treating a missing or malformed store as empty.
///
/// Individual invalid rules are dropped (with a warning) instead of
/// rejecting the whole store, so one bad rule never disables the rest.
pub fn load_or_default(path: impl AsRef<Path>) -> RuleConfig {
    let path = path.as_ref();
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no rule store; starting with no rules");
            return RuleConfig::default();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read rule store; using no rules");
            return RuleConfig::default();
        }
    };

    let mut config = match parse_str(&contents, StoreFormat::from_path(path)) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e.with_path(path), "malformed rule store; using no rules");
            return RuleConfig::default();
        }
    };

    if let Err(error) = config.validate() {
        for issue in &error.issues {
            tracing::warn!(path = %path.display(), "{issue}");
        }
        config.rules = keep_valid(std::mem::take(&mut config.rules));
    }
    config
}

/// Drop rules that fail validation on their own, then later duplicates of a key.
fn keep_valid(rules: Vec<Rule>) -> Vec<Rule> {
    let mut kept: Vec<Rule> = Vec::with_capacity(rules.len());
    for rule in rules {
        let standalone_ok = validate_rules(std::slice::from_ref(&rule)).is_empty();
        if standalone_ok && !kept.iter().any(|k| k.key == rule.key) {
            kept.push(rule);
        }
    }
    kept
}
