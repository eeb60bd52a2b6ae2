use anyhow::{Context, Result};
use auto_rewrite::config::{load_from_path, ConfigError, Rule, RuleStore};
use auto_rewrite::document::{Document, TextDocument};
use auto_rewrite::edit::atomic_write;
use auto_rewrite::engine::{Engine, PassContext, RuleOutcome};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "auto-rewrite")]
#[command(about = "Rewrite Markdown notes with user-defined regex rules", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every rule over the given notes or directories
    Apply {
        /// Notes or directories to process (directories are searched for .md files)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Rule store (TOML or JSON)
        #[arg(short, long)]
        rules: PathBuf,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Validate a rule store and report every problem
    Check {
        #[arg(short, long)]
        rules: PathBuf,
    },

    /// List the rules of a rule store
    List {
        #[arg(short, long)]
        rules: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Apply {
            paths,
            rules,
            dry_run,
            diff,
        } => cmd_apply(&paths, &rules, dry_run, diff),
        Commands::Check { rules } => cmd_check(&rules),
        Commands::List { rules } => cmd_list(&rules),
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_new("debug")
    } else {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("warn"))
    }
    .context("invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))
}

/// Helper: collect Markdown notes from files and directories, sorted.
fn discover_notes(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut notes = Vec::new();
    for path in paths {
        if path.is_file() {
            notes.push(path.clone());
            continue;
        }
        if !path.exists() {
            anyhow::bail!("{} does not exist", path.display());
        }
        for entry in WalkDir::new(path) {
            let entry = entry?;
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some("md")
            {
                notes.push(entry.path().to_path_buf());
            }
        }
    }
    notes.sort();
    notes.dedup();
    Ok(notes)
}

/// `{{file.*}}` values for a note on disk.
fn file_context(path: &Path) -> serde_json::Value {
    let text = |s: Option<&std::ffi::OsStr>| s.and_then(|s| s.to_str()).unwrap_or_default().to_string();
    json!({
        "name": text(path.file_name()),
        "basename": text(path.file_stem()),
        "extension": text(path.extension()),
        "path": path.display().to_string(),
    })
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!("\n{}", format!("--- {} (original)", file.display()).dimmed());
    println!("{}", format!("+++ {} (rewritten)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn cmd_apply(paths: &[PathBuf], rules_path: &Path, dry_run: bool, show_diff: bool) -> Result<()> {
    let config = load_from_path(rules_path)
        .with_context(|| format!("loading rules from {}", rules_path.display()))?;
    let store = RuleStore::new(config.rules)?;
    let engine = Engine::new(config.engine, store.snapshot());

    let notes = discover_notes(paths)?;
    println!("Rules: {} ({} loaded)", rules_path.display(), store.snapshot().rules().len());
    if dry_run {
        println!("{}", "[DRY RUN - no files will be written]".cyan());
    }
    println!();

    let mut total_changed = 0;
    let mut total_edits = 0;
    let mut total_failed = 0;

    for note in &notes {
        let original = fs::read_to_string(note)
            .with_context(|| format!("reading {}", note.display()))?;
        let mut document = TextDocument::new(original.clone()).with_path(note);
        let context = PassContext {
            editor: document.editor_context(),
            file: Some(file_context(note)),
            front_matter: document.front_matter(),
        };

        let report = match engine.run_pass(&mut document, &context) {
            Ok(report) => report,
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), note.display(), e);
                total_failed += 1;
                continue;
            }
        };

        for rule in &report.rules {
            match &rule.outcome {
                RuleOutcome::Failed(e) => {
                    eprintln!("{} {} [{}]: {}", "✗".red(), note.display(), rule.key, e);
                    total_failed += 1;
                }
                RuleOutcome::Skipped(reason) => {
                    tracing::debug!(note = %note.display(), rule = %rule.key, "skipped: {reason}");
                }
                RuleOutcome::Rewrote { .. } | RuleOutcome::Unchanged { .. } => {}
            }
        }

        if !report.applied {
            continue;
        }

        total_changed += 1;
        total_edits += report.edits.len();
        println!(
            "{} {}: {} edit(s)",
            "✓".green(),
            note.display(),
            report.edits.len()
        );
        if show_diff {
            display_diff(note, &original, document.text());
        }
        if !dry_run {
            atomic_write(note, document.text().as_bytes())
                .with_context(|| format!("writing {}", note.display()))?;
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} note(s) scanned", notes.len());
    println!("  {} note(s) changed", format!("{}", total_changed).green());
    println!("  {} edit(s)", format!("{}", total_edits).green());
    println!("  {} failure(s)", format!("{}", total_failed).red());

    if total_failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_check(rules_path: &Path) -> Result<()> {
    match load_from_path(rules_path) {
        Ok(config) => {
            println!(
                "{} {}: {} rule(s) valid",
                "✓".green(),
                rules_path.display(),
                config.rules.len()
            );
            Ok(())
        }
        Err(ConfigError::Validation { source, .. }) => {
            eprintln!("{} {}:", "✗".red(), rules_path.display());
            for issue in &source.issues {
                eprintln!("  - {}", issue);
            }
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_list(rules_path: &Path) -> Result<()> {
    let config = load_from_path(rules_path)
        .with_context(|| format!("loading rules from {}", rules_path.display()))?;

    if config.rules.is_empty() {
        println!("{}", "No rules defined".yellow());
        return Ok(());
    }
    for rule in &config.rules {
        print_rule(rule);
    }
    Ok(())
}

fn print_rule(rule: &Rule) {
    println!(
        "{} {}  /{}/{}",
        rule.key.bold(),
        rule.name,
        rule.pattern.source,
        rule.pattern.flags
    );
    if let Some(description) = &rule.description {
        println!("  {}", description.dimmed());
    }
    println!("  transform: {}", rule.transform);

    let ignore = &rule.ignore;
    if ignore.any() {
        let kinds: Vec<&str> = [
            (ignore.frontmatter, "frontmatter"),
            (ignore.fenced_tilde, "tilde fences"),
            (ignore.fenced_backtick, "backtick fences"),
            (ignore.headings, "headings"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        println!("  ignores: {}", kinds.join(", ").dimmed());
    }
}
