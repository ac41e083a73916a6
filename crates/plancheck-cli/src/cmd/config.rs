use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use plancheck_core::config::{Config, WarnLevel};
use plancheck_core::paths;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Write a .plancheck.yaml with the default settings
    Init {
        /// Replace an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration (file values over defaults)
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<i32> {
    match subcmd {
        ConfigSubcommand::Init { force } => init(root, force, json),
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

/// Load an explicit config file, or the codebase's `.plancheck.yaml`.
pub fn load(root: &Path, explicit: Option<&Path>) -> anyhow::Result<Config> {
    match explicit {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config '{}'", path.display())),
        None => Config::load(root).with_context(|| {
            format!(
                "failed to load config '{}'",
                paths::config_path(root).display()
            )
        }),
    }
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(root: &Path, force: bool, json: bool) -> anyhow::Result<i32> {
    let path = paths::config_path(root);
    if path.exists() && !force {
        anyhow::bail!(
            "'{}' already exists (use --force to replace it)",
            path.display()
        );
    }
    Config::default()
        .save(root)
        .with_context(|| format!("failed to write '{}'", path.display()))?;

    if json {
        print_json(&serde_json::json!({ "path": path }))?;
    } else {
        println!("Wrote {}", path.display());
    }
    Ok(0)
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<i32> {
    let config = load(root, None)?;
    if json {
        print_json(&config)?;
    } else {
        print!("{}", serde_yaml::to_string(&config)?);
    }
    Ok(0)
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, json: bool) -> anyhow::Result<i32> {
    let config = load(root, None)?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    let has_errors = warnings.iter().any(|w| w.level == WarnLevel::Error);
    if has_errors {
        anyhow::bail!("config validation found errors");
    }

    Ok(0)
}
