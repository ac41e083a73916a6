use crate::output::{print_json, print_table};
use anyhow::Context;
use plancheck_core::config::{Config, Overrides};
use plancheck_core::index::{CancelFlag, CodebaseIndex, IndexOptions};
use std::collections::BTreeMap;
use std::path::Path;

pub fn run(root: &Path, exclude: Vec<String>, json: bool) -> anyhow::Result<i32> {
    let config = Config::load(root)
        .context("failed to load config")?
        .with_overrides(&Overrides {
            exclude_dirs: exclude,
            ..Overrides::default()
        });
    let opts = IndexOptions::from_config(&config);
    let index = super::runtime()?
        .block_on(CodebaseIndex::build(root, &opts, &CancelFlag::new()))
        .context("failed to index codebase")?;

    let mut kinds: BTreeMap<String, usize> = BTreeMap::new();
    let mut extensions: BTreeMap<String, usize> = BTreeMap::new();
    for file in index.files() {
        *kinds.entry(file.kind.to_string()).or_default() += 1;
        *extensions.entry(file.extension().to_string()).or_default() += 1;
    }
    extensions.remove("");
    let symbols = index.symbols().count();

    if json {
        let styles: BTreeMap<&str, Option<&str>> = extensions
            .keys()
            .map(|ext| {
                (
                    ext.as_str(),
                    index.dominant_file_style(ext).map(|s| s.label()),
                )
            })
            .collect();
        print_json(&serde_json::json!({
            "root": index.root(),
            "files": index.len(),
            "dirs": index.dirs().count(),
            "symbols": symbols,
            "partial": index.is_partial(),
            "kinds": kinds,
            "extensions": extensions,
            "styles": styles,
            "warnings": index.warnings(),
        }))?;
        return Ok(0);
    }

    println!(
        "{}: {} files, {} directories, {} declarations{}",
        index.root().display(),
        index.len(),
        index.dirs().count(),
        symbols,
        if index.is_partial() { " (partial)" } else { "" }
    );
    println!();
    print_table(
        &["KIND", "FILES"],
        kinds
            .iter()
            .map(|(k, n)| vec![k.clone(), n.to_string()])
            .collect(),
    );
    println!();
    print_table(
        &["EXTENSION", "FILES", "FILE NAMES"],
        extensions
            .iter()
            .map(|(ext, n)| {
                let style = index
                    .dominant_file_style(ext)
                    .map(|s| s.label())
                    .unwrap_or("-");
                vec![format!(".{ext}"), n.to_string(), style.to_string()]
            })
            .collect(),
    );
    for w in index.warnings() {
        println!("[warning] {}: {}", w.path, w.message);
    }
    Ok(0)
}
