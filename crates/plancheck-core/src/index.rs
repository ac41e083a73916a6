//! Codebase indexer.
//!
//! Walks a file tree once and records the structural facts the evidence
//! matcher needs: paths, directory layout, file roles, tokenized names and
//! the names declared inside source and config files. The walk is spread
//! across a bounded pool of tokio tasks, one directory read per task, and
//! merged into ordered maps so the result does not depend on scheduling.

use crate::config::Config;
use crate::error::{PlanCheckError, Result};
use crate::naming::{self, CaseStyle, FileName};
use crate::paths;
use crate::types::{FileKind, SymbolCategory};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Files larger than this are indexed by name only.
const MAX_SCAN_BYTES: u64 = 256 * 1024;

const CODE_EXTS: &[&str] = &[
    "rs", "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "go", "java", "kt", "kts", "rb", "php",
    "cs", "swift", "c", "h", "cc", "cpp", "hpp", "scala", "ex", "exs", "vue", "svelte", "dart",
    "lua", "sh", "sql",
];
const CONFIG_EXTS: &[&str] = &[
    "toml", "yaml", "yml", "json", "ini", "cfg", "conf", "env", "properties",
];
const DOC_EXTS: &[&str] = &["md", "mdx", "rst", "txt", "adoc"];
const TEST_DIRS: &[&str] = &["test", "tests", "__tests__", "spec", "specs", "e2e"];
const CONFIG_DIRS: &[&str] = &["config", "configs", ".config", "settings"];
const DOC_DIRS: &[&str] = &["doc", "docs"];

pub fn is_code_extension(ext: &str) -> bool {
    CODE_EXTS.contains(&ext)
}

/// Extensions the plan parser treats as evidence that a token is a file path.
pub fn is_known_extension(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    CODE_EXTS.contains(&ext.as_str())
        || CONFIG_EXTS.contains(&ext.as_str())
        || DOC_EXTS.contains(&ext.as_str())
        || matches!(ext.as_str(), "css" | "scss" | "html" | "lock" | "proto" | "graphql")
}

// ---------------------------------------------------------------------------
// Indexed entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub category: SymbolCategory,
    /// 1-based line of the declaration.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedFile {
    /// Root-relative path with `/` separators.
    pub path: String,
    pub dir: String,
    pub name: String,
    pub stem: String,
    pub suffix: String,
    pub kind: FileKind,
    pub words: Vec<String>,
    pub style: CaseStyle,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symbols: Vec<Symbol>,
}

impl IndexedFile {
    /// Describe a file from its relative path alone.
    pub fn describe(path: &str) -> Self {
        let name = paths::file_name(path).to_string();
        let parsed = FileName::parse(&name);
        let dir = paths::parent_dir(path).to_string();
        let kind = infer_kind(&dir, &parsed);
        Self {
            path: path.to_string(),
            words: parsed.words(),
            style: parsed.style(),
            stem: parsed.stem.clone(),
            suffix: parsed.suffix.clone(),
            kind,
            dir,
            name,
            symbols: Vec::new(),
        }
    }

    pub fn extension(&self) -> &str {
        self.suffix.rsplit_once('.').map(|(_, e)| e).unwrap_or("")
    }

    pub fn file_name(&self) -> FileName {
        FileName {
            stem: self.stem.clone(),
            suffix: self.suffix.clone(),
        }
    }
}

fn infer_kind(dir: &str, file: &FileName) -> FileKind {
    let ext = file.extension().to_ascii_lowercase();
    let stem = file.stem.to_ascii_lowercase();
    let in_dir = |names: &[&str]| dir.split('/').any(|c| names.contains(&c));

    let test_name = file.suffix.contains(".test.")
        || file.suffix.contains(".spec.")
        || stem.starts_with("test_")
        || stem.ends_with("_test")
        || stem.ends_with("-test");
    if test_name || in_dir(TEST_DIRS) {
        return FileKind::Test;
    }
    if CONFIG_EXTS.contains(&ext.as_str())
        || in_dir(CONFIG_DIRS)
        || (stem.starts_with('.') && !CODE_EXTS.contains(&ext.as_str()))
    {
        return FileKind::Config;
    }
    if DOC_EXTS.contains(&ext.as_str()) || in_dir(DOC_DIRS) {
        return FileKind::Doc;
    }
    if CODE_EXTS.contains(&ext.as_str()) {
        return FileKind::Source;
    }
    FileKind::Other
}

/// A subtree or file the walk could not read. Recovered, never fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexWarning {
    pub path: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Symbol extraction
// ---------------------------------------------------------------------------

static DECL_RE: OnceLock<Regex> = OnceLock::new();
static KEY_RE: OnceLock<Regex> = OnceLock::new();

fn decl_re() -> &'static Regex {
    DECL_RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?:(?:pub(?:\([^)]*\))?|export|default|async|abstract|public|private|protected|static|final|unsafe|extern|open|internal|sealed|data)\s+)*(fn|def|function|func|class|struct|enum|trait|interface|type|const|let|var|val|static|object|record)\s+(?:\([^)]*\)\s*)?\*?([A-Za-z_$][A-Za-z0-9_$]*)",
        )
        .unwrap()
    })
}

fn key_re() -> &'static Regex {
    KEY_RE.get_or_init(|| Regex::new(r#"^\s*"?([A-Za-z_][A-Za-z0-9_.\-]*)"?\s*[:=]"#).unwrap())
}

fn keyword_category(keyword: &str) -> SymbolCategory {
    match keyword {
        "fn" | "def" | "function" | "func" => SymbolCategory::Function,
        "const" | "let" | "var" | "val" | "static" => SymbolCategory::Value,
        _ => SymbolCategory::Type,
    }
}

/// Declarations in a source file, or keys in a config file.
pub fn extract_symbols(text: &str, kind: FileKind) -> Vec<Symbol> {
    let mut symbols = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if kind == FileKind::Config {
            let trimmed = line.trim_start();
            if trimmed.starts_with('#') || trimmed.starts_with("//") || trimmed.starts_with('[') {
                continue;
            }
            if let Some(caps) = key_re().captures(line) {
                symbols.push(Symbol {
                    name: caps[1].to_string(),
                    category: SymbolCategory::Key,
                    line: i + 1,
                });
            }
        } else if let Some(caps) = decl_re().captures(line) {
            symbols.push(Symbol {
                name: caps[2].to_string(),
                category: keyword_category(&caps[1]),
                line: i + 1,
            });
        }
    }
    symbols
}

fn wants_symbols(file: &IndexedFile) -> bool {
    match file.kind {
        FileKind::Source | FileKind::Test => is_code_extension(file.extension()),
        FileKind::Config => CONFIG_EXTS.contains(&file.extension()),
        FileKind::Doc | FileKind::Other => false,
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Shared flag a caller sets to abandon an indexing pass.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// IndexOptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub exclude_dirs: BTreeSet<String>,
    /// Root-relative files never indexed. Report and revised-plan outputs
    /// are skipped by name as well.
    pub skip_files: BTreeSet<String>,
    pub timeout: Option<Duration>,
    /// Maximum concurrent directory reads.
    pub workers: usize,
}

impl IndexOptions {
    pub fn from_config(config: &Config) -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            exclude_dirs: config
                .exclude_dirs
                .iter()
                .map(|d| paths::normalize(d))
                .filter(|d| !d.is_empty())
                .collect(),
            skip_files: BTreeSet::new(),
            timeout: config.timeout(),
            workers,
        }
    }

    /// Also skip these files when they live under `root`.
    pub fn skipping(mut self, root: &Path, files: &[PathBuf]) -> Self {
        self.skip_files
            .extend(files.iter().filter_map(|f| paths::relative_to(root, f)));
        self
    }
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

// ---------------------------------------------------------------------------
// CodebaseIndex
// ---------------------------------------------------------------------------

/// Immutable snapshot of a codebase, shared by reference across all claims.
#[derive(Debug, Clone, Serialize)]
pub struct CodebaseIndex {
    root: PathBuf,
    files: BTreeMap<String, IndexedFile>,
    dirs: BTreeSet<String>,
    warnings: Vec<IndexWarning>,
    timed_out: bool,
}

impl CodebaseIndex {
    /// Walk `root` and build the index.
    ///
    /// Fails only when the root itself is missing or unreadable. Unreadable
    /// subtrees are skipped with a warning and mark the index partial; so
    /// does hitting the soft timeout. A cancelled pass returns
    /// [`PlanCheckError::Cancelled`] and its partial results are dropped.
    pub async fn build(root: &Path, opts: &IndexOptions, cancel: &CancelFlag) -> Result<Self> {
        let index_err = |reason: String| PlanCheckError::Index {
            root: root.to_path_buf(),
            reason,
        };
        let meta = tokio::fs::metadata(root)
            .await
            .map_err(|e| index_err(e.to_string()))?;
        if !meta.is_dir() {
            return Err(index_err("not a directory".to_string()));
        }
        tokio::fs::read_dir(root)
            .await
            .map_err(|e| index_err(e.to_string()))?;

        let walker = Arc::new(Walker {
            root: root.to_path_buf(),
            exclude: opts.exclude_dirs.clone(),
            skip: opts.skip_files.clone(),
            semaphore: Arc::new(Semaphore::new(opts.workers.max(1))),
            state: Arc::new(Mutex::new(WalkState::default())),
            cancel: cancel.clone(),
            halted: Arc::new(AtomicBool::new(false)),
        });

        tracing::debug!(root = %root.display(), workers = opts.workers, "indexing codebase");
        let timed_out = match opts.timeout {
            Some(limit) => tokio::time::timeout(limit, walker.clone().walk())
                .await
                .is_err(),
            None => {
                walker.clone().walk().await;
                false
            }
        };
        walker.halted.store(true, Ordering::Relaxed);

        if cancel.is_cancelled() {
            return Err(PlanCheckError::Cancelled);
        }

        let state = {
            let mut guard = walker.state.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        let mut warnings = state.warnings;
        warnings.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.message.cmp(&b.message)));

        if timed_out {
            tracing::warn!(
                root = %root.display(),
                files = state.files.len(),
                "indexing timed out; continuing with a partial index"
            );
        }
        tracing::debug!(files = state.files.len(), dirs = state.dirs.len(), "index complete");

        Ok(Self {
            root: root.to_path_buf(),
            files: state.files,
            dirs: state.dirs,
            warnings,
            timed_out,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> impl Iterator<Item = &IndexedFile> {
        self.files.values()
    }

    pub fn dirs(&self) -> impl Iterator<Item = &str> {
        self.dirs.iter().map(String::as_str)
    }

    pub fn warnings(&self) -> &[IndexWarning] {
        &self.warnings
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// True when evidence may be missing: a subtree was skipped or the
    /// walk stopped at the soft timeout.
    pub fn is_partial(&self) -> bool {
        self.timed_out || !self.warnings.is_empty()
    }

    pub fn file(&self, path: &str) -> Option<&IndexedFile> {
        self.files.get(path)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        path.is_empty() || self.dirs.contains(path)
    }

    /// Whether a normalized path names an indexed file or directory.
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path) || self.is_dir(path)
    }

    pub fn files_named(&self, name: &str) -> Vec<&IndexedFile> {
        self.files.values().filter(|f| f.name == name).collect()
    }

    pub fn symbols(&self) -> impl Iterator<Item = (&IndexedFile, &Symbol)> {
        self.files
            .values()
            .flat_map(|f| f.symbols.iter().map(move |s| (f, s)))
    }

    /// Most common multi-word stem style among files with `extension`.
    pub fn dominant_file_style(&self, extension: &str) -> Option<CaseStyle> {
        dominant(
            self.files
                .values()
                .filter(|f| f.extension() == extension)
                .map(|f| f.style),
        )
    }

    /// Most common multi-word style among declared names of `category`.
    pub fn dominant_symbol_style(&self, category: SymbolCategory) -> Option<CaseStyle> {
        dominant(
            self.symbols()
                .filter(|(_, s)| s.category == category)
                .map(|(_, s)| naming::classify(&s.name)),
        )
    }

    #[cfg(test)]
    pub(crate) fn from_paths(paths: &[&str]) -> Self {
        let mut files = BTreeMap::new();
        let mut dirs = BTreeSet::new();
        for p in paths {
            let file = IndexedFile::describe(p);
            let mut dir = file.dir.as_str();
            while !dir.is_empty() {
                dirs.insert(dir.to_string());
                dir = paths::parent_dir(dir);
            }
            files.insert(p.to_string(), file);
        }
        Self {
            root: PathBuf::from("."),
            files,
            dirs,
            warnings: Vec::new(),
            timed_out: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_symbols(mut self, path: &str, symbols: Vec<Symbol>) -> Self {
        if let Some(f) = self.files.get_mut(path) {
            f.symbols = symbols;
        }
        self
    }

    #[cfg(test)]
    pub(crate) fn mark_timed_out(mut self) -> Self {
        self.timed_out = true;
        self
    }
}

fn dominant(styles: impl Iterator<Item = CaseStyle>) -> Option<CaseStyle> {
    let mut counts: BTreeMap<CaseStyle, usize> = BTreeMap::new();
    for style in styles.filter(|s| s.is_multiword()) {
        *counts.entry(style).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(style, _)| style)
}

// ---------------------------------------------------------------------------
// Walker
// ---------------------------------------------------------------------------

#[derive(Default)]
struct WalkState {
    files: BTreeMap<String, IndexedFile>,
    dirs: BTreeSet<String>,
    warnings: Vec<IndexWarning>,
}

struct Walker {
    root: PathBuf,
    exclude: BTreeSet<String>,
    skip: BTreeSet<String>,
    semaphore: Arc<Semaphore>,
    state: Arc<Mutex<WalkState>>,
    cancel: CancelFlag,
    /// Set once the caller stops waiting (timeout), so detached reads exit.
    halted: Arc<AtomicBool>,
}

impl Walker {
    fn stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.halted.load(Ordering::Relaxed)
    }

    fn is_excluded(&self, rel: &str, name: &str) -> bool {
        self.exclude.contains(name) || self.exclude.contains(rel)
    }

    fn is_output(&self, rel: &str, name: &str) -> bool {
        name.ends_with(paths::REPORT_SUFFIX)
            || name.ends_with(paths::REVISED_SUFFIX)
            || self.skip.contains(rel)
    }

    fn warn(&self, path: &str, message: String) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.warnings.push(IndexWarning {
            path: path.to_string(),
            message,
        });
    }

    /// Breadth-first walk: every directory of one level is read
    /// concurrently before descending.
    async fn walk(self: Arc<Self>) {
        let mut frontier = vec![String::new()];
        while !frontier.is_empty() {
            if self.stopped() {
                return;
            }
            let mut handles = Vec::with_capacity(frontier.len());
            for dir in frontier.drain(..) {
                let walker = self.clone();
                let rel = dir.clone();
                handles.push((dir, tokio::spawn(async move { walker.read_dir(rel).await })));
            }
            let mut next = Vec::new();
            for (dir, handle) in handles {
                match handle.await {
                    Ok(subdirs) => next.extend(subdirs),
                    Err(e) => self.warn(&dir, format!("directory worker failed: {e}")),
                }
            }
            next.sort();
            frontier = next;
        }
    }

    async fn read_dir(&self, rel: String) -> Vec<String> {
        let _permit = match self.semaphore.acquire().await {
            Ok(p) => p,
            Err(_) => return Vec::new(),
        };
        if self.stopped() {
            return Vec::new();
        }

        let abs = if rel.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&rel)
        };
        let mut entries = match tokio::fs::read_dir(&abs).await {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(path = %rel, error = %e, "skipping unreadable directory");
                self.warn(&rel, e.to_string());
                return Vec::new();
            }
        };

        let mut subdirs = Vec::new();
        let mut files = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(path = %rel, error = %e, "directory listing interrupted");
                    self.warn(&rel, e.to_string());
                    break;
                }
            };
            if self.stopped() {
                return Vec::new();
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let child = if rel.is_empty() {
                name.clone()
            } else {
                format!("{rel}/{name}")
            };
            let file_type = match entry.file_type().await {
                Ok(t) => t,
                Err(e) => {
                    self.warn(&child, e.to_string());
                    continue;
                }
            };

            if file_type.is_dir() {
                if self.is_excluded(&child, &name) {
                    tracing::debug!(path = %child, "excluded subtree");
                    continue;
                }
                subdirs.push(child);
            } else if file_type.is_file() {
                if self.is_output(&child, &name) {
                    tracing::debug!(path = %child, "skipping plancheck output");
                    continue;
                }
                let mut file = IndexedFile::describe(&child);
                if wants_symbols(&file) {
                    file.symbols = self.scan(&entry.path(), &child, file.kind).await;
                }
                files.push(file);
            }
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        for file in files {
            state.files.insert(file.path.clone(), file);
        }
        for dir in &subdirs {
            state.dirs.insert(dir.clone());
        }
        subdirs
    }

    async fn scan(&self, abs: &Path, rel: &str, kind: FileKind) -> Vec<Symbol> {
        match tokio::fs::metadata(abs).await {
            Ok(meta) if meta.len() > MAX_SCAN_BYTES => return Vec::new(),
            Ok(_) => {}
            Err(e) => {
                self.warn(rel, e.to_string());
                return Vec::new();
            }
        }
        match tokio::fs::read_to_string(abs).await {
            Ok(text) => extract_symbols(&text, kind),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                tracing::warn!(path = %rel, error = %e, "skipping unreadable file");
                self.warn(rel, e.to_string());
                Vec::new()
            }
            Err(e) => {
                tracing::debug!(path = %rel, error = %e, "file not scanned");
                Vec::new()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
