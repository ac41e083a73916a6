use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File name constants
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = ".plancheck.yaml";
pub const REPORT_SUFFIX: &str = ".review.json";
pub const REVISED_SUFFIX: &str = ".revised.md";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Default location of the persisted report: next to the plan.
pub fn report_path(plan: &Path) -> PathBuf {
    sibling_with_suffix(plan, REPORT_SUFFIX)
}

/// Default location of a plan with approved changes applied.
pub fn revised_path(plan: &Path) -> PathBuf {
    sibling_with_suffix(plan, REVISED_SUFFIX)
}

fn sibling_with_suffix(plan: &Path, suffix: &str) -> PathBuf {
    let stem = plan
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plan".to_string());
    plan.with_file_name(format!("{stem}{suffix}"))
}

/// `path` relative to `root` in index form, when it lies under `root`.
/// The file itself need not exist; its parent directory must.
pub fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let root = root.canonicalize().ok()?;
    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.canonicalize().ok()?,
        _ => std::env::current_dir().ok()?.canonicalize().ok()?,
    };
    let rel = parent.join(name);
    let rel = rel.strip_prefix(&root).ok()?;
    Some(normalize(&rel.to_string_lossy()))
}

/// Normalize a plan-written path to the index's form: forward slashes,
/// no leading `./` or `/`, no trailing slash.
pub fn normalize(raw: &str) -> String {
    let mut s = raw.trim().replace('\\', "/");
    while let Some(rest) = s.strip_prefix("./") {
        s = rest.to_string();
    }
    let s = s.trim_start_matches('/').trim_end_matches('/');
    s.split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Parent directory of a normalized path (`""` for root-level entries).
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Last component of a normalized path.
pub fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

/// Number of directory hops between two normalized directories.
pub fn tree_distance(a: &str, b: &str) -> usize {
    let a: Vec<&str> = a.split('/').filter(|c| !c.is_empty()).collect();
    let b: Vec<&str> = b.split('/').filter(|c| !c.is_empty()).collect();
    let common = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    (a.len() - common) + (b.len() - common)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
