//! Plan parser.
//!
//! Turns a Markdown-ish plan into tasks, steps and claims. Parsing is
//! permissive: anything that cannot be classified becomes a structural claim
//! flagged for manual review, and the only hard failure is a document with
//! no task structure at all.

use crate::error::{PlanCheckError, Result};
use crate::index::is_known_extension;
use crate::naming;
use crate::paths;
use crate::types::SymbolCategory;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Data model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub path: String,
    pub title: String,
    /// SHA-256 of the raw plan text, hex encoded.
    pub digest: String,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// 1-based position in the plan.
    pub ordinal: usize,
    /// Number written in the heading (`Task 3`), when present.
    pub number: Option<u32>,
    pub title: String,
    pub line: usize,
    pub steps: Vec<Step>,
    /// Task numbers this task declares it depends on, as written.
    pub dependencies: Vec<u32>,
    pub claims: Vec<Claim>,
    /// Commands found outside any step.
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// 1-based position within the task.
    pub index: usize,
    pub line: usize,
    /// List marker as written (`-`, `*`, `1.`).
    pub marker: String,
    pub indent: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    pub is_verification: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub task: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    pub line: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step {
            Some(step) => write!(f, "Task {}, Step {} (line {})", self.task, step, self.line),
            None => write!(f, "Task {} (line {})", self.task, self.line),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralCheck {
    /// A config field the plan reads or writes.
    ConfigField,
    /// A fragment the parser could not classify.
    ManualReview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaimKind {
    Path { to_be_created: bool },
    Naming { category: Option<SymbolCategory> },
    Reference { category: Option<SymbolCategory> },
    Structural { check: StructuralCheck },
}

impl ClaimKind {
    pub fn label(&self) -> &'static str {
        match self {
            ClaimKind::Path { .. } => "PathClaim",
            ClaimKind::Naming { .. } => "NamingClaim",
            ClaimKind::Reference { .. } => "ReferenceClaim",
            ClaimKind::Structural { .. } => "StructuralClaim",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub kind: ClaimKind,
    /// The literal text asserted by the plan.
    pub text: String,
    pub location: Location,
    /// Directory the claim is about, used to rank precedent by proximity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Claim {
    /// The name a naming or reference claim is about: the last segment of a
    /// qualified name, without call parentheses.
    pub fn subject(&self) -> &str {
        let text = self.text.trim_end_matches("()");
        text.rsplit(['.', ':'])
            .find(|s| !s.is_empty())
            .unwrap_or(text)
    }

    pub fn needs_review(&self) -> bool {
        matches!(
            self.kind,
            ClaimKind::Structural {
                check: StructuralCheck::ManualReview
            }
        )
    }
}

impl Plan {
    /// Ordinal of the task a dependency number refers to.
    ///
    /// Numbers written in headings win; plans without numbered headings are
    /// addressed by position.
    pub fn resolve(&self, number: u32) -> Option<usize> {
        if self.tasks.iter().any(|t| t.number.is_some()) {
            self.tasks
                .iter()
                .find(|t| t.number == Some(number))
                .map(|t| t.ordinal)
        } else {
            let n = number as usize;
            (n >= 1 && n <= self.tasks.len()).then_some(n)
        }
    }

    pub fn task(&self, ordinal: usize) -> Option<&Task> {
        self.tasks.get(ordinal.checked_sub(1)?)
    }

    pub fn claims(&self) -> impl Iterator<Item = &Claim> {
        self.tasks.iter().flat_map(|t| t.claims.iter())
    }
}

impl Task {
    /// Distinct file paths (not directories) this task claims to touch.
    pub fn touched_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .claims
            .iter()
            .filter(|c| matches!(c.kind, ClaimKind::Path { .. }))
            .map(|c| paths::normalize(&c.text))
            .filter(|p| !p.is_empty() && !is_dir_path(p))
            .collect();
        files.sort();
        files.dedup();
        files
    }

    pub fn has_verification(&self) -> bool {
        self.steps.iter().any(|s| s.is_verification)
    }
}

fn is_dir_path(normalized: &str) -> bool {
    !paths::file_name(normalized).contains('.')
}

pub fn digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

// ---------------------------------------------------------------------------
// Lexicon
// ---------------------------------------------------------------------------

pub(crate) const VERIFY_VERBS: &[&str] = &[
    "verify", "run", "test", "check", "confirm", "validate", "ensure", "execute",
];

const TOOLS: &[&str] = &[
    "cargo", "npm", "npx", "yarn", "pnpm", "node", "deno", "bun", "go", "python", "python3",
    "pip", "pytest", "make", "git", "sh", "bash", "docker", "kubectl", "rm", "mv", "cp",
    "mkdir", "curl", "psql", "mvn", "gradle", "./gradlew", "dotnet", "bundle", "rake", "rails",
    "jest", "vitest", "tsc", "eslint", "ruff", "mypy", "just",
];

const CREATE_VERBS: &[&str] = &[
    "create", "creates", "creating", "new", "scaffold", "generate", "introduce",
];

const NEW_MARKERS: &[&str] = &["(new", "(to be created", "to be created"];

const CONFIG_WORDS: &[&str] = &[
    "field", "key", "option", "setting", "variable", "var", "env", "flag",
];

fn category_hint(word: &str) -> Option<SymbolCategory> {
    match word {
        "function" | "method" | "fn" | "func" | "handler" | "hook" => Some(SymbolCategory::Function),
        "class" | "struct" | "type" | "interface" | "trait" | "enum" | "component" | "model" => {
            Some(SymbolCategory::Type)
        }
        "constant" | "const" => Some(SymbolCategory::Value),
        _ => None,
    }
}

pub fn looks_like_command(span: &str) -> bool {
    span.split_whitespace()
        .next()
        .is_some_and(|first| TOOLS.contains(&first))
}

// ---------------------------------------------------------------------------
// Regexes
// ---------------------------------------------------------------------------

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*#*\s*$").unwrap())
}

fn item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*)([-*+]|\d+[.)])\s+(?:\[[ xX]\]\s+)?(.*)$").unwrap())
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(```|~~~)").unwrap())
}

fn task_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:task|step|phase|milestone|part)\s*#?\s*(\d+)\b|^(\d+)[.):]\s",
        )
        .unwrap()
    })
}

fn code_span_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`]+)`").unwrap())
}

fn dep_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:depends\s+on|dependencies|dependency|after|requires|blocked\s+by|prerequisites?)\b\s*:?\s*(.*)",
        )
        .unwrap()
    })
}

fn task_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\btask\s*#?\s*(\d+)").unwrap())
}

fn bare_numbers_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\d\s,&]+(?:and\s+\d+)?\s*\.?$").unwrap())
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").unwrap())
}

fn meta_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^[*_]*\s*(?:files?|depends\s+on|dependencies|prerequisites?|requires|blocked\s+by|goal|context|notes?|owner|estimate)\s*[*_]*\s*:",
        )
        .unwrap()
    })
}

fn separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i);\s*|,\s*then\s+|\s+then\s+|,?\s+and\s+|\s+&\s+").unwrap()
    })
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\S+").unwrap())
}

fn named_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:named|called)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap())
}

fn label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:run|verify|expected|expect)\s*:").unwrap())
}

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(?:\(\))?$").unwrap())
}

fn qualified_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^[A-Za-z_$][A-Za-z0-9_$]*(?:(?:::|\.)[A-Za-z_$][A-Za-z0-9_$]*)+(?:\(\))?$",
        )
        .unwrap()
    })
}

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

enum Line {
    Heading {
        level: usize,
        text: String,
    },
    Item {
        indent: String,
        marker: String,
        text: String,
    },
    Text(String),
    Fence(Vec<String>),
    Blank,
}

fn lex(raw: &str) -> Vec<(usize, Line)> {
    let mut out = Vec::new();
    let mut fence: Option<(usize, String, Vec<String>)> = None;
    for (i, line) in raw.lines().enumerate() {
        let number = i + 1;
        let line = line.trim_end_matches('\r');
        if let Some((start, marker, mut body)) = fence.take() {
            if line.trim_start().starts_with(marker.as_str()) {
                out.push((start, Line::Fence(body)));
            } else {
                body.push(line.to_string());
                fence = Some((start, marker, body));
            }
            continue;
        }
        if let Some(caps) = fence_re().captures(line) {
            fence = Some((number, caps[1].to_string(), Vec::new()));
            continue;
        }
        if line.trim().is_empty() {
            out.push((number, Line::Blank));
        } else if let Some(caps) = heading_re().captures(line) {
            out.push((
                number,
                Line::Heading {
                    level: caps[1].len(),
                    text: caps[2].to_string(),
                },
            ));
        } else if let Some(caps) = item_re().captures(line) {
            let text = caps[3].trim_end().to_string();
            if text.chars().all(|c| matches!(c, '*' | '-' | '_' | ' ')) {
                continue;
            }
            out.push((
                number,
                Line::Item {
                    indent: caps[1].to_string(),
                    marker: caps[2].to_string(),
                    text,
                },
            ));
        } else {
            out.push((number, Line::Text(line.to_string())));
        }
    }
    // An unterminated fence still carries its body.
    if let Some((start, _, body)) = fence {
        out.push((start, Line::Fence(body)));
    }
    out
}

fn task_number(title: &str) -> Option<u32> {
    let caps = task_number_re().captures(title.trim())?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

/// Heading level that delimits tasks: the shallowest numbered-task heading,
/// else the shallowest level used more than once, else the shallowest level.
fn task_level(lines: &[(usize, Line)]) -> Option<usize> {
    let headings: Vec<(usize, &str)> = lines
        .iter()
        .filter_map(|(_, l)| match l {
            Line::Heading { level, text } => Some((*level, text.as_str())),
            _ => None,
        })
        .collect();
    if let Some(level) = headings
        .iter()
        .filter(|(_, text)| task_number(text).is_some())
        .map(|(level, _)| *level)
        .min()
    {
        return Some(level);
    }
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for (level, _) in &headings {
        *counts.entry(*level).or_default() += 1;
    }
    counts
        .iter()
        .find(|(_, count)| **count > 1)
        .map(|(level, _)| *level)
        .or_else(|| counts.keys().next().copied())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Prose attached to a task: heading text, metadata items and plain lines.
struct Prose {
    line: usize,
    step: Option<usize>,
    text: String,
}

struct Draft {
    task: Task,
    prose: Vec<Prose>,
    base_indent: Option<usize>,
}

impl Draft {
    fn new(ordinal: usize, title: &str, line: usize) -> Self {
        let mut prose = Vec::new();
        prose.push(Prose {
            line,
            step: None,
            text: title.to_string(),
        });
        Self {
            task: Task {
                ordinal,
                number: task_number(title),
                title: title.to_string(),
                line,
                steps: Vec::new(),
                dependencies: Vec::new(),
                claims: Vec::new(),
                commands: Vec::new(),
            },
            prose,
            base_indent: None,
        }
    }
}

/// Parse raw plan text. `path` is recorded for identity only.
pub fn parse(path: &str, raw: &str) -> Result<Plan> {
    if raw.trim().is_empty() {
        return Err(PlanCheckError::Parse("plan document is empty".to_string()));
    }
    let lines = lex(raw);
    let level = task_level(&lines);

    let fallback_title = std::path::Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plan".to_string());
    let mut title: Option<String> = None;
    let mut drafts: Vec<Draft> = Vec::new();
    let mut current: Option<Draft> = None;
    let mut last_step_open = false;

    if level.is_none() {
        current = Some(Draft::new(1, &fallback_title, 1));
        if let Some(d) = current.as_mut() {
            d.prose.clear();
        }
    }

    for (number, line) in lines {
        match line {
            Line::Heading { level: l, text } => {
                let task_level = level.unwrap_or(usize::MAX);
                if l == task_level {
                    if let Some(d) = current.take() {
                        drafts.push(d);
                    }
                    current = Some(Draft::new(drafts.len() + 1, &text, number));
                } else if l < task_level {
                    if drafts.is_empty() && current.is_none() && title.is_none() {
                        title = Some(text);
                    } else if let Some(d) = current.take() {
                        drafts.push(d);
                    }
                }
                last_step_open = false;
            }
            Line::Item {
                indent,
                marker,
                text,
            } => {
                let Some(draft) = current.as_mut() else {
                    continue;
                };
                let width = indent.chars().count();
                let base = *draft.base_indent.get_or_insert(width);
                let nested = width > base && last_step_open && !draft.task.steps.is_empty();
                if nested {
                    if let Some(step) = draft.task.steps.last_mut() {
                        step.details.push(text.clone());
                        draft.prose.push(Prose {
                            line: number,
                            step: Some(step.index),
                            text,
                        });
                    }
                } else if meta_re().is_match(&text) {
                    draft.prose.push(Prose {
                        line: number,
                        step: None,
                        text,
                    });
                    last_step_open = false;
                } else {
                    let index = draft.task.steps.len() + 1;
                    draft.task.steps.push(new_step(index, number, marker, indent, text));
                    last_step_open = true;
                }
            }
            Line::Text(text) => {
                let Some(draft) = current.as_mut() else {
                    continue;
                };
                let indented = text.starts_with(' ') || text.starts_with('\t');
                let step = if indented && last_step_open {
                    draft.task.steps.last_mut().map(|s| {
                        s.details.push(text.trim().to_string());
                        s.index
                    })
                } else {
                    last_step_open = false;
                    None
                };
                draft.prose.push(Prose {
                    line: number,
                    step,
                    text,
                });
            }
            Line::Fence(body) => {
                let Some(draft) = current.as_mut() else {
                    continue;
                };
                let commands: Vec<String> = body
                    .iter()
                    .map(|l| l.trim().trim_start_matches("$ ").to_string())
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .collect();
                match draft.task.steps.last_mut().filter(|_| last_step_open) {
                    Some(step) => {
                        if step.is_verification && step.verification.is_none() && !commands.is_empty() {
                            step.verification = Some(commands.join("\n"));
                        }
                        step.commands.extend(commands);
                    }
                    None => draft.task.commands.extend(commands),
                }
            }
            Line::Blank => {}
        }
    }
    if let Some(d) = current.take() {
        drafts.push(d);
    }

    let has_structure = drafts
        .iter()
        .any(|d| level.is_some() || !d.task.steps.is_empty());
    if drafts.is_empty() || !has_structure {
        return Err(PlanCheckError::Parse(
            "no headings or list items found".to_string(),
        ));
    }

    let tasks = drafts.into_iter().map(finish_task).collect();
    Ok(Plan {
        path: path.to_string(),
        title: title.unwrap_or(fallback_title),
        digest: digest(raw),
        tasks,
    })
}

fn new_step(index: usize, line: usize, marker: String, indent: String, text: String) -> Step {
    let first = first_word(&text);
    let is_verification =
        VERIFY_VERBS.contains(&first.as_str()) || label_re().is_match(&text);
    Step {
        index,
        line,
        marker,
        indent,
        description: text,
        details: Vec::new(),
        is_verification,
        verification: None,
        commands: Vec::new(),
    }
}

/// First word, lowercased, with Markdown emphasis stripped.
pub fn first_word(text: &str) -> String {
    text.split_whitespace()
        .next()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .unwrap_or_default()
}

fn finish_task(draft: Draft) -> Task {
    let Draft {
        mut task, prose, ..
    } = draft;
    let ordinal = task.ordinal;
    let mut claims = Vec::new();

    for p in &prose {
        task.dependencies.extend(dependencies_in(&p.text));
        let location = Location {
            task: ordinal,
            step: p.step,
            line: p.line,
        };
        let mut commands = Vec::new();
        extract_claims(&p.text, location, false, &mut claims, &mut commands);
        match p.step.and_then(|i| task.steps.get_mut(i - 1)) {
            Some(step) => step.commands.extend(commands),
            None => task.commands.extend(commands),
        }
    }

    for step in &mut task.steps {
        task.dependencies.extend(dependencies_in(&step.description));
        let location = Location {
            task: ordinal,
            step: Some(step.index),
            line: step.line,
        };
        let mut commands = Vec::new();
        extract_claims(
            &step.description,
            location,
            step.is_verification,
            &mut claims,
            &mut commands,
        );
        if step.is_verification && step.verification.is_none() {
            step.verification = commands.first().cloned();
        }
        let mut all = commands;
        all.append(&mut step.commands);
        step.commands = all;
    }

    task.dependencies.sort_unstable();
    task.dependencies.dedup();

    claims.sort_by_key(|c| (c.location.line, c.location.step));
    claims.dedup_by(|a, b| a.kind == b.kind && a.text == b.text && a.location == b.location);
    assign_scopes(&mut claims);
    task.claims = claims;
    task
}

fn dependencies_in(text: &str) -> Vec<u32> {
    let Some(caps) = dep_re().captures(text) else {
        return Vec::new();
    };
    let rest = caps[1].trim();
    let refs: Vec<u32> = task_ref_re()
        .captures_iter(rest)
        .filter_map(|c| c[1].parse().ok())
        .collect();
    if !refs.is_empty() {
        return refs;
    }
    if bare_numbers_re().is_match(rest) {
        return number_re()
            .find_iter(rest)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
    }
    Vec::new()
}

fn assign_scopes(claims: &mut [Claim]) {
    let path_dir = |c: &Claim| -> Option<String> {
        match c.kind {
            ClaimKind::Path { .. } => {
                let p = paths::normalize(&c.text);
                Some(if is_dir_path(&p) {
                    p
                } else {
                    paths::parent_dir(&p).to_string()
                })
            }
            _ => None,
        }
    };
    let task_scope = claims.iter().find_map(path_dir);
    let step_scopes: Vec<(Option<usize>, String)> = claims
        .iter()
        .filter_map(|c| path_dir(c).map(|d| (c.location.step, d)))
        .collect();
    for claim in claims.iter_mut() {
        let step = claim.location.step;
        let scope = path_dir(claim).or_else(|| {
            step_scopes
                .iter()
                .find(|(s, _)| s.is_some() && *s == step)
                .map(|(_, d)| d.clone())
                .or_else(|| task_scope.clone())
        });
        claim.scope = scope;
    }
}

// ---------------------------------------------------------------------------
// Claim extraction
// ---------------------------------------------------------------------------

/// Whether a token names a file or directory. Tokens lifted from plain prose
/// (`strict`) need a known extension or a trailing slash.
pub fn is_path_like(token: &str, strict: bool) -> bool {
    if token.contains("://")
        || token.contains("::")
        || token.chars().any(char::is_whitespace)
        || token.is_empty()
    {
        return false;
    }
    let valid = |c: char| c.is_alphanumeric() || matches!(c, '.' | '_' | '-' | '@' | '/' | '\\');
    if !token.chars().all(valid) {
        return false;
    }
    let normalized = token.replace('\\', "/");
    let last = normalized.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    let has_ext = last
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && is_known_extension(ext));
    if has_ext {
        return true;
    }
    if !normalized.contains('/') || normalized.starts_with('/') {
        return false;
    }
    let inner_ok = normalized
        .trim_end_matches('/')
        .split('/')
        .all(|c| !c.is_empty() && c.chars().any(char::is_alphanumeric));
    inner_ok && (!strict || normalized.ends_with('/'))
}

/// `text` with every inline code span blanked out, byte offsets preserved,
/// so prose scanning never sees span content.
pub(crate) fn mask_code_spans(text: &str, fill: char) -> String {
    let mut masked = text.to_string();
    for m in code_span_re().find_iter(text) {
        masked.replace_range(m.range(), &fill.to_string().repeat(m.len()));
    }
    masked
}

/// Split text into `(separator, clause)` pairs, ignoring separators inside
/// code spans. The first separator is empty.
pub(crate) fn split_clauses(text: &str) -> Vec<(&str, &str)> {
    let masked = mask_code_spans(text, 'x');
    let mut out = Vec::new();
    let mut start = 0;
    let mut sep = "";
    for m in separator_re().find_iter(&masked) {
        out.push((sep, &text[start..m.start()]));
        sep = &text[m.range()];
        start = m.end();
    }
    out.push((sep, &text[start..]));
    out
}

/// Whether the path or name at `span` is marked as new: a `(new)` marker
/// right after it, a bare `new` just before it, or a create verb opening its
/// clause.
/// A clause that opens with a code span continues the clause before it.
fn marked_new(text: &str, masked: &str, span: Range<usize>) -> bool {
    let after = text[span.end..].trim_start().to_lowercase();
    if NEW_MARKERS.iter().any(|m| after.starts_with(m)) {
        return true;
    }
    let adjective = masked[..span.start]
        .split_whitespace()
        .rev()
        .take(2)
        .any(|w| w.eq_ignore_ascii_case("new"));
    if adjective {
        return true;
    }
    let starts: Vec<usize> = std::iter::once(0)
        .chain(
            separator_re()
                .find_iter(&mask_code_spans(text, 'x'))
                .map(|m| m.end()),
        )
        .filter(|&start| start <= span.start)
        .collect();
    starts
        .iter()
        .rev()
        .find(|&&start| !text[start..].trim_start().starts_with('`'))
        .map(|&start| first_word(&masked[start..]))
        .is_some_and(|w| CREATE_VERBS.contains(&w.as_str()))
}

fn words_before(masked: &str, end: usize, n: usize) -> Vec<String> {
    masked[..end]
        .split_whitespace()
        .rev()
        .take(n)
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .collect()
}

fn word_after(masked: &str, start: usize) -> String {
    masked[start..]
        .split_whitespace()
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .unwrap_or_default()
}

fn extract_claims(
    text: &str,
    location: Location,
    verification: bool,
    claims: &mut Vec<Claim>,
    commands: &mut Vec<String>,
) {
    let masked = mask_code_spans(text, ' ');

    let mut push = |kind: ClaimKind, text: &str| {
        claims.push(Claim {
            kind,
            text: text.to_string(),
            location,
            scope: None,
        });
    };

    for caps in code_span_re().captures_iter(text) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        let span = caps[1].trim();
        if span.is_empty() {
            continue;
        }
        if looks_like_command(span) || (verification && span.contains(' ')) {
            commands.push(span.to_string());
            continue;
        }
        if is_path_like(span, false) {
            push(
                ClaimKind::Path {
                    to_be_created: marked_new(text, &masked, whole.clone()),
                },
                span,
            );
            continue;
        }
        let before = words_before(&masked, whole.start, 2);
        let after = word_after(&masked, whole.end);
        if ident_re().is_match(span) {
            if before.iter().any(|w| CONFIG_WORDS.contains(&w.as_str())) {
                push(
                    ClaimKind::Structural {
                        check: StructuralCheck::ConfigField,
                    },
                    span,
                );
                continue;
            }
            let category = if span.ends_with("()") {
                Some(SymbolCategory::Function)
            } else {
                before
                    .iter()
                    .chain(std::iter::once(&after))
                    .find_map(|w| category_hint(w))
            };
            let named = before.iter().any(|w| w == "named" || w == "called");
            if named || marked_new(text, &masked, whole.clone()) {
                push(ClaimKind::Naming { category }, span);
            } else if category.is_some() {
                push(ClaimKind::Reference { category }, span);
            } else {
                push(ClaimKind::Naming { category }, span);
            }
        } else if qualified_re().is_match(span) {
            let category = span.ends_with("()").then_some(SymbolCategory::Function);
            push(ClaimKind::Reference { category }, span);
        } else {
            push(
                ClaimKind::Structural {
                    check: StructuralCheck::ManualReview,
                },
                span,
            );
        }
    }

    for m in token_re().find_iter(&masked) {
        let token = m
            .as_str()
            .trim_matches(|c: char| matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | ',' | ';' | ':' | '"' | '\'' | '*'))
            .trim_end_matches('.');
        if is_path_like(token, true) {
            push(
                ClaimKind::Path {
                    to_be_created: marked_new(text, &masked, m.range()),
                },
                token,
            );
        }
    }

    for caps in named_re().captures_iter(&masked) {
        let name = &caps[1];
        let informative = name.chars().any(|c| c.is_uppercase() || c == '_')
            || naming::split_words(name).len() > 1;
        if informative {
            let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
            let category = words_before(&masked, start, 1)
                .first()
                .and_then(|w| category_hint(w));
            push(ClaimKind::Naming { category }, name);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
