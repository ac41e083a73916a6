//! Review report: assembly, rendering, persistence and applying edits.

use crate::config::Config;
use crate::error::{PlanCheckError, Result};
use crate::finding::{Edit, Finding, Stance};
use crate::index::{CodebaseIndex, IndexWarning};
use crate::io::{atomic_write, lines_with_endings};
use crate::paths;
use crate::plan::{self, Plan};
use crate::scorer::{DimensionScore, Scorecard};
use crate::types::{Severity, Verdict};
use crate::verdict::Decision;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ReviewReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanIdentity {
    pub path: String,
    pub digest: String,
    pub title: String,
    pub tasks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodebaseSummary {
    pub root: String,
    pub files: usize,
    /// Evidence may be incomplete: a subtree was skipped or indexing timed out.
    pub partial: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<IndexWarning>,
}

/// Outcome of one verification pass. Contains no timestamps, so the same
/// plan against the same codebase always serializes identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReport {
    pub plan: PlanIdentity,
    pub codebase: CodebaseSummary,
    pub config: Config,
    pub dimensions: Vec<DimensionScore>,
    pub findings: Vec<Finding>,
    pub verdict: Verdict,
    pub surgical: bool,
}

impl ReviewReport {
    pub fn assemble(
        plan: &Plan,
        index: &CodebaseIndex,
        config: &Config,
        card: Scorecard,
        decision: Decision,
    ) -> Self {
        Self {
            plan: PlanIdentity {
                path: plan.path.clone(),
                digest: plan.digest.clone(),
                title: plan.title.clone(),
                tasks: plan.tasks.len(),
            },
            codebase: CodebaseSummary {
                root: index.root().display().to_string(),
                files: index.len(),
                partial: index.is_partial(),
                warnings: index.warnings().to_vec(),
            },
            config: config.clone(),
            dimensions: card.dimensions,
            findings: card.findings,
            verdict: decision.verdict,
            surgical: decision.surgical,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.verdict.exit_code()
    }

    /// Findings whose edits `apply` will use, in plan order.
    pub fn applicable_edits(&self) -> Vec<(&Finding, &Edit)> {
        let mut edits: Vec<(&Finding, &Edit)> = self
            .findings
            .iter()
            .filter(|f| f.is_applicable())
            .filter_map(|f| f.edit.as_ref().map(|e| (f, e)))
            .collect();
        edits.sort_by_key(|(_, e)| e.line);
        edits
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        atomic_write(path, self.to_json()?.as_bytes())?;
        tracing::debug!(path = %path.display(), "saved review report");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    // -----------------------------------------------------------------------
    // Markdown
    // -----------------------------------------------------------------------

    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Plan Review: {}\n", self.plan.title);
        let _ = writeln!(out, "Plan: `{}` ({} tasks)", self.plan.path, self.plan.tasks);
        let _ = write!(
            out,
            "Codebase: `{}` ({} files indexed",
            self.codebase.root, self.codebase.files
        );
        if self.codebase.partial {
            out.push_str(", partial index");
        }
        out.push_str(")\n\n");

        out.push_str("| Dimension | Rating | Findings |\n");
        out.push_str("|---|---|---|\n");
        for score in &self.dimensions {
            let _ = writeln!(
                out,
                "| {} | {} | {} |",
                score.dimension.title(),
                score.rating,
                score.count
            );
        }

        out.push_str("\n## Findings\n\n");
        if self.findings.is_empty() {
            out.push_str("_No findings._\n");
        }
        for f in &self.findings {
            let _ = writeln!(
                out,
                "{}. **[{}] {}** {}: {}",
                f.id.trim_start_matches('F'),
                f.severity,
                f.dimension.title(),
                f.location,
                f.issue
            );
            for e in &f.evidence {
                let place = match e.line {
                    Some(line) => format!("{}:{}", e.path, line),
                    None => e.path.clone(),
                };
                let stance = match e.stance {
                    Stance::Agrees => " (agrees)",
                    Stance::Contradicts => " (contradicts)",
                    Stance::Neutral => "",
                };
                let _ = writeln!(out, "   - Evidence: `{place}`: {}{stance}", e.fact);
            }
            if !f.recommendation.is_empty() {
                let _ = writeln!(out, "   - Recommendation: {}", f.recommendation);
            }
        }

        let recs: Vec<&Finding> = self
            .findings
            .iter()
            .filter(|f| f.severity != Severity::Pass && !f.recommendation.is_empty())
            .collect();
        if !recs.is_empty() {
            out.push_str("\n## Recommendations\n\n");
            for f in recs {
                let tag = if f.is_applicable() { " (edit available)" } else { "" };
                let _ = writeln!(out, "- {}: {}{tag}", f.id, f.recommendation);
            }
        }

        let _ = writeln!(out, "\n**Verdict: {}**", self.verdict);
        out
    }
}

// ---------------------------------------------------------------------------
// Applying edits
// ---------------------------------------------------------------------------

/// Apply edits to plan text. Each edit replaces the first occurrence of its
/// original text on its line; edits sharing a line apply in order.
pub fn apply_edits(raw: &str, edits: &[&Edit]) -> Result<String> {
    let mut lines: Vec<String> = lines_with_endings(raw)
        .into_iter()
        .map(String::from)
        .collect();
    for edit in edits {
        let stale = || PlanCheckError::StaleEdit {
            line: edit.line,
            expected: edit.original.clone(),
        };
        let line = edit
            .line
            .checked_sub(1)
            .and_then(|i| lines.get_mut(i))
            .ok_or_else(stale)?;
        if !line.contains(&edit.original) {
            return Err(stale());
        }
        *line = line.replacen(&edit.original, &edit.replacement, 1);
    }
    Ok(lines.concat())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Write the plan with every applicable edit applied to a new document and
/// return its path. The original plan is never touched.
pub fn apply_changes(report: &ReviewReport, plan_path: &Path, out: Option<&Path>) -> Result<PathBuf> {
    if report.verdict != Verdict::ApprovedWithChanges {
        return Err(PlanCheckError::ApplyNotAllowed(
            report.verdict.as_str().to_string(),
        ));
    }
    let raw = std::fs::read_to_string(plan_path).map_err(|source| PlanCheckError::PlanUnreadable {
        path: plan_path.to_path_buf(),
        source,
    })?;
    if plan::digest(&raw) != report.plan.digest {
        return Err(PlanCheckError::PlanDigestMismatch);
    }
    let target = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths::revised_path(plan_path));
    if same_file(&target, plan_path) {
        return Err(PlanCheckError::WouldOverwritePlan(target));
    }

    let edits: Vec<&Edit> = report.applicable_edits().into_iter().map(|(_, e)| e).collect();
    let revised = apply_edits(&raw, &edits)?;
    atomic_write(&target, revised.as_bytes())?;
    tracing::info!(
        plan = %plan_path.display(),
        revised = %target.display(),
        edits = edits.len(),
        "applied review edits"
    );
    Ok(target)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
