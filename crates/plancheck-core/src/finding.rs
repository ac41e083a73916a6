use crate::naming::CaseStyle;
use crate::plan::Location;
use crate::types::{Dimension, Severity};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    File,
    Directory,
    Symbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Agrees,
    Contradicts,
    Neutral,
}

/// A concrete precedent in the codebase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub source: EvidenceSource,
    /// The name the precedent is about: a file stem, directory or symbol.
    pub name: String,
    pub style: CaseStyle,
    pub stance: Stance,
    /// One-line description, e.g. ``user.service.ts` is lowercase``.
    pub fact: String,
}

impl Evidence {
    pub fn with_stance(&self, stance: Stance) -> Self {
        Self {
            stance,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Edit
// ---------------------------------------------------------------------------

/// A mechanical substitution on one line of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    /// 1-based line in the plan the edit was derived from.
    pub line: usize,
    pub original: String,
    pub replacement: String,
}

// ---------------------------------------------------------------------------
// Finding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Stable id (`F1`, `F2`, ...) assigned once findings are ordered.
    #[serde(default)]
    pub id: String,
    pub dimension: Dimension,
    pub severity: Severity,
    pub location: Location,
    /// Claim kind the finding judged, absent for structural checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<String>,
    pub issue: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub agree: usize,
    #[serde(default)]
    pub contradict: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit: Option<Edit>,
}

impl Finding {
    pub fn new(
        dimension: Dimension,
        severity: Severity,
        location: Location,
        issue: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            dimension,
            severity,
            location,
            claim: None,
            issue: issue.into(),
            evidence: Vec::new(),
            agree: 0,
            contradict: 0,
            recommendation: String::new(),
            edit: None,
        }
    }

    pub fn recommend(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = recommendation.into();
        self
    }

    pub fn with_edit(mut self, edit: Edit) -> Self {
        self.edit = Some(edit);
        self
    }

    /// Whether `apply` may use this finding's edit.
    pub fn is_applicable(&self) -> bool {
        self.severity == Severity::Warn && self.edit.is_some()
    }
}
