use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Outcome of one judged claim or structural check.
///
/// Ordered so that the worst severity of a set is its maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Pass,
    Warn,
    Fail,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Pass => "PASS",
            Severity::Warn => "WARN",
            Severity::Fail => "FAIL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Dimension
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    PatternAlignment,
    TaskAtomicity,
    StepGranularity,
    DependencyOrdering,
    ExecutionRisk,
    Completeness,
}

impl Dimension {
    pub fn all() -> &'static [Dimension] {
        &[
            Dimension::PatternAlignment,
            Dimension::TaskAtomicity,
            Dimension::StepGranularity,
            Dimension::DependencyOrdering,
            Dimension::ExecutionRisk,
            Dimension::Completeness,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::PatternAlignment => "pattern_alignment",
            Dimension::TaskAtomicity => "task_atomicity",
            Dimension::StepGranularity => "step_granularity",
            Dimension::DependencyOrdering => "dependency_ordering",
            Dimension::ExecutionRisk => "execution_risk",
            Dimension::Completeness => "completeness",
        }
    }

    /// Display name used in the rendered dimension table.
    pub fn title(self) -> &'static str {
        match self {
            Dimension::PatternAlignment => "Pattern Alignment",
            Dimension::TaskAtomicity => "Task Atomicity & Boundaries",
            Dimension::StepGranularity => "Step Granularity",
            Dimension::DependencyOrdering => "Dependency & Ordering",
            Dimension::ExecutionRisk => "Execution Risk",
            Dimension::Completeness => "Completeness",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Approved,
    ApprovedWithChanges,
    NeedsRevision,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Approved => "APPROVED",
            Verdict::ApprovedWithChanges => "APPROVED_WITH_CHANGES",
            Verdict::NeedsRevision => "NEEDS_REVISION",
        }
    }

    /// Process exit status for a completed run with this verdict.
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Approved | Verdict::ApprovedWithChanges => 0,
            Verdict::NeedsRevision => 1,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FileKind
// ---------------------------------------------------------------------------

/// Role of a file inferred from its directory and name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Source,
    Test,
    Config,
    Doc,
    Other,
}

impl FileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Source => "source",
            FileKind::Test => "test",
            FileKind::Config => "config",
            FileKind::Doc => "doc",
            FileKind::Other => "other",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SymbolCategory
// ---------------------------------------------------------------------------

/// Coarse category of a declared name, used to compare like with like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolCategory {
    Function,
    Type,
    Value,
    /// A key in a config file.
    Key,
}

impl SymbolCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolCategory::Function => "function",
            SymbolCategory::Type => "type",
            SymbolCategory::Value => "value",
            SymbolCategory::Key => "key",
        }
    }
}

impl fmt::Display for SymbolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_worst_last() {
        assert!(Severity::Pass < Severity::Warn);
        assert!(Severity::Warn < Severity::Fail);
        let worst = [Severity::Warn, Severity::Pass, Severity::Fail]
            .into_iter()
            .max()
            .unwrap();
        assert_eq!(worst, Severity::Fail);
    }

    #[test]
    fn severity_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Severity::Warn).unwrap(), "\"WARN\"");
    }

    #[test]
    fn verdict_serializes_upper_snake() {
        let json = serde_json::to_string(&Verdict::ApprovedWithChanges).unwrap();
        assert_eq!(json, "\"APPROVED_WITH_CHANGES\"");
        assert_eq!(Verdict::ApprovedWithChanges.to_string(), "APPROVED_WITH_CHANGES");
    }

    #[test]
    fn verdict_exit_codes() {
        assert_eq!(Verdict::Approved.exit_code(), 0);
        assert_eq!(Verdict::ApprovedWithChanges.exit_code(), 0);
        assert_eq!(Verdict::NeedsRevision.exit_code(), 1);
    }

    #[test]
    fn six_dimensions_in_fixed_order() {
        let all = Dimension::all();
        assert_eq!(all.len(), 6);
        assert_eq!(all[0].title(), "Pattern Alignment");
        assert_eq!(all[5].title(), "Completeness");
    }
}
