use crate::checks::{run_checks, Check, CheckContext};
use crate::finding::Finding;
use crate::types::{Dimension, Severity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: Dimension,
    pub rating: Severity,
    pub count: usize,
}

/// Every finding of a run, ordered and numbered, with the six dimension
/// aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct Scorecard {
    pub dimensions: Vec<DimensionScore>,
    pub findings: Vec<Finding>,
}

/// Worst severity per dimension (PASS when a dimension has no findings).
pub fn aggregate(findings: &[Finding]) -> Vec<DimensionScore> {
    Dimension::all()
        .iter()
        .map(|&dimension| {
            let mine = findings.iter().filter(|f| f.dimension == dimension);
            DimensionScore {
                dimension,
                rating: mine.clone().map(|f| f.severity).max().unwrap_or(Severity::Pass),
                count: mine.count(),
            }
        })
        .collect()
}

/// Merge claim findings with the structural checks and aggregate.
pub fn score(ctx: &CheckContext, checks: &[Check], claim_findings: Vec<Finding>) -> Scorecard {
    let mut findings = claim_findings;
    findings.extend(run_checks(checks, ctx));
    findings.sort_by(|a, b| {
        (a.location.task, a.location.line, a.location.step, a.dimension)
            .cmp(&(b.location.task, b.location.line, b.location.step, b.dimension))
            .then_with(|| a.issue.cmp(&b.issue))
    });
    for (i, finding) in findings.iter_mut().enumerate() {
        finding.id = format!("F{}", i + 1);
    }
    Scorecard {
        dimensions: aggregate(&findings),
        findings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::default_checks;
    use crate::config::Config;
    use crate::plan::{self, Location};

    fn finding(dimension: Dimension, severity: Severity, line: usize) -> Finding {
        Finding::new(
            dimension,
            severity,
            Location {
                task: 1,
                step: None,
                line,
            },
            "x",
        )
    }

    #[test]
    fn worst_severity_wins_per_dimension() {
        let scores = aggregate(&[
            finding(Dimension::PatternAlignment, Severity::Pass, 1),
            finding(Dimension::PatternAlignment, Severity::Warn, 2),
            finding(Dimension::ExecutionRisk, Severity::Fail, 3),
        ]);
        assert_eq!(scores.len(), 6);
        assert_eq!(scores[0].rating, Severity::Warn);
        assert_eq!(scores[0].count, 2);
        let risk = scores
            .iter()
            .find(|s| s.dimension == Dimension::ExecutionRisk)
            .unwrap();
        assert_eq!(risk.rating, Severity::Fail);
        assert!(scores
            .iter()
            .filter(|s| s.count == 0)
            .all(|s| s.rating == Severity::Pass));
    }

    #[test]
    fn findings_are_ordered_by_location_and_numbered() {
        let raw = "## Task 1: Build\n- Create `src/lib.rs` and update `Cargo.toml`\n## Task 2: Ship\n- Deploy\n";
        let plan = plan::parse("plan.md", raw).unwrap();
        let config = Config::default();
        let ctx = CheckContext {
            plan: &plan,
            config: &config,
        };
        let card = score(
            &ctx,
            &default_checks(),
            vec![finding(Dimension::PatternAlignment, Severity::Pass, 2)],
        );
        let ids: Vec<&str> = card.findings.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids[0], "F1");
        assert_eq!(ids.len(), card.findings.len());
        let tasks: Vec<usize> = card.findings.iter().map(|f| f.location.task).collect();
        let mut sorted = tasks.clone();
        sorted.sort();
        assert_eq!(tasks, sorted);
        assert_eq!(card.dimensions[2].rating, Severity::Warn);
    }
}
