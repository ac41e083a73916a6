use crate::checks::{default_checks, CheckContext};
use crate::config::Config;
use crate::error::{PlanCheckError, Result};
use crate::index::{CancelFlag, CodebaseIndex, IndexOptions};
use crate::matcher::Matcher;
use crate::plan::{self, Plan};
use crate::precedent::Extractor;
use crate::report::ReviewReport;
use crate::scorer;
use crate::verdict;
use std::path::{Path, PathBuf};

/// Run one verification pass: index the codebase and parse the plan
/// concurrently, then judge, score and decide.
///
/// Errors only when the run cannot start: an invalid config, an unreadable
/// plan or root, a plan without task structure, or cancellation. Every
/// judgment about the plan itself lands in the report.
pub async fn verify(
    plan_path: &Path,
    root: &Path,
    config: &Config,
    cancel: &CancelFlag,
) -> Result<ReviewReport> {
    verify_with_outputs(plan_path, root, config, &[], cancel).await
}

/// [`verify`], keeping `outputs` (the report and revised plan this run will
/// write) out of the index so a rerun sees the same codebase.
pub async fn verify_with_outputs(
    plan_path: &Path,
    root: &Path,
    config: &Config,
    outputs: &[PathBuf],
    cancel: &CancelFlag,
) -> Result<ReviewReport> {
    config.ensure_valid()?;
    let opts = IndexOptions::from_config(config).skipping(root, outputs);

    let parse = async {
        let raw = tokio::fs::read_to_string(plan_path)
            .await
            .map_err(|source| PlanCheckError::PlanUnreadable {
                path: plan_path.to_path_buf(),
                source,
            })?;
        plan::parse(&plan_path.display().to_string(), &raw)
    };
    let (index, plan) = tokio::try_join!(CodebaseIndex::build(root, &opts, cancel), parse)?;

    tracing::info!(
        plan = %plan_path.display(),
        tasks = plan.tasks.len(),
        files = index.len(),
        partial = index.is_partial(),
        "verifying plan"
    );
    Ok(review(&plan, &index, config))
}

/// Judge a parsed plan against a built index.
pub fn review(plan: &Plan, index: &CodebaseIndex, config: &Config) -> ReviewReport {
    let extractor = Extractor::from_config(index, config);
    let matcher = Matcher::from_config(index, config);
    let claim_findings = plan
        .claims()
        .map(|claim| matcher.judge(claim, &extractor.find_precedents(claim)))
        .collect();

    let ctx = CheckContext { plan, config };
    let card = scorer::score(&ctx, &default_checks(), claim_findings);
    let decision = verdict::decide(&card.dimensions);
    tracing::debug!(
        verdict = %decision.verdict,
        findings = card.findings.len(),
        "review complete"
    );
    ReviewReport::assemble(plan, index, config, card, decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Dimension, Severity, Verdict};
    use std::fs;
    use tempfile::TempDir;

    fn codebase() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("services")).unwrap();
        for name in ["user", "payment", "notification"] {
            fs::write(
                dir.path().join(format!("services/{name}.service.ts")),
                "export class Service {}\n",
            )
            .unwrap();
        }
        dir
    }

    fn write_plan(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("plan.md");
        fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn misnamed_new_file_needs_revision() {
        let root = codebase();
        let plans = TempDir::new().unwrap();
        let plan = write_plan(
            &plans,
            "## Task 1: Auth service\n- Create `services/UserAuth.service.ts`\n- Run `npm test`\n## Task 2: Final verification\n- Run `npm test`\n",
        );
        let report = verify(&plan, root.path(), &Config::default(), &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::NeedsRevision);
        let f = report
            .findings
            .iter()
            .find(|f| f.dimension == Dimension::PatternAlignment)
            .unwrap();
        assert_eq!(f.severity, Severity::Fail);
        assert_eq!(f.recommendation, "use kebab-case, e.g. `user-auth.service.ts`");
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn conforming_plan_is_approved_and_rerun_is_identical() {
        let root = codebase();
        let plans = TempDir::new().unwrap();
        let plan = write_plan(
            &plans,
            "# Billing\n\n## Task 1: Billing service\n- Create `services/billing.service.ts`\n- Run `npm test`\n\n## Task 2: Final verification\n- Run `npm test`\n",
        );
        let config = Config::default();
        let first = verify(&plan, root.path(), &config, &CancelFlag::new()).await.unwrap();
        assert_eq!(first.verdict, Verdict::Approved, "{}", first.render_markdown());
        let second = verify(&plan, root.path(), &config, &CancelFlag::new()).await.unwrap();
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }

    #[tokio::test]
    async fn outputs_inside_codebase_do_not_change_rerun() {
        let root = codebase();
        fs::create_dir_all(root.path().join("docs/plans")).unwrap();
        fs::create_dir_all(root.path().join("reports")).unwrap();
        let plan = root.path().join("docs/plans/billing.md");
        fs::write(
            &plan,
            "# Billing\n\n## Task 1: Billing service\n- Create `services/billing.service.ts`\n- Run `npm test`\n\n## Task 2: Final verification\n- Run `npm test`\n",
        )
        .unwrap();
        let custom = root.path().join("reports/billing.json");
        let outputs = vec![custom.clone()];
        let config = Config::default();

        let first = verify_with_outputs(&plan, root.path(), &config, &outputs, &CancelFlag::new())
            .await
            .unwrap();
        first.save(&crate::paths::report_path(&plan)).unwrap();
        first.save(&custom).unwrap();
        fs::write(crate::paths::revised_path(&plan), "# Billing\n").unwrap();

        let second = verify_with_outputs(&plan, root.path(), &config, &outputs, &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(first.codebase.files, 4);
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }

    #[tokio::test]
    async fn timed_out_index_is_recorded_and_downgrades_passes() {
        let root = codebase();
        let mut deep = root.path().to_path_buf();
        for level in 0..600 {
            deep.push("d");
            fs::create_dir_all(&deep).unwrap();
            fs::write(deep.join(format!("f{level}.ts")), "export const x = 1;\n").unwrap();
        }
        let plans = TempDir::new().unwrap();
        let plan = write_plan(
            &plans,
            "## Task 1: Billing service\n- Create `services/billing.service.ts`\n- Run `npm test`\n## Task 2: Final verification\n- Run `npm test`\n",
        );
        let config = Config {
            timeout_ms: 1,
            ..Config::default()
        };

        let report = verify(&plan, root.path(), &config, &CancelFlag::new())
            .await
            .unwrap();
        assert!(report.codebase.partial);
        assert!(report.codebase.files < 603);
        assert!(report.findings.iter().all(|f| f.severity != Severity::Pass));
        assert!(report.to_json().unwrap().contains("\"partial\": true"));
    }

    #[tokio::test]
    async fn missing_root_is_index_error() {
        let plans = TempDir::new().unwrap();
        let plan = write_plan(&plans, "## Task 1: A\n- Run `npm test`\n");
        let err = verify(
            &plan,
            &plans.path().join("nope"),
            &Config::default(),
            &CancelFlag::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PlanCheckError::Index { .. }));
    }

    #[tokio::test]
    async fn unreadable_plan_and_empty_plan_are_errors() {
        let root = codebase();
        let missing = root.path().join("missing.md");
        let err = verify(&missing, root.path(), &Config::default(), &CancelFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PlanCheckError::PlanUnreadable { .. }));

        let plans = TempDir::new().unwrap();
        let empty = write_plan(&plans, "");
        let err = verify(&empty, root.path(), &Config::default(), &CancelFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PlanCheckError::Parse(_)));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_indexing() {
        let root = codebase();
        let plans = TempDir::new().unwrap();
        let plan = write_plan(&plans, "## Task 1: A\n- Run `npm test`\n");
        let config = Config {
            min_precedents: 0,
            ..Config::default()
        };
        let err = verify(&plan, root.path(), &config, &CancelFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PlanCheckError::InvalidConfig(_)));
    }
}
