use crate::output::print_json;
use anyhow::Context;
use plancheck_core::report::{apply_changes, ReviewReport};
use std::path::{Path, PathBuf};

pub fn run(
    report_path: &Path,
    plan: Option<&Path>,
    out: Option<&Path>,
    json: bool,
) -> anyhow::Result<i32> {
    let report = ReviewReport::load(report_path)
        .with_context(|| format!("failed to read report '{}'", report_path.display()))?;
    let plan_path = plan
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&report.plan.path));
    let edits = report.applicable_edits().len();

    let revised = apply_changes(&report, &plan_path, out)
        .with_context(|| format!("failed to apply changes to '{}'", plan_path.display()))?;

    if json {
        print_json(&serde_json::json!({
            "plan": plan_path,
            "revised": revised,
            "edits": edits,
        }))?;
    } else {
        println!(
            "Applied {edits} edit{} to a copy of {}: {}",
            if edits == 1 { "" } else { "s" },
            plan_path.display(),
            revised.display()
        );
    }
    Ok(0)
}
