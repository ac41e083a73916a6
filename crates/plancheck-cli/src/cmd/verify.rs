use crate::output::print_json;
use crate::root::resolve_root;
use anyhow::Context;
use clap::Args;
use plancheck_core::config::Overrides;
use plancheck_core::index::CancelFlag;
use plancheck_core::paths;
use plancheck_core::report::apply_changes;
use plancheck_core::types::Verdict;
use plancheck_core::verify::verify_with_outputs;
use std::path::PathBuf;

#[derive(Args)]
pub struct VerifyArgs {
    /// Plan document to verify
    pub plan: PathBuf,

    /// Codebase root (default: auto-detect from .plancheck.yaml or .git/)
    #[arg(long, env = "PLANCHECK_ROOT")]
    pub codebase: Option<PathBuf>,

    /// Config file (default: <codebase>/.plancheck.yaml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Additional directories to skip while indexing
    #[arg(long = "exclude", value_name = "DIR")]
    pub exclude: Vec<String>,

    /// Unrelated files a task may touch before it is flagged
    #[arg(long)]
    pub max_files_per_task: Option<usize>,

    /// Maximum precedents retrieved per claim
    #[arg(long)]
    pub evidence_cap: Option<usize>,

    /// Soft indexing timeout in milliseconds (0 = none)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Where to write the JSON report (default: <plan-stem>.review.json next to the plan)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Write the revised plan when the verdict is APPROVED_WITH_CHANGES
    #[arg(long)]
    pub apply: bool,
}

pub fn run(args: VerifyArgs, json: bool) -> anyhow::Result<i32> {
    let root = resolve_root(args.codebase.as_deref());
    let config = super::config::load(&root, args.config.as_deref())?.with_overrides(&Overrides {
        exclude_dirs: args.exclude,
        max_files_per_task: args.max_files_per_task,
        evidence_cap: args.evidence_cap,
        timeout_ms: args.timeout_ms,
    });

    let report_path = args
        .report
        .unwrap_or_else(|| paths::report_path(&args.plan));
    let outputs = [report_path.clone(), paths::revised_path(&args.plan)];

    let cancel = CancelFlag::new();
    let report = super::runtime()?
        .block_on(async {
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });
            verify_with_outputs(&args.plan, &root, &config, &outputs, &cancel).await
        })
        .with_context(|| format!("failed to verify '{}'", args.plan.display()))?;

    report
        .save(&report_path)
        .with_context(|| format!("failed to write report '{}'", report_path.display()))?;

    let revised = if !args.apply {
        None
    } else if report.verdict == Verdict::ApprovedWithChanges {
        Some(apply_changes(&report, &args.plan, None).context("failed to apply changes")?)
    } else {
        tracing::warn!(verdict = %report.verdict, "nothing to apply");
        None
    };

    if json {
        print_json(&report)?;
    } else {
        print!("{}", report.render_markdown());
        println!("\nReport: {}", report_path.display());
        if let Some(path) = &revised {
            println!("Revised plan: {}", path.display());
        }
    }

    Ok(report.exit_code())
}
