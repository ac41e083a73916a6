#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn plancheck(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("plancheck").unwrap();
    cmd.current_dir(root).env("PLANCHECK_ROOT", root);
    cmd
}

/// A small TypeScript codebase whose service files are flat-named.
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
    for (dir_name, file) in [("api", "one"), ("db", "two"), ("jobs", "three"), ("web", "four")] {
        fs::create_dir_all(dir.path().join(dir_name)).unwrap();
        fs::write(
            dir.path().join(format!("{dir_name}/{file}.ts")),
            "export const value = 1;\n",
        )
        .unwrap();
    }
    dir
}

fn write_plan(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("plan.md");
    fs::write(&path, body).unwrap();
    path
}

const APPROVED: &str = "# Billing\n\n\
## Task 1: Billing service\n\
- Create `services/billing.service.ts`\n\
- Run `npm test`\n\n\
## Task 2: Final verification\n\
- Run `npm test`\n";

const SPLITTABLE: &str = "# Billing\n\n\
## Task 1: Billing service\n\
- Create `services/billing.service.ts` and update `services/user.service.ts`\n\
- Run `npm test`\n\n\
## Task 2: Final verification\n\
- Run `npm test`\n";

// ---------------------------------------------------------------------------
// plancheck verify
// ---------------------------------------------------------------------------

#[test]
fn verify_approves_conforming_plan() {
    let root = codebase();
    let plans = TempDir::new().unwrap();
    let plan = write_plan(&plans, APPROVED);

    plancheck(root.path())
        .args(["verify", plan.to_str().unwrap()])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("# Plan Review: Billing"))
        .stdout(predicate::str::contains("**Verdict: APPROVED**"));

    assert!(plans.path().join("plan.review.json").exists());
}

#[test]
fn verify_rejects_misnamed_file_with_recommendation() {
    let root = codebase();
    let plans = TempDir::new().unwrap();
    let plan = write_plan(
        &plans,
        "## Task 1: Auth service\n\
- Create `services/UserAuth.service.ts`\n\
- Run `npm test`\n\
## Task 2: Final verification\n\
- Run `npm test`\n",
    );

    plancheck(root.path())
        .args(["verify", plan.to_str().unwrap()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "use kebab-case, e.g. `user-auth.service.ts`",
        ))
        .stdout(predicate::str::contains("| Pattern Alignment | FAIL |"))
        .stdout(predicate::str::contains("**Verdict: NEEDS_REVISION**"));
}

#[test]
fn verify_fails_forward_dependency() {
    let root = codebase();
    let plans = TempDir::new().unwrap();
    let plan = write_plan(
        &plans,
        "## Task 1: Schema\n\
Depends on Task 2\n\
- Run `npm test`\n\
## Task 2: Final verification\n\
- Run `npm test`\n",
    );

    plancheck(root.path())
        .args(["verify", plan.to_str().unwrap()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("| Dependency & Ordering | FAIL |"));
}

#[test]
fn verify_warns_when_task_touches_unrelated_files() {
    let root = codebase();
    let plans = TempDir::new().unwrap();
    let plan = write_plan(
        &plans,
        "## Task 1: Wire everything\n\
- Edit `api/one.ts`\n\
- Edit `db/two.ts`\n\
- Edit `jobs/three.ts`\n\
- Edit `web/four.ts`\n\
- Run `npm test`\n\
## Task 2: Final verification\n\
- Run `npm test`\n",
    );

    plancheck(root.path())
        .args(["verify", plan.to_str().unwrap()])
        .assert()
        .code(0)
        .stdout(predicate::str::contains(
            "| Task Atomicity & Boundaries | WARN |",
        ))
        .stdout(predicate::str::contains(
            "**Verdict: APPROVED_WITH_CHANGES**",
        ));
}

#[test]
fn verify_missing_root_exits_2_without_report() {
    let plans = TempDir::new().unwrap();
    let plan = write_plan(&plans, APPROVED);
    let missing = plans.path().join("no-such-codebase");

    plancheck(plans.path())
        .args(["verify", plan.to_str().unwrap(), "--codebase"])
        .arg(&missing)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error:"));

    assert!(!plans.path().join("plan.review.json").exists());
}

#[test]
fn verify_missing_plan_exits_2() {
    let root = codebase();
    plancheck(root.path())
        .args(["verify", "does-not-exist.md"])
        .assert()
        .code(2);
}

#[test]
fn verify_json_output_and_report_are_idempotent() {
    let root = codebase();
    let plans = TempDir::new().unwrap();
    let plan = write_plan(&plans, SPLITTABLE);
    let report = plans.path().join("plan.review.json");

    let first = plancheck(root.path())
        .args(["--json", "verify", plan.to_str().unwrap()])
        .output()
        .unwrap();
    let first_report = fs::read(&report).unwrap();
    let second = plancheck(root.path())
        .args(["--json", "verify", plan.to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(first.stdout, second.stdout);
    assert_eq!(first_report, fs::read(&report).unwrap());

    let value: serde_json::Value = serde_json::from_slice(&first.stdout).unwrap();
    assert_eq!(value["verdict"], "APPROVED_WITH_CHANGES");
    assert_eq!(value["surgical"], true);
    assert_eq!(value["findings"][0]["id"], "F1");
}

#[test]
fn rerun_with_plan_inside_codebase_is_identical() {
    let root = codebase();
    fs::create_dir_all(root.path().join("docs/plans")).unwrap();
    let plan = root.path().join("docs/plans/billing.md");
    fs::write(&plan, SPLITTABLE).unwrap();
    let report = root.path().join("docs/plans/billing.review.json");

    let first = plancheck(root.path())
        .args(["--json", "verify", plan.to_str().unwrap(), "--apply"])
        .output()
        .unwrap();
    assert!(root.path().join("docs/plans/billing.revised.md").exists());
    let first_report = fs::read(&report).unwrap();

    let second = plancheck(root.path())
        .args(["--json", "verify", plan.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(first.stdout, second.stdout);
    assert_eq!(first_report, fs::read(&report).unwrap());

    let value: serde_json::Value = serde_json::from_slice(&first.stdout).unwrap();
    assert_eq!(value["codebase"]["files"], 8);
}

#[test]
fn verify_custom_report_path() {
    let root = codebase();
    let plans = TempDir::new().unwrap();
    let plan = write_plan(&plans, APPROVED);
    let out = plans.path().join("reports/review.json");
    fs::create_dir_all(out.parent().unwrap()).unwrap();

    plancheck(root.path())
        .args(["verify", plan.to_str().unwrap(), "--report"])
        .arg(&out)
        .assert()
        .code(0);

    assert!(out.exists());
    assert!(!plans.path().join("plan.review.json").exists());
}

// ---------------------------------------------------------------------------
// applying changes
// ---------------------------------------------------------------------------

#[test]
fn verify_apply_writes_revised_copy() {
    let root = codebase();
    let plans = TempDir::new().unwrap();
    let plan = write_plan(&plans, SPLITTABLE);

    plancheck(root.path())
        .args(["verify", plan.to_str().unwrap(), "--apply"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Revised plan:"));

    assert_eq!(fs::read_to_string(&plan).unwrap(), SPLITTABLE);
    let revised = fs::read_to_string(plans.path().join("plan.revised.md")).unwrap();
    assert!(revised.contains(
        "- Create `services/billing.service.ts`\n- Update `services/user.service.ts`\n"
    ));
}

#[test]
fn apply_subcommand_uses_saved_report() {
    let root = codebase();
    let plans = TempDir::new().unwrap();
    let plan = write_plan(&plans, SPLITTABLE);

    plancheck(root.path())
        .args(["verify", plan.to_str().unwrap()])
        .assert()
        .code(0);
    assert!(!plans.path().join("plan.revised.md").exists());

    let out = plans.path().join("next.md");
    plancheck(root.path())
        .args(["apply"])
        .arg(plans.path().join("plan.review.json"))
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Applied 1 edit"));

    assert!(fs::read_to_string(&out)
        .unwrap()
        .contains("- Update `services/user.service.ts`"));
    assert_eq!(fs::read_to_string(&plan).unwrap(), SPLITTABLE);
}

#[test]
fn apply_refuses_edited_plan() {
    let root = codebase();
    let plans = TempDir::new().unwrap();
    let plan = write_plan(&plans, SPLITTABLE);

    plancheck(root.path())
        .args(["verify", plan.to_str().unwrap()])
        .assert()
        .code(0);
    fs::write(&plan, format!("{SPLITTABLE}- Run `npm run lint`\n")).unwrap();

    plancheck(root.path())
        .arg("apply")
        .arg(plans.path().join("plan.review.json"))
        .assert()
        .code(2);
    assert!(!plans.path().join("plan.revised.md").exists());
}

#[test]
fn apply_refuses_rejected_plan() {
    let root = codebase();
    let plans = TempDir::new().unwrap();
    let plan = write_plan(
        &plans,
        "## Task 1: Auth service\n\
- Create `services/UserAuth.service.ts`\n\
- Run `npm test`\n\
## Task 2: Final verification\n\
- Run `npm test`\n",
    );

    plancheck(root.path())
        .args(["verify", plan.to_str().unwrap()])
        .assert()
        .code(1);
    plancheck(root.path())
        .arg("apply")
        .arg(plans.path().join("plan.review.json"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("NEEDS_REVISION"));
}

// ---------------------------------------------------------------------------
// plancheck config / index
// ---------------------------------------------------------------------------

#[test]
fn config_show_json_has_defaults() {
    let root = codebase();
    let output = plancheck(root.path())
        .args(["--json", "config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["minPrecedents"], 3);
    assert_eq!(value["maxFilesPerTask"], 3);
}

#[test]
fn config_init_writes_defaults_once() {
    let root = codebase();
    plancheck(root.path())
        .args(["config", "init"])
        .assert()
        .success();
    let written = fs::read_to_string(root.path().join(".plancheck.yaml")).unwrap();
    assert!(written.contains("minPrecedents: 3"));

    plancheck(root.path())
        .args(["config", "init"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--force"));
    plancheck(root.path())
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn config_validate_rejects_bad_values() {
    let root = codebase();
    fs::write(root.path().join(".plancheck.yaml"), "minPrecedents: 0\n").unwrap();

    plancheck(root.path())
        .args(["config", "validate"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("[error]"));
}

#[test]
fn invalid_config_blocks_verification() {
    let root = codebase();
    fs::write(root.path().join(".plancheck.yaml"), "maxFilesPerTask: 0\n").unwrap();
    let plans = TempDir::new().unwrap();
    let plan = write_plan(&plans, APPROVED);

    plancheck(root.path())
        .args(["verify", plan.to_str().unwrap()])
        .assert()
        .code(2);
}

#[test]
fn index_json_summarizes_codebase() {
    let root = codebase();
    let output = plancheck(root.path())
        .args(["--json", "index"])
        .arg(root.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["files"], 7);
    assert_eq!(value["partial"], false);
    assert_eq!(value["extensions"]["ts"], 7);
}
