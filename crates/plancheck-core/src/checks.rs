//! Structural checks that look at the plan's shape rather than its claims.
//!
//! Each check is a plain function in a rule table. Checks only report
//! problems, so every finding they emit is WARN or FAIL.

use crate::config::Config;
use crate::finding::{Edit, Finding};
use crate::naming::FileName;
use crate::paths;
use crate::plan::{first_word, split_clauses, Location, Plan, Step, Task, VERIFY_VERBS};
use crate::types::{Dimension, Severity};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

pub struct CheckContext<'a> {
    pub plan: &'a Plan,
    pub config: &'a Config,
}

pub struct Check {
    pub id: &'static str,
    pub dimension: Dimension,
    pub run: fn(&CheckContext) -> Vec<Finding>,
}

pub fn default_checks() -> Vec<Check> {
    vec![
        Check {
            id: "task-atomicity",
            dimension: Dimension::TaskAtomicity,
            run: task_atomicity,
        },
        Check {
            id: "step-granularity",
            dimension: Dimension::StepGranularity,
            run: step_granularity,
        },
        Check {
            id: "dependency-ordering",
            dimension: Dimension::DependencyOrdering,
            run: dependency_ordering,
        },
        Check {
            id: "completeness",
            dimension: Dimension::Completeness,
            run: completeness,
        },
        Check {
            id: "destructive-commands",
            dimension: Dimension::ExecutionRisk,
            run: destructive_commands,
        },
    ]
}

pub fn run_checks(checks: &[Check], ctx: &CheckContext) -> Vec<Finding> {
    let mut findings = Vec::new();
    for check in checks {
        let found = (check.run)(ctx);
        tracing::debug!(check = check.id, findings = found.len(), "structural check");
        findings.extend(found);
    }
    findings
}

fn label(task: &Task) -> String {
    format!(
        "Task {}",
        task.number.map(|n| n as usize).unwrap_or(task.ordinal)
    )
}

fn task_location(task: &Task) -> Location {
    Location {
        task: task.ordinal,
        step: None,
        line: task.line,
    }
}

fn step_location(task: &Task, step: &Step) -> Location {
    Location {
        task: task.ordinal,
        step: Some(step.index),
        line: step.line,
    }
}

// ---------------------------------------------------------------------------
// Task atomicity
// ---------------------------------------------------------------------------

fn task_atomicity(ctx: &CheckContext) -> Vec<Finding> {
    let max = ctx.config.max_files_per_task;
    let mut findings = Vec::new();
    for task in &ctx.plan.tasks {
        let files = task.touched_files();
        if files.len() <= max {
            continue;
        }
        let groups = concerns(&files);
        if groups.len() <= max {
            continue;
        }
        let severity = if groups.len() > max * 2 {
            Severity::Fail
        } else {
            Severity::Warn
        };
        let split: Vec<String> = groups
            .iter()
            .map(|g| {
                let names: Vec<String> = g.iter().map(|f| format!("`{f}`")).collect();
                format!("({})", names.join(", "))
            })
            .collect();
        findings.push(
            Finding::new(
                Dimension::TaskAtomicity,
                severity,
                task_location(task),
                format!(
                    "{} touches {} files across {} unrelated concerns (limit {max})",
                    label(task),
                    files.len(),
                    groups.len()
                ),
            )
            .recommend(format!("split into sub-tasks: {}", split.join("; "))),
        );
    }
    findings
}

/// Two files share a concern when they live in the same directory below the
/// root or their names start with the same word.
fn related(a: &str, b: &str) -> bool {
    let dir = paths::parent_dir(a);
    if !dir.is_empty() && dir == paths::parent_dir(b) {
        return true;
    }
    let first = |p: &str| FileName::parse(paths::file_name(p)).words().into_iter().next();
    matches!((first(a), first(b)), (Some(x), Some(y)) if x == y)
}

/// Connected components of the `related` graph, in input order.
fn concerns(files: &[String]) -> Vec<Vec<String>> {
    fn find(parent: &mut [usize], i: usize) -> usize {
        let mut root = i;
        while parent[root] != root {
            root = parent[root];
        }
        parent[i] = root;
        root
    }
    let mut parent: Vec<usize> = (0..files.len()).collect();
    for i in 0..files.len() {
        for j in i + 1..files.len() {
            if related(&files[i], &files[j]) {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                parent[b] = a;
            }
        }
    }
    let mut groups: Vec<(usize, Vec<String>)> = Vec::new();
    for (i, file) in files.iter().enumerate() {
        let root = find(&mut parent, i);
        match groups.iter_mut().find(|(r, _)| *r == root) {
            Some((_, members)) => members.push(file.clone()),
            None => groups.push((root, vec![file.clone()])),
        }
    }
    groups.into_iter().map(|(_, g)| g).collect()
}

// ---------------------------------------------------------------------------
// Step granularity
// ---------------------------------------------------------------------------

const IMPERATIVE: &[&str] = &[
    "add", "apply", "build", "bump", "call", "change", "check", "clean", "commit", "configure",
    "confirm", "connect", "convert", "copy", "create", "define", "delete", "deploy", "disable",
    "document", "drop", "edit", "emit", "enable", "ensure", "execute", "export", "expose",
    "extract", "fix", "generate", "handle", "implement", "import", "inject", "insert", "install",
    "integrate", "introduce", "invoke", "load", "log", "merge", "migrate", "modify", "mount",
    "move", "parse", "push", "refactor", "register", "remove", "rename", "replace", "restart",
    "return", "run", "save", "scaffold", "seed", "set", "split", "start", "stop", "store",
    "test", "update", "upgrade", "use", "validate", "verify", "wire", "write",
];

fn is_action(clause: &str) -> bool {
    IMPERATIVE.contains(&first_word(clause).as_str())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn step_granularity(ctx: &CheckContext) -> Vec<Finding> {
    let max = ctx.config.max_verbs_per_step;
    let mut findings = Vec::new();
    for task in &ctx.plan.tasks {
        for step in &task.steps {
            let clauses = split_clauses(&step.description);
            let verbs: Vec<String> = clauses
                .iter()
                .filter(|(_, c)| is_action(c))
                .map(|(_, c)| first_word(c))
                .collect();
            if verbs.len() <= max || verbs.iter().all(|v| VERIFY_VERBS.contains(&v.as_str())) {
                continue;
            }

            let mut items: Vec<String> = Vec::new();
            for (sep, clause) in &clauses {
                match items.last_mut().filter(|_| !is_action(clause)) {
                    Some(item) => {
                        item.push_str(sep);
                        item.push_str(clause);
                    }
                    None => items.push(clause.trim().to_string()),
                }
            }
            let items: Vec<String> = items
                .iter()
                .map(|i| capitalize(i.trim_end_matches([',', ';']).trim()))
                .collect();
            let joiner = format!("\n{}{} ", step.indent, step.marker);

            findings.push(
                Finding::new(
                    Dimension::StepGranularity,
                    Severity::Warn,
                    step_location(task, step),
                    format!(
                        "step combines {} actions ({})",
                        verbs.len(),
                        verbs.join(", ")
                    ),
                )
                .recommend("split into one step per action")
                .with_edit(Edit {
                    line: step.line,
                    original: step.description.clone(),
                    replacement: items.join(&joiner),
                }),
            );
        }
    }
    findings
}

// ---------------------------------------------------------------------------
// Dependency ordering
// ---------------------------------------------------------------------------

fn dependency_ordering(ctx: &CheckContext) -> Vec<Finding> {
    let plan = ctx.plan;
    let mut findings = Vec::new();
    let mut edges: BTreeMap<usize, Vec<usize>> = BTreeMap::new();

    let mut seen: BTreeMap<u32, usize> = BTreeMap::new();
    for task in &plan.tasks {
        if let Some(n) = task.number {
            if let Some(first) = seen.insert(n, task.ordinal) {
                findings.push(
                    Finding::new(
                        Dimension::DependencyOrdering,
                        Severity::Warn,
                        task_location(task),
                        format!("Task number {n} is used by more than one task (first at position {first})"),
                    )
                    .recommend("renumber the tasks so each number is unique"),
                );
            }
        }
    }

    for task in &plan.tasks {
        for &dep in &task.dependencies {
            let Some(target) = plan.resolve(dep) else {
                findings.push(
                    Finding::new(
                        Dimension::DependencyOrdering,
                        Severity::Fail,
                        task_location(task),
                        format!("{} depends on Task {dep}, which does not exist", label(task)),
                    )
                    .recommend("remove the dependency or point it at an existing task"),
                );
                continue;
            };
            edges.entry(task.ordinal).or_default().push(target);
            if target == task.ordinal {
                findings.push(
                    Finding::new(
                        Dimension::DependencyOrdering,
                        Severity::Fail,
                        task_location(task),
                        format!("{} depends on itself", label(task)),
                    )
                    .recommend("remove the self-dependency"),
                );
            } else if target > task.ordinal {
                findings.push(
                    Finding::new(
                        Dimension::DependencyOrdering,
                        Severity::Fail,
                        task_location(task),
                        format!(
                            "{} depends on Task {dep}, which comes later in the plan",
                            label(task)
                        ),
                    )
                    .recommend(format!(
                        "move Task {dep} before {} or drop the dependency",
                        label(task)
                    )),
                );
            }
        }
    }

    for cycle in find_cycles(&edges) {
        let names: Vec<String> = cycle
            .iter()
            .chain(cycle.first())
            .filter_map(|o| plan.task(*o))
            .map(label)
            .collect();
        if let Some(task) = cycle.first().and_then(|o| plan.task(*o)) {
            findings.push(
                Finding::new(
                    Dimension::DependencyOrdering,
                    Severity::Fail,
                    task_location(task),
                    format!("dependency cycle: {}", names.join(" -> ")),
                )
                .recommend("break the cycle so every task depends only on earlier tasks"),
            );
        }
    }
    findings
}

/// Distinct cycles of two or more tasks, each rotated to start at its
/// smallest ordinal.
fn find_cycles(edges: &BTreeMap<usize, Vec<usize>>) -> Vec<Vec<usize>> {
    fn visit(
        node: usize,
        edges: &BTreeMap<usize, Vec<usize>>,
        done: &mut BTreeSet<usize>,
        stack: &mut Vec<usize>,
        cycles: &mut Vec<Vec<usize>>,
    ) {
        stack.push(node);
        for &next in edges.get(&node).into_iter().flatten() {
            if let Some(pos) = stack.iter().position(|n| *n == next) {
                let mut cycle = stack[pos..].to_vec();
                if cycle.len() > 1 {
                    if let Some(min_at) = cycle.iter().enumerate().min_by_key(|(_, o)| **o).map(|(i, _)| i) {
                        cycle.rotate_left(min_at);
                    }
                    if !cycles.contains(&cycle) {
                        cycles.push(cycle);
                    }
                }
            } else if !done.contains(&next) {
                visit(next, edges, done, stack, cycles);
            }
        }
        stack.pop();
        done.insert(node);
    }

    let mut done = BTreeSet::new();
    let mut cycles = Vec::new();
    for &node in edges.keys() {
        if !done.contains(&node) {
            visit(node, edges, &mut done, &mut Vec::new(), &mut cycles);
        }
    }
    cycles
}

// ---------------------------------------------------------------------------
// Completeness
// ---------------------------------------------------------------------------

fn final_check_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:verif\w*|validat\w*|tests?|testing|qa|smoke|final\s+check)\b").unwrap()
    })
}

fn completeness(ctx: &CheckContext) -> Vec<Finding> {
    let mut findings = Vec::new();
    for task in &ctx.plan.tasks {
        if task.steps.is_empty() {
            findings.push(
                Finding::new(
                    Dimension::Completeness,
                    Severity::Warn,
                    task_location(task),
                    format!("{} has no steps", label(task)),
                )
                .recommend("list the concrete steps this task performs"),
            );
        } else if !task.has_verification() {
            findings.push(
                Finding::new(
                    Dimension::Completeness,
                    Severity::Warn,
                    task_location(task),
                    format!("{} has no verification step", label(task)),
                )
                .recommend("add a step that runs a command proving the task works"),
            );
        }
    }
    if let Some(last) = ctx.plan.tasks.last() {
        if !(final_check_re().is_match(&last.title) && last.has_verification()) {
            findings.push(
                Finding::new(
                    Dimension::Completeness,
                    Severity::Warn,
                    task_location(last),
                    "plan has no final verification task",
                )
                .recommend("add a final task that runs the full test suite and checks the result"),
            );
        }
    }
    findings
}

// ---------------------------------------------------------------------------
// Execution risk
// ---------------------------------------------------------------------------

fn destructive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\brm\s+-[a-z]*(?:rf|fr)[a-z]*\b|\bgit\s+push\s+(?:\S+\s+)*(?:-f|--force)\b|\breset\s+--hard\b|\bdrop\s+(?:table|database|schema)\b|\btruncate\s+table\b|--force\b",
        )
        .unwrap()
    })
}

fn destructive_commands(ctx: &CheckContext) -> Vec<Finding> {
    let mut findings = Vec::new();
    for task in &ctx.plan.tasks {
        for step in &task.steps {
            let texts = std::iter::once(&step.description)
                .chain(&step.details)
                .chain(&step.commands);
            let mut hits: Vec<String> = texts
                .filter_map(|t| destructive_re().find(t).map(|m| m.as_str().to_string()))
                .collect();
            hits.sort();
            hits.dedup();
            for hit in hits {
                findings.push(
                    Finding::new(
                        Dimension::ExecutionRisk,
                        Severity::Warn,
                        step_location(task, step),
                        format!("step runs a destructive command: `{hit}`"),
                    )
                    .recommend("confirm the command is intended and add a backup or dry-run step first"),
                );
            }
        }
        for command in &task.commands {
            if let Some(m) = destructive_re().find(command) {
                findings.push(
                    Finding::new(
                        Dimension::ExecutionRisk,
                        Severity::Warn,
                        task_location(task),
                        format!("{} runs a destructive command: `{}`", label(task), m.as_str()),
                    )
                    .recommend("confirm the command is intended and add a backup or dry-run step first"),
                );
            }
        }
    }
    findings
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan;

    fn check(raw: &str, run: fn(&CheckContext) -> Vec<Finding>) -> Vec<Finding> {
        let plan = plan::parse("plan.md", raw).unwrap();
        let config = Config::default();
        run(&CheckContext {
            plan: &plan,
            config: &config,
        })
    }

    #[test]
    fn four_unrelated_files_warn_and_suggest_split() {
        let raw = "## Task 1: Everything\n\
            - Edit `src/auth/login.ts`\n\
            - Edit `db/migrations/001_users.sql`\n\
            - Edit `docs/api.md`\n\
            - Edit `config/app.yaml`\n\
            - Run `npm test`\n";
        let found = check(raw, task_atomicity);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::Warn);
        assert!(found[0].recommendation.starts_with("split into sub-tasks"));
        assert!(found[0].recommendation.contains("(`docs/api.md`)"));
    }

    #[test]
    fn related_files_are_one_concern() {
        let raw = "## Task 1: Auth\n\
            - Edit `src/auth/login.ts`\n\
            - Edit `src/auth/logout.ts`\n\
            - Edit `src/auth/session.ts`\n\
            - Add `tests/login.test.ts`\n";
        assert!(check(raw, task_atomicity).is_empty());
    }

    #[test]
    fn far_too_many_concerns_fail() {
        let files: String = ["a/one.rs", "b/two.rs", "c/three.rs", "d/four.rs", "e/five.rs", "f/six.rs", "g/seven.rs"]
            .iter()
            .map(|f| format!("- Edit `{f}`\n"))
            .collect();
        let found = check(&format!("## Task 1: Sprawl\n{files}"), task_atomicity);
        assert_eq!(found[0].severity, Severity::Fail);
    }

    #[test]
    fn multi_action_step_gets_split_edit() {
        let raw = "## Task 1: Service\n  - Create `src/user.ts` and update `src/app.ts`, then register the route\n";
        let found = check(raw, step_granularity);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].issue, "step combines 3 actions (create, update, register)");
        let edit = found[0].edit.as_ref().unwrap();
        assert_eq!(edit.line, 2);
        assert_eq!(
            edit.replacement,
            "Create `src/user.ts`\n  - Update `src/app.ts`\n  - Register the route"
        );
    }

    #[test]
    fn conjunctions_inside_code_and_objects_are_one_action() {
        let raw = "## Task 1: Docs\n- Update `README and CHANGELOG` and the guide\n- Run tests and verify the output\n";
        assert!(check(raw, step_granularity).is_empty());
    }

    #[test]
    fn forward_dependency_fails() {
        let raw = "## Task 1: A\n- Do a\n## Task 2: B\nDepends on Task 5\n- Do b\n## Task 3: C\n- Do c\n## Task 4: D\n- Do d\n## Task 5: E\n- Do e\n";
        let found = check(raw, dependency_ordering);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::Fail);
        assert_eq!(found[0].location.task, 2);
        assert!(found[0].issue.contains("comes later"));
    }

    #[test]
    fn cycles_and_unknown_tasks_fail() {
        let raw = "## Task 1: A\nDepends on Task 2\n- a\n## Task 2: B\nDepends on Task 1 and Task 9\n- b\n";
        let found = check(raw, dependency_ordering);
        assert!(found.iter().any(|f| f.issue == "dependency cycle: Task 1 -> Task 2 -> Task 1"));
        assert!(found.iter().any(|f| f.issue.contains("Task 9, which does not exist")));
        assert!(found.iter().all(|f| f.severity == Severity::Fail));
    }

    #[test]
    fn missing_verification_and_final_task_warn() {
        let raw = "## Task 1: Build\n- Create `src/lib.rs`\n## Task 2: Ship\n- Run `cargo test`\n";
        let found = check(raw, completeness);
        let issues: Vec<&str> = found.iter().map(|f| f.issue.as_str()).collect();
        assert_eq!(
            issues,
            vec!["Task 1 has no verification step", "plan has no final verification task"]
        );
    }

    #[test]
    fn complete_plan_has_no_completeness_findings() {
        let raw = "## Task 1: Build\n- Create `src/lib.rs`\n- Run `cargo test`\n## Task 2: Final verification\n- Run `cargo test --all`\n";
        assert!(check(raw, completeness).is_empty());
    }

    #[test]
    fn test_titled_last_task_needs_a_verification_step() {
        let raw = "## Task 1: Build\n- Create `src/lib.rs`\n- Run `cargo test`\n## Task 2: Write unit tests\n- Add `tests/lib_test.rs`\n";
        let issues: Vec<String> = check(raw, completeness).into_iter().map(|f| f.issue).collect();
        assert_eq!(
            issues,
            vec!["Task 2 has no verification step", "plan has no final verification task"]
        );
    }

    #[test]
    fn destructive_commands_warn() {
        let raw = "## Task 1: Reset\n- Clean the build with `rm -rf target`\n- Run `git push --force origin main`\n";
        let found = check(raw, destructive_commands);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|f| f.dimension == Dimension::ExecutionRisk));
    }
}
