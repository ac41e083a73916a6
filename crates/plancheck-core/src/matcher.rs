//! Evidence matcher: judges one claim against its precedent.
//!
//! The decision rule counts precedents that agree with the claim and those
//! that contradict it:
//!
//! - PASS when at least `min_precedents` agree and none contradict;
//! - FAIL when contradictions outnumber agreements;
//! - WARN otherwise, including ties and the no-precedent case.
//!
//! A path that does not exist and is not marked as new always fails. When
//! the index is partial every PASS is downgraded to WARN.

use crate::config::Config;
use crate::finding::{Edit, Evidence, EvidenceSource, Finding, Stance};
use crate::index::CodebaseIndex;
use crate::naming::{self, CaseStyle, FileName};
use crate::paths;
use crate::plan::{Claim, ClaimKind, StructuralCheck};
use crate::precedent::implied_categories;
use crate::types::{Dimension, Severity, SymbolCategory};
use std::collections::BTreeMap;

pub struct Matcher<'a> {
    index: &'a CodebaseIndex,
    min_precedents: usize,
}

/// Agreement tally for one claim.
struct Tally {
    evidence: Vec<Evidence>,
    agree: usize,
    contradict: usize,
}

impl Tally {
    fn new(evidence: &[Evidence], stance: impl Fn(&Evidence) -> Stance) -> Self {
        let evidence: Vec<Evidence> = evidence.iter().map(|e| e.with_stance(stance(e))).collect();
        let agree = evidence.iter().filter(|e| e.stance == Stance::Agrees).count();
        let contradict = evidence
            .iter()
            .filter(|e| e.stance == Stance::Contradicts)
            .count();
        Self {
            evidence,
            agree,
            contradict,
        }
    }

    /// Most common style among contradicting precedent. Ties go to the
    /// style that sorts first so the choice is stable.
    fn majority_style(&self) -> Option<CaseStyle> {
        let mut counts: BTreeMap<CaseStyle, usize> = BTreeMap::new();
        for e in self.evidence.iter().filter(|e| e.stance == Stance::Contradicts) {
            *counts.entry(e.style).or_default() += 1;
        }
        let best = counts.values().copied().max()?;
        counts.into_iter().find(|(_, n)| *n == best).map(|(s, _)| s)
    }

    /// Most common spelling among contradicting precedent.
    fn majority_name(&self) -> Option<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for e in self.evidence.iter().filter(|e| e.stance == Stance::Contradicts) {
            *counts.entry(e.name.as_str()).or_default() += 1;
        }
        let best = counts.values().copied().max()?;
        counts
            .into_iter()
            .find(|(_, n)| *n == best)
            .map(|(s, _)| s.to_string())
    }

    fn into_finding(self, finding: Finding) -> Finding {
        Finding {
            evidence: self.evidence,
            agree: self.agree,
            contradict: self.contradict,
            ..finding
        }
    }
}

impl<'a> Matcher<'a> {
    pub fn new(index: &'a CodebaseIndex, min_precedents: usize) -> Self {
        Self {
            index,
            min_precedents,
        }
    }

    pub fn from_config(index: &'a CodebaseIndex, config: &Config) -> Self {
        Self::new(index, config.min_precedents)
    }

    pub fn judge(&self, claim: &Claim, evidence: &[Evidence]) -> Finding {
        let mut finding = match claim.kind {
            ClaimKind::Path { to_be_created } => self.judge_path(claim, to_be_created, evidence),
            ClaimKind::Naming { category } => self.judge_naming(claim, category, evidence),
            ClaimKind::Reference { .. } => self.judge_reference(claim, evidence, "definition"),
            ClaimKind::Structural {
                check: StructuralCheck::ConfigField,
            } => self.judge_reference(claim, evidence, "config key"),
            ClaimKind::Structural {
                check: StructuralCheck::ManualReview,
            } => Finding::new(
                Dimension::ExecutionRisk,
                Severity::Warn,
                claim.location,
                format!("`{}` could not be classified and needs manual review", claim.text),
            )
            .recommend("check this fragment against the codebase by hand"),
        };
        finding.claim = Some(claim.kind.label().to_string());

        if self.index.is_partial() && finding.severity == Severity::Pass {
            finding.severity = Severity::Warn;
            finding.issue.push_str(" (partial index: evidence may be incomplete)");
            finding.recommendation = "re-run with a complete index to confirm".to_string();
        }
        finding
    }

    // -----------------------------------------------------------------------
    // Paths
    // -----------------------------------------------------------------------

    fn judge_path(&self, claim: &Claim, to_be_created: bool, evidence: &[Evidence]) -> Finding {
        let target = paths::normalize(&claim.text);
        let name = paths::file_name(&target);

        let existing: Vec<Evidence> = if let Some(file) = self.index.file(&target) {
            vec![Evidence::for_file(file)]
        } else if !target.is_empty() && self.index.is_dir(&target) {
            vec![Evidence::for_dir(&target)]
        } else if !target.contains('/') {
            self.index
                .files_named(name)
                .into_iter()
                .map(Evidence::for_file)
                .collect()
        } else {
            Vec::new()
        };
        if !existing.is_empty() {
            let tally = Tally::new(&existing, |_| Stance::Agrees);
            return tally.into_finding(Finding::new(
                Dimension::PatternAlignment,
                Severity::Pass,
                claim.location,
                format!("`{}` exists", claim.text),
            ));
        }

        if to_be_created {
            return self.judge_style(claim, &claimed_path_style(&target), evidence);
        }

        let issue = format!(
            "`{}` does not exist in the codebase and is not marked as new",
            claim.text
        );
        let same_name = self.index.files_named(name);
        let finding = Finding::new(Dimension::PatternAlignment, Severity::Fail, claim.location, issue);
        match same_name.as_slice() {
            [only] => {
                let tally = Tally::new(&[Evidence::for_file(only)], |_| Stance::Neutral);
                tally.into_finding(
                    finding
                        .recommend(format!("did you mean `{}`?", only.path))
                        .with_edit(Edit {
                            line: claim.location.line,
                            original: claim.text.clone(),
                            replacement: only.path.clone(),
                        }),
                )
            }
            [] => {
                // The claim may still be misspelled against the local convention.
                let styled = self.judge_style(claim, &claimed_path_style(&target), evidence);
                if styled.severity == Severity::Fail {
                    Finding {
                        severity: Severity::Fail,
                        issue: finding.issue,
                        ..styled
                    }
                } else {
                    finding.recommend(
                        "correct the path, or mark the file as new if this task creates it",
                    )
                }
            }
            many => {
                let list: Vec<String> = many.iter().map(|f| format!("`{}`", f.path)).collect();
                let found: Vec<Evidence> = many.iter().map(|f| Evidence::for_file(f)).collect();
                Tally::new(&found, |_| Stance::Neutral).into_finding(finding.recommend(format!(
                    "files with this name exist at {}",
                    list.join(", ")
                )))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Naming
    // -----------------------------------------------------------------------

    fn judge_naming(
        &self,
        claim: &Claim,
        category: Option<SymbolCategory>,
        evidence: &[Evidence],
    ) -> Finding {
        let subject = claim.subject();
        let declared: Vec<Evidence> = self
            .index
            .symbols()
            .filter(|(_, s)| s.name == subject)
            .map(|(f, s)| Evidence::for_symbol(f, s))
            .chain(
                self.index
                    .files()
                    .filter(|f| f.stem == subject)
                    .map(Evidence::for_file),
            )
            .collect();
        if !declared.is_empty() {
            return Tally::new(&declared, |_| Stance::Agrees).into_finding(Finding::new(
                Dimension::PatternAlignment,
                Severity::Pass,
                claim.location,
                format!("`{subject}` already exists in the codebase"),
            ));
        }
        let category = category.unwrap_or_else(|| implied_categories(subject)[0]);
        self.judge_style(claim, &ClaimedStyle::Identifier(subject.to_string(), category), evidence)
    }

    /// The 3-example rule over casing style.
    fn judge_style(&self, claim: &Claim, claimed: &ClaimedStyle, evidence: &[Evidence]) -> Finding {
        let style = claimed.style();
        let tally = Tally::new(evidence, |e| {
            if style.compatible(e.style) {
                Stance::Agrees
            } else {
                Stance::Contradicts
            }
        });
        let (agree, contradict, min) = (tally.agree, tally.contradict, self.min_precedents);
        let at = claim.location;
        let dim = Dimension::PatternAlignment;
        let text = &claim.text;

        let finding = if agree >= min && contradict == 0 {
            Finding::new(
                dim,
                Severity::Pass,
                at,
                format!("`{text}` follows {style}, consistent with {agree} precedents"),
            )
        } else if contradict > agree {
            let majority = tally
                .majority_style()
                .map(|s| self.resolve(s, claimed))
                .unwrap_or(style);
            let rendered = claimed.render(majority);
            let replacement = claimed.replace_in(text, &rendered);
            Finding::new(
                dim,
                Severity::Fail,
                at,
                format!(
                    "`{text}` uses {style}, but {contradict} of {} precedents use {}",
                    tally.evidence.len(),
                    majority
                ),
            )
            .recommend(format!("use {majority}, e.g. `{rendered}`"))
            .with_edit(Edit {
                line: at.line,
                original: text.clone(),
                replacement,
            })
        } else if agree == 0 && contradict == 0 {
            Finding::new(dim, Severity::Warn, at, format!("no precedent found for `{text}`"))
                .recommend("confirm the naming convention by hand")
        } else if contradict == 0 {
            Finding::new(
                dim,
                Severity::Warn,
                at,
                format!("insufficient precedent for `{text}`: {agree} agreeing, {min} required"),
            )
            .recommend("find more examples before relying on this convention")
        } else {
            Finding::new(
                dim,
                Severity::Warn,
                at,
                format!("mixed precedent for `{text}`: {agree} agree, {contradict} contradict"),
            )
            .recommend("check which convention the nearest code follows")
        };
        tally.into_finding(finding)
    }

    /// A lowercase single-word majority says nothing about how words are
    /// joined; fall back to the codebase-wide multi-word style.
    fn resolve(&self, majority: CaseStyle, claimed: &ClaimedStyle) -> CaseStyle {
        if majority.is_multiword() {
            return majority;
        }
        match claimed {
            ClaimedStyle::File(name) => self
                .index
                .dominant_file_style(name.extension())
                .unwrap_or(CaseStyle::Kebab),
            ClaimedStyle::Dir(_) => CaseStyle::Kebab,
            ClaimedStyle::Identifier(_, category) => {
                self.index.dominant_symbol_style(*category).unwrap_or(match category {
                    SymbolCategory::Type => CaseStyle::Pascal,
                    _ => CaseStyle::Snake,
                })
            }
        }
    }

    // -----------------------------------------------------------------------
    // References and config fields
    // -----------------------------------------------------------------------

    fn judge_reference(&self, claim: &Claim, evidence: &[Evidence], what: &str) -> Finding {
        let subject = claim.subject();
        let tally = Tally::new(evidence, |e| {
            if e.name == subject || e.source == EvidenceSource::File {
                Stance::Agrees
            } else {
                Stance::Contradicts
            }
        });
        let at = claim.location;
        let dim = Dimension::PatternAlignment;

        let finding = if tally.agree >= 1 && tally.contradict == 0 {
            let first = tally
                .evidence
                .first()
                .map(|e| e.path.clone())
                .unwrap_or_default();
            Finding::new(dim, Severity::Pass, at, format!("`{subject}` found in `{first}`"))
        } else if tally.contradict > tally.agree {
            let actual = tally.majority_name().unwrap_or_else(|| subject.to_string());
            Finding::new(
                dim,
                Severity::Fail,
                at,
                format!("no {what} named `{subject}`; the codebase spells it `{actual}`"),
            )
            .recommend(format!("use `{actual}`"))
            .with_edit(Edit {
                line: at.line,
                original: claim.text.clone(),
                replacement: claim.text.replacen(subject, &actual, 1),
            })
        } else if tally.agree == 0 && tally.contradict == 0 {
            Finding::new(dim, Severity::Warn, at, format!("no {what} found for `{subject}`"))
                .recommend("check that it exists or is created by an earlier task")
        } else {
            Finding::new(
                dim,
                Severity::Warn,
                at,
                format!(
                    "`{subject}` is ambiguous: {} exact and {} differently spelled matches",
                    tally.agree, tally.contradict
                ),
            )
            .recommend("name the exact definition the step relies on")
        };
        tally.into_finding(finding)
    }
}

// ---------------------------------------------------------------------------
// Claimed names
// ---------------------------------------------------------------------------

/// The name a claim introduces, in the form needed to restyle it.
enum ClaimedStyle {
    File(FileName),
    Dir(String),
    Identifier(String, SymbolCategory),
}

fn claimed_path_style(target: &str) -> ClaimedStyle {
    let name = paths::file_name(target);
    if name.contains('.') {
        ClaimedStyle::File(FileName::parse(name))
    } else {
        ClaimedStyle::Dir(name.to_string())
    }
}

impl ClaimedStyle {
    fn style(&self) -> CaseStyle {
        match self {
            ClaimedStyle::File(f) => f.style(),
            ClaimedStyle::Dir(d) => naming::classify(d),
            ClaimedStyle::Identifier(name, _) => naming::classify(name),
        }
    }

    fn render(&self, style: CaseStyle) -> String {
        match self {
            ClaimedStyle::File(f) => f.restyled(style),
            ClaimedStyle::Dir(d) => naming::render(&naming::split_words(d), style),
            ClaimedStyle::Identifier(name, _) => naming::render(&naming::split_words(name), style),
        }
    }

    /// `text` with the claimed name swapped for `rendered`.
    fn replace_in(&self, text: &str, rendered: &str) -> String {
        let original = match self {
            ClaimedStyle::File(f) => format!("{}{}", f.stem, f.suffix),
            ClaimedStyle::Dir(d) | ClaimedStyle::Identifier(d, _) => d.clone(),
        };
        match text.rfind(&original) {
            Some(at) => format!("{}{}{}", &text[..at], rendered, &text[at + original.len()..]),
            None => rendered.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
