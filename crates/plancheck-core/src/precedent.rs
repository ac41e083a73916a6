//! Convention extractor: gathers precedent for a claim from the index.
//!
//! Matching is structural. File and identifier names are compared by word
//! sequence and casing style, never by literal string, and results are
//! ranked by directory distance from the claim's scope so that the nearest
//! code speaks first.

use crate::config::Config;
use crate::finding::{Evidence, EvidenceSource, Stance};
use crate::index::{CodebaseIndex, IndexedFile, Symbol};
use crate::naming::{self, FileName};
use crate::paths;
use crate::plan::{Claim, ClaimKind, StructuralCheck};
use crate::types::SymbolCategory;

impl Evidence {
    pub fn for_file(file: &IndexedFile) -> Self {
        Self {
            path: file.path.clone(),
            line: None,
            source: EvidenceSource::File,
            name: file.stem.clone(),
            style: file.style,
            stance: Stance::Neutral,
            fact: format!("`{}` is {}", file.name, file.style.label()),
        }
    }

    pub fn for_dir(dir: &str) -> Self {
        let name = paths::file_name(dir);
        let style = naming::classify(name);
        Self {
            path: dir.to_string(),
            line: None,
            source: EvidenceSource::Directory,
            name: name.to_string(),
            style,
            stance: Stance::Neutral,
            fact: format!("directory `{}/` is {}", name, style.label()),
        }
    }

    pub fn for_symbol(file: &IndexedFile, symbol: &Symbol) -> Self {
        let style = naming::classify(&symbol.name);
        Self {
            path: file.path.clone(),
            line: Some(symbol.line),
            source: EvidenceSource::Symbol,
            name: symbol.name.clone(),
            style,
            stance: Stance::Neutral,
            fact: format!(
                "{} `{}` is {} ({}:{})",
                symbol.category,
                symbol.name,
                style.label(),
                file.path,
                symbol.line
            ),
        }
    }

    /// Directory used to rank this precedent by proximity.
    fn anchor(&self) -> &str {
        paths::parent_dir(&self.path)
    }
}

/// Categories a naming claim without a hint is compared against.
pub fn implied_categories(name: &str) -> Vec<SymbolCategory> {
    if name.chars().next().is_some_and(char::is_uppercase) {
        vec![SymbolCategory::Type]
    } else {
        vec![SymbolCategory::Function, SymbolCategory::Value]
    }
}

pub struct Extractor<'a> {
    index: &'a CodebaseIndex,
    cap: usize,
    min: usize,
}

impl<'a> Extractor<'a> {
    pub fn new(index: &'a CodebaseIndex, cap: usize, min: usize) -> Self {
        Self { index, cap, min }
    }

    pub fn from_config(index: &'a CodebaseIndex, config: &Config) -> Self {
        Self::new(index, config.evidence_cap, config.min_precedents)
    }

    /// Ordered precedent for `claim`, nearest first, at most `cap` entries.
    /// Empty when nothing comparable exists.
    pub fn find_precedents(&self, claim: &Claim) -> Vec<Evidence> {
        let scope = claim.scope.as_deref().unwrap_or("");
        let mut found = match claim.kind {
            ClaimKind::Path { .. } => self.path_precedents(&claim.text, scope),
            ClaimKind::Naming { category } => {
                let cats = category
                    .map(|c| vec![c])
                    .unwrap_or_else(|| implied_categories(claim.subject()));
                self.symbol_precedents(scope, |s| cats.contains(&s.category))
            }
            ClaimKind::Reference { .. } => self.same_words(claim.subject(), scope, None),
            ClaimKind::Structural {
                check: StructuralCheck::ConfigField,
            } => self.same_words(claim.subject(), scope, Some(SymbolCategory::Key)),
            ClaimKind::Structural {
                check: StructuralCheck::ManualReview,
            } => Vec::new(),
        };
        found.truncate(self.cap);
        tracing::debug!(
            claim = %claim.text,
            kind = claim.kind.label(),
            precedents = found.len(),
            "gathered precedent"
        );
        found
    }

    fn path_precedents(&self, text: &str, scope: &str) -> Vec<Evidence> {
        let target = paths::normalize(text);
        let name = paths::file_name(&target);
        if !name.contains('.') {
            let parent = paths::parent_dir(&target);
            let others: Vec<&str> = self.index.dirs().filter(|d| *d != target).collect();
            return self.widen(
                scope,
                others
                    .iter()
                    .filter(|d| paths::parent_dir(d) == parent)
                    .map(|d| Evidence::for_dir(d))
                    .collect(),
                || others.iter().map(|d| Evidence::for_dir(d)).collect(),
            );
        }

        let claimed = FileName::parse(name);
        let ext = claimed.extension().to_string();
        let candidates: Vec<&IndexedFile> =
            self.index.files().filter(|f| f.path != target).collect();
        self.widen(
            scope,
            candidates
                .iter()
                .filter(|f| f.suffix == claimed.suffix)
                .map(|f| Evidence::for_file(f))
                .collect(),
            || {
                candidates
                    .iter()
                    .filter(|f| !ext.is_empty() && f.extension() == ext)
                    .map(|f| Evidence::for_file(f))
                    .collect()
            },
        )
    }

    fn symbol_precedents(&self, scope: &str, keep: impl Fn(&Symbol) -> bool) -> Vec<Evidence> {
        let found = self
            .index
            .symbols()
            .filter(|(_, s)| keep(s))
            .map(|(f, s)| Evidence::for_symbol(f, s))
            .collect();
        rank(found, scope)
    }

    /// Declarations and files spelling the same words as `name`, in any style.
    fn same_words(&self, name: &str, scope: &str, category: Option<SymbolCategory>) -> Vec<Evidence> {
        let words = naming::split_words(name);
        if words.is_empty() {
            return Vec::new();
        }
        let mut found: Vec<Evidence> = self
            .index
            .symbols()
            .filter(|(_, s)| category.map_or(true, |c| s.category == c))
            .filter(|(_, s)| naming::split_words(&s.name) == words)
            .map(|(f, s)| Evidence::for_symbol(f, s))
            .collect();
        if category.is_none() {
            found.extend(
                self.index
                    .files()
                    .filter(|f| f.words == words)
                    .map(Evidence::for_file),
            );
        }
        rank(found, scope)
    }

    /// Rank the preferred tier; fall back to the wider tier when the
    /// preferred one holds fewer than `min` entries.
    fn widen(
        &self,
        scope: &str,
        preferred: Vec<Evidence>,
        wider: impl FnOnce() -> Vec<Evidence>,
    ) -> Vec<Evidence> {
        let mut found = rank(preferred, scope);
        if found.len() < self.min {
            let extra: Vec<Evidence> = wider()
                .into_iter()
                .filter(|e| !found.iter().any(|f| f.path == e.path))
                .collect();
            found.extend(rank(extra, scope));
        }
        found
    }
}

fn rank(mut found: Vec<Evidence>, scope: &str) -> Vec<Evidence> {
    found.sort_by(|a, b| {
        paths::tree_distance(a.anchor(), scope)
            .cmp(&paths::tree_distance(b.anchor(), scope))
            .then_with(|| a.path.cmp(&b.path))
            .then_with(|| a.line.cmp(&b.line))
    });
    found
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Location;

    fn claim(kind: ClaimKind, text: &str, scope: Option<&str>) -> Claim {
        Claim {
            kind,
            text: text.to_string(),
            location: Location {
                task: 1,
                step: Some(1),
                line: 3,
            },
            scope: scope.map(String::from),
        }
    }

    fn new_file(text: &str) -> Claim {
        let scope = paths::parent_dir(text).to_string();
        claim(ClaimKind::Path { to_be_created: true }, text, Some(&scope))
    }

    #[test]
    fn nearest_directory_ranks_first() {
        let index = CodebaseIndex::from_paths(&[
            "lib/legacy/old.service.ts",
            "src/services/user.service.ts",
            "src/services/payment.service.ts",
            "src/api/session.service.ts",
        ]);
        let found = Extractor::new(&index, 10, 3).find_precedents(&new_file("src/services/UserAuth.service.ts"));
        let order: Vec<&str> = found.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            order,
            vec![
                "src/services/payment.service.ts",
                "src/services/user.service.ts",
                "src/api/session.service.ts",
                "lib/legacy/old.service.ts",
            ]
        );
    }

    #[test]
    fn compound_suffix_widens_to_extension() {
        let index = CodebaseIndex::from_paths(&[
            "src/user.service.ts",
            "src/auth-client.ts",
            "src/session-store.ts",
            "src/readme.md",
        ]);
        let found = Extractor::new(&index, 10, 3).find_precedents(&new_file("src/billing.service.ts"));
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].path, "src/user.service.ts");
        assert!(found.iter().all(|e| e.path.ends_with(".ts")));
    }

    #[test]
    fn cap_limits_results() {
        let paths: Vec<String> = (0..20).map(|i| format!("src/file{i}.rs")).collect();
        let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        let index = CodebaseIndex::from_paths(&refs);
        let found = Extractor::new(&index, 5, 3).find_precedents(&new_file("src/new_file.rs"));
        assert_eq!(found.len(), 5);
    }

    #[test]
    fn no_precedent_is_empty_not_error() {
        let index = CodebaseIndex::from_paths(&["README.md"]);
        let found = Extractor::new(&index, 10, 3).find_precedents(&new_file("src/widget.go"));
        assert!(found.is_empty());
    }

    #[test]
    fn directory_claims_compare_against_sibling_directories() {
        let index = CodebaseIndex::from_paths(&[
            "src/user-profile/index.ts",
            "src/order-history/index.ts",
            "docs/guide.md",
        ]);
        let c = claim(ClaimKind::Path { to_be_created: true }, "src/payment_methods/", Some("src/payment_methods"));
        let found = Extractor::new(&index, 10, 3).find_precedents(&c);
        assert_eq!(found[0].source, EvidenceSource::Directory);
        assert_eq!(found[0].path, "src/order-history");
        assert_eq!(found[1].path, "src/user-profile");
    }

    #[test]
    fn naming_claims_use_symbols_of_implied_category() {
        let index = CodebaseIndex::from_paths(&["src/users.rs", "src/auth.rs"])
            .with_symbols(
                "src/users.rs",
                vec![
                    Symbol { name: "UserStore".into(), category: SymbolCategory::Type, line: 3 },
                    Symbol { name: "load_user".into(), category: SymbolCategory::Function, line: 9 },
                ],
            )
            .with_symbols(
                "src/auth.rs",
                vec![Symbol { name: "AuthToken".into(), category: SymbolCategory::Type, line: 1 }],
            );
        let c = claim(ClaimKind::Naming { category: None }, "SessionCache", Some("src"));
        let found = Extractor::new(&index, 10, 3).find_precedents(&c);
        let names: Vec<&str> = found.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["AuthToken", "UserStore"]);
        assert_eq!(found[1].line, Some(3));
    }

    #[test]
    fn references_match_by_words_across_styles() {
        let index = CodebaseIndex::from_paths(&["src/token.ts", "src/validate-token.ts"]).with_symbols(
            "src/token.ts",
            vec![Symbol { name: "validateToken".into(), category: SymbolCategory::Function, line: 4 }],
        );
        let c = claim(ClaimKind::Reference { category: None }, "validate_token()", None);
        let found = Extractor::new(&index, 10, 3).find_precedents(&c);
        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|e| e.source == EvidenceSource::Symbol && e.name == "validateToken"));
        assert!(found.iter().any(|e| e.source == EvidenceSource::File));
    }
}
