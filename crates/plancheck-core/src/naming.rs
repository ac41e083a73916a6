//! Identifier tokenization and casing classification.
//!
//! Names are compared structurally: a name is split into lowercase words and
//! classified by casing style, so `UserAuth`, `user_auth` and `user-auth`
//! share a word sequence but differ in style.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// CaseStyle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStyle {
    Kebab,
    Snake,
    Camel,
    Pascal,
    ScreamingSnake,
    /// A single lowercase word: consistent with kebab, snake and camel.
    Flat,
    Mixed,
}

impl CaseStyle {
    pub fn label(self) -> &'static str {
        match self {
            CaseStyle::Kebab => "kebab-case",
            CaseStyle::Snake => "snake_case",
            CaseStyle::Camel => "camelCase",
            CaseStyle::Pascal => "PascalCase",
            CaseStyle::ScreamingSnake => "SCREAMING_SNAKE_CASE",
            CaseStyle::Flat => "lowercase",
            CaseStyle::Mixed => "mixed case",
        }
    }

    /// Whether a name in `self` could belong to a codebase that uses `other`.
    pub fn compatible(self, other: CaseStyle) -> bool {
        if self == other {
            return true;
        }
        let multi_lower = |s: CaseStyle| matches!(s, CaseStyle::Kebab | CaseStyle::Snake | CaseStyle::Camel);
        (self == CaseStyle::Flat && multi_lower(other))
            || (other == CaseStyle::Flat && multi_lower(self))
    }

    /// Styles that say something about how multi-word names are joined.
    pub fn is_multiword(self) -> bool {
        !matches!(self, CaseStyle::Flat | CaseStyle::Mixed)
    }
}

impl fmt::Display for CaseStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Splitting
// ---------------------------------------------------------------------------

/// Split an identifier into lowercase words across every common convention.
///
/// `HTTPServerError` -> `[http, server, error]`, `user_auth2` -> `[user, auth2]`.
pub fn split_words(ident: &str) -> Vec<String> {
    let mut words = Vec::new();
    for chunk in ident.split(|c: char| !c.is_alphanumeric()) {
        if chunk.is_empty() {
            continue;
        }
        let chars: Vec<char> = chunk.chars().collect();
        let mut current = String::new();
        for (i, &c) in chars.iter().enumerate() {
            if i > 0 && c.is_uppercase() {
                let prev = chars[i - 1];
                let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                let boundary = prev.is_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_uppercase() && next_lower);
                if boundary && !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            current.extend(c.to_lowercase());
        }
        if !current.is_empty() {
            words.push(current);
        }
    }
    words
}

/// Classify the casing convention of a single identifier or file stem.
pub fn classify(ident: &str) -> CaseStyle {
    let has_dash = ident.contains('-');
    let has_underscore = ident.contains('_');
    let letters: Vec<char> = ident.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return CaseStyle::Mixed;
    }
    let any_upper = letters.iter().any(|c| c.is_uppercase());
    let any_lower = letters.iter().any(|c| c.is_lowercase());
    let trimmed = ident.trim_matches(|c| c == '_' || c == '-');
    let inner_underscore = trimmed.contains('_');

    match (has_dash, inner_underscore || has_underscore) {
        (true, true) => CaseStyle::Mixed,
        (true, false) if !any_upper => CaseStyle::Kebab,
        (true, false) => CaseStyle::Mixed,
        (false, true) if !any_upper && inner_underscore => CaseStyle::Snake,
        (false, true) if !any_lower && inner_underscore => CaseStyle::ScreamingSnake,
        (false, true) if !inner_underscore => classify(trimmed),
        (false, true) => CaseStyle::Mixed,
        (false, false) => {
            let first_upper = trimmed.chars().next().is_some_and(|c| c.is_uppercase());
            match (first_upper, any_upper, any_lower) {
                (_, false, true) => CaseStyle::Flat,
                (true, true, true) => CaseStyle::Pascal,
                (false, true, true) => CaseStyle::Camel,
                (_, true, false) if letters.len() > 1 => CaseStyle::ScreamingSnake,
                _ => CaseStyle::Mixed,
            }
        }
    }
}

/// Join words in the given style.
pub fn render(words: &[String], style: CaseStyle) -> String {
    let capitalize = |w: &str| {
        let mut chars = w.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        }
    };
    match style {
        CaseStyle::Kebab => words.join("-"),
        CaseStyle::Snake | CaseStyle::Flat | CaseStyle::Mixed => words.join("_"),
        CaseStyle::ScreamingSnake => words.join("_").to_uppercase(),
        CaseStyle::Pascal => words.iter().map(|w| capitalize(w)).collect(),
        CaseStyle::Camel => words
            .iter()
            .enumerate()
            .map(|(i, w)| if i == 0 { w.clone() } else { capitalize(w) })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// File names
// ---------------------------------------------------------------------------

/// A file name split into its naming stem and compound suffix:
/// `UserAuth.service.ts` -> stem `UserAuth`, suffix `.service.ts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileName {
    pub stem: String,
    pub suffix: String,
}

impl FileName {
    pub fn parse(name: &str) -> Self {
        let body = name.strip_prefix('.').unwrap_or(name);
        let offset = name.len() - body.len();
        match body.find('.') {
            Some(dot) => Self {
                stem: name[..offset + dot].to_string(),
                suffix: name[offset + dot..].to_string(),
            },
            None => Self {
                stem: name.to_string(),
                suffix: String::new(),
            },
        }
    }

    /// Final extension without the dot (`ts` for `.service.ts`).
    pub fn extension(&self) -> &str {
        self.suffix
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or("")
    }

    pub fn words(&self) -> Vec<String> {
        split_words(&self.stem)
    }

    pub fn style(&self) -> CaseStyle {
        classify(self.stem.trim_start_matches('.'))
    }

    /// This file name rewritten so its stem follows `style`.
    pub fn restyled(&self, style: CaseStyle) -> String {
        format!("{}{}", render(&self.words(), style), self.suffix)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
