use crate::error::{PlanCheckError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Verification options, read from `.plancheck.yaml` at the codebase root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Subtrees skipped by the indexer. An entry matches either any
    /// directory with that name or a root-relative directory path.
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: BTreeSet<String>,
    /// Unrelated files a single task may touch before it is flagged.
    #[serde(default = "default_max_files_per_task")]
    pub max_files_per_task: usize,
    /// Maximum precedents retrieved per claim.
    #[serde(default = "default_evidence_cap")]
    pub evidence_cap: usize,
    /// Soft indexing timeout in milliseconds. `0` disables it.
    #[serde(default)]
    pub timeout_ms: u64,
    /// Agreeing precedents required for a PASS.
    #[serde(default = "default_min_precedents")]
    pub min_precedents: usize,
    /// Imperative verb phrases allowed in a single step.
    #[serde(default = "default_max_verbs_per_step")]
    pub max_verbs_per_step: usize,
}

fn default_exclude_dirs() -> BTreeSet<String> {
    [
        ".git",
        "target",
        "node_modules",
        "dist",
        "build",
        "vendor",
        ".venv",
        "__pycache__",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_max_files_per_task() -> usize {
    3
}

fn default_evidence_cap() -> usize {
    10
}

fn default_min_precedents() -> usize {
    3
}

fn default_max_verbs_per_step() -> usize {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exclude_dirs: default_exclude_dirs(),
            max_files_per_task: default_max_files_per_task(),
            evidence_cap: default_evidence_cap(),
            timeout_ms: 0,
            min_precedents: default_min_precedents(),
            max_verbs_per_step: default_max_verbs_per_step(),
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub exclude_dirs: Vec<String>,
    pub max_files_per_task: Option<usize>,
    pub evidence_cap: Option<usize>,
    pub timeout_ms: Option<u64>,
}

impl Config {
    /// Load `<root>/.plancheck.yaml`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn with_overrides(mut self, overrides: &Overrides) -> Self {
        self.exclude_dirs
            .extend(overrides.exclude_dirs.iter().cloned());
        if let Some(n) = overrides.max_files_per_task {
            self.max_files_per_task = n;
        }
        if let Some(n) = overrides.evidence_cap {
            self.evidence_cap = n;
        }
        if let Some(ms) = overrides.timeout_ms {
            self.timeout_ms = ms;
        }
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Fail on any `Error`-level warning; used before a verification run.
    pub fn ensure_valid(&self) -> Result<()> {
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PlanCheckError::InvalidConfig(errors.join("; ")))
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.min_precedents == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "minPrecedents must be at least 1".to_string(),
            });
        }

        if self.evidence_cap < self.min_precedents {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "evidenceCap={} is below minPrecedents={}; no claim could ever pass",
                    self.evidence_cap, self.min_precedents
                ),
            });
        }

        if self.max_files_per_task == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "maxFilesPerTask must be at least 1".to_string(),
            });
        }

        if self.max_verbs_per_step == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "maxVerbsPerStep must be at least 1".to_string(),
            });
        }

        for dir in &self.exclude_dirs {
            if dir.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: "empty entry in excludeDirs is ignored".to_string(),
                });
            } else if Path::new(dir).is_absolute() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "excludeDirs entry '{dir}' is absolute; entries are matched relative to the codebase root"
                    ),
                });
            }
        }

        if self.timeout_ms > 0 && self.timeout_ms < 100 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "timeoutMs={} is very short; most runs will use a partial index",
                    self.timeout_ms
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.max_files_per_task, 3);
        assert_eq!(cfg.evidence_cap, 10);
        assert_eq!(cfg.timeout_ms, 0);
        assert_eq!(cfg.min_precedents, 3);
        assert!(cfg.exclude_dirs.contains("node_modules"));
        assert!(cfg.timeout().is_none());
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn camel_case_keys_with_partial_defaults() {
        let yaml = "maxFilesPerTask: 5\ntimeoutMs: 2500\nexcludeDirs:\n  - generated\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.max_files_per_task, 5);
        assert_eq!(cfg.timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(cfg.evidence_cap, 10);
        assert_eq!(cfg.exclude_dirs.len(), 1);
        assert!(cfg.exclude_dirs.contains("generated"));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.evidence_cap = 6;
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.evidence_cap, 6);
    }

    #[test]
    fn overrides_take_precedence() {
        let cfg = Config::default().with_overrides(&Overrides {
            exclude_dirs: vec!["fixtures".to_string()],
            max_files_per_task: Some(4),
            evidence_cap: None,
            timeout_ms: Some(50),
        });
        assert_eq!(cfg.max_files_per_task, 4);
        assert_eq!(cfg.evidence_cap, 10);
        assert_eq!(cfg.timeout_ms, 50);
        assert!(cfg.exclude_dirs.contains("fixtures"));
        assert!(cfg.exclude_dirs.contains(".git"));
    }

    #[test]
    fn cap_below_threshold_is_an_error() {
        let cfg = Config {
            evidence_cap: 2,
            ..Config::default()
        };
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("evidenceCap")));
        assert!(cfg.ensure_valid().is_err());
    }

    #[test]
    fn short_timeout_is_a_warning_only() {
        let cfg = Config {
            timeout_ms: 10,
            ..Config::default()
        };
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
        assert!(cfg.ensure_valid().is_ok());
    }
}
