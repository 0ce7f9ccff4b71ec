use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::diff::{EditOptions, OccurrencePolicy};
use crate::error::{BlockPatchError, BlockPatchResult};
use crate::utils::{fs, paths};

/// A substitution job as written in a job file or assembled from CLI flags.
///
/// Each block comes either inline or from a file, never both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Target document
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub expected: Option<String>,
    #[serde(default)]
    pub expected_file: Option<PathBuf>,

    #[serde(default)]
    pub replacement: Option<String>,
    #[serde(default)]
    pub replacement_file: Option<PathBuf>,

    #[serde(default)]
    pub occurrences: Option<OccurrencePolicy>,

    #[serde(default)]
    pub dry_run: bool,
}

/// A fully resolved job, ready to hand to the substitution engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionJob {
    pub path: PathBuf,
    pub expected: String,
    pub replacement: String,
    pub options: EditOptions,
}

impl JobConfig {
    /// Load a job file, picking the format from its extension.
    ///
    /// Relative paths inside the file are rebased onto the file's directory.
    pub fn load(path: &Path) -> BlockPatchResult<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let content = fs::read_text(path)?;

        let config: JobConfig = match ext {
            "json" => serde_json::from_str(&content)?,
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "toml" => toml::from_str(&content)?,
            _ => {
                return Err(BlockPatchError::invalid_argument(format!(
                    "Unsupported job file format: {}",
                    path.display()
                )))
            }
        };

        debug!("Loaded job file {}", path.display());

        let base = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(config.rebase(&base))
    }

    fn rebase(mut self, base: &Path) -> Self {
        let rebase = |p: Option<PathBuf>| p.map(|p| paths::resolve_against(base, p));
        self.path = rebase(self.path.take());
        self.expected_file = rebase(self.expected_file.take());
        self.replacement_file = rebase(self.replacement_file.take());
        self
    }

    /// Layer `overrides` on top of this job.
    ///
    /// A block given in `overrides` replaces both of this job's sources for
    /// that block, so `--expected-file` beats an inline `expected` from the
    /// job file.
    pub fn merge(mut self, overrides: JobConfig) -> Self {
        if overrides.path.is_some() {
            self.path = overrides.path;
        }
        if overrides.expected.is_some() || overrides.expected_file.is_some() {
            self.expected = overrides.expected;
            self.expected_file = overrides.expected_file;
        }
        if overrides.replacement.is_some() || overrides.replacement_file.is_some() {
            self.replacement = overrides.replacement;
            self.replacement_file = overrides.replacement_file;
        }
        if overrides.occurrences.is_some() {
            self.occurrences = overrides.occurrences;
        }
        self.dry_run |= overrides.dry_run;
        self
    }

    /// Read block files and check that everything needed is present
    pub fn resolve(self) -> BlockPatchResult<SubstitutionJob> {
        let path = self
            .path
            .map(paths::expand_tilde)
            .ok_or_else(|| BlockPatchError::invalid_argument("no target file given"))?;
        let expected = read_block("expected", self.expected, self.expected_file)?;
        let replacement = read_block("replacement", self.replacement, self.replacement_file)?;

        if expected.is_empty() {
            return Err(BlockPatchError::EmptyExpectedBlock);
        }

        Ok(SubstitutionJob {
            path,
            expected,
            replacement,
            options: EditOptions::default()
                .with_policy(self.occurrences.unwrap_or_default())
                .dry_run(self.dry_run),
        })
    }
}

fn read_block(
    name: &str,
    inline: Option<String>,
    file: Option<PathBuf>,
) -> BlockPatchResult<String> {
    match (inline, file) {
        (Some(text), None) => Ok(text),
        (None, Some(file)) => fs::read_text(paths::expand_tilde(file)),
        (Some(_), Some(_)) => Err(BlockPatchError::invalid_argument(format!(
            "both {name} and {name}_file given; use one"
        ))),
        (None, None) => Err(BlockPatchError::invalid_argument(format!(
            "no {name} block given"
        ))),
    }
}
