// Literal block substitution.
// The file is read whole, checked for the expected block, rewritten in
// memory and written back once.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::error::{BlockPatchError, BlockPatchResult};
use crate::utils::fs::{calculate_string_hash, DocumentStore, FsStore};
use crate::utils::paths;

/// Which occurrences of the expected block get replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccurrencePolicy {
    /// Replace every non-overlapping occurrence
    #[default]
    All,
    /// Replace only the first occurrence
    First,
    /// Fail unless the block occurs exactly once
    Unique,
}

impl OccurrencePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OccurrencePolicy::All => "all",
            OccurrencePolicy::First => "first",
            OccurrencePolicy::Unique => "unique",
        }
    }
}

impl fmt::Display for OccurrencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OccurrencePolicy {
    type Err = BlockPatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(OccurrencePolicy::All),
            "first" => Ok(OccurrencePolicy::First),
            "unique" => Ok(OccurrencePolicy::Unique),
            other => Err(BlockPatchError::invalid_argument(format!(
                "unknown occurrence policy '{}' (expected all, first or unique)",
                other
            ))),
        }
    }
}

/// Options for a single substitution run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditOptions {
    pub policy: OccurrencePolicy,
    /// Check and report, but never write
    pub dry_run: bool,
}

impl EditOptions {
    pub fn with_policy(mut self, policy: OccurrencePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// In-memory result of applying a substitution to a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub content: String,
    /// Non-overlapping occurrences found in the original content
    pub occurrences: usize,
    pub replaced: usize,
}

/// Outcome of a successful run, returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditReport {
    pub path: PathBuf,
    pub policy: OccurrencePolicy,
    pub occurrences: usize,
    pub replaced: usize,
    pub bytes_before: usize,
    pub bytes_after: usize,
    pub hash_before: String,
    pub hash_after: String,
    /// True when the write was skipped
    pub dry_run: bool,
}

impl EditReport {
    /// Human-readable one-line confirmation
    pub fn summary(&self) -> String {
        let verb = if self.dry_run {
            "would replace"
        } else {
            "replaced"
        };
        format!(
            "{} {} occurrence(s) in {}",
            verb,
            self.replaced,
            self.path.display()
        )
    }
}

impl fmt::Display for EditReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Replace `expected` in `content` according to `policy`.
///
/// Pure; `path` only feeds error messages. Matching is an exact substring
/// search and occurrences are counted left to right without overlap, the
/// same way `str::replace` walks the content.
pub fn substitute(
    path: &Path,
    content: &str,
    expected: &str,
    replacement: &str,
    policy: OccurrencePolicy,
) -> BlockPatchResult<Substitution> {
    if expected.is_empty() {
        return Err(BlockPatchError::EmptyExpectedBlock);
    }

    // Non-overlapping, left to right
    let occurrences = content.matches(expected).count();
    debug!(
        "Found {} occurrence(s) of expected block in {}",
        occurrences,
        path.display()
    );

    if occurrences == 0 {
        return Err(BlockPatchError::block_not_found(path));
    }

    let (content, replaced) = match policy {
        OccurrencePolicy::All => {
            if occurrences > 1 {
                warn!(
                    "Expected block occurs {} times in {}, replacing all of them",
                    occurrences,
                    path.display()
                );
            }
            (content.replace(expected, replacement), occurrences)
        }
        OccurrencePolicy::First => (content.replacen(expected, replacement, 1), 1),
        OccurrencePolicy::Unique => {
            if occurrences > 1 {
                return Err(BlockPatchError::ambiguous_match(path, occurrences));
            }
            (content.replacen(expected, replacement, 1), 1)
        }
    };

    Ok(Substitution {
        content,
        occurrences,
        replaced,
    })
}

/// Apply the substitution through `store`.
///
/// Every check runs before the write, so any error other than a failed write
/// leaves the document untouched. Symlinked targets are resolved first so
/// the real file is rewritten.
pub fn apply_literal_substitution_with<S: DocumentStore + ?Sized>(
    store: &S,
    path: impl AsRef<Path>,
    expected: &str,
    replacement: &str,
    options: EditOptions,
) -> BlockPatchResult<EditReport> {
    if expected.is_empty() {
        return Err(BlockPatchError::EmptyExpectedBlock);
    }

    // Resolve symlinks so the real file is the one rewritten
    let path = paths::normalize(path.as_ref())?;
    let original = store.read(&path)?;

    // All precondition checks happen here, before anything is written
    let substitution = substitute(&path, &original, expected, replacement, options.policy)?;

    let report = EditReport {
        policy: options.policy,
        occurrences: substitution.occurrences,
        replaced: substitution.replaced,
        bytes_before: original.len(),
        bytes_after: substitution.content.len(),
        hash_before: calculate_string_hash(&original),
        hash_after: calculate_string_hash(&substitution.content),
        dry_run: options.dry_run,
        path,
    };

    if options.dry_run {
        info!("Dry run, not writing {}", report.path.display());
        return Ok(report);
    }

    // Single full-document write
    store.write(&report.path, &substitution.content)?;
    info!(
        "Replaced {} of {} occurrence(s) in {}",
        report.replaced,
        report.occurrences,
        report.path.display()
    );

    Ok(report)
}

/// Replace every occurrence of `expected` in the file at `path`.
///
/// Fails with [`BlockPatchError::BlockNotFound`] without writing anything if
/// the block is absent.
pub fn apply_literal_substitution(
    path: impl AsRef<Path>,
    expected: &str,
    replacement: &str,
) -> BlockPatchResult<EditReport> {
    apply_literal_substitution_with(
        &FsStore::new(),
        path,
        expected,
        replacement,
        EditOptions::default(),
    )
}
