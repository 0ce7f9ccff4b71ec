// blockpatch - verified literal-block substitution for text files
// Rewrites a file only when the block it expects to replace is present verbatim.

pub mod config;
pub mod diff;
pub mod error;
pub mod logging;
pub mod utils;

pub use config::{JobConfig, SubstitutionJob};
pub use diff::{
    apply_literal_substitution, apply_literal_substitution_with, substitute, EditOptions,
    EditReport, OccurrencePolicy,
};
pub use error::{BlockPatchError, BlockPatchResult};
pub use utils::{DocumentStore, FsStore};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Run a resolved job against the filesystem
pub fn run_job(job: &SubstitutionJob) -> BlockPatchResult<EditReport> {
    apply_literal_substitution_with(
        &FsStore::new(),
        &job.path,
        &job.expected,
        &job.replacement,
        job.options,
    )
}
