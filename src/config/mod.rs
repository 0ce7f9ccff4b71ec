// Job configuration for blockpatch
// A job names the target file, the two blocks and the edit options.

#[allow(clippy::module_inception)]
pub mod config;

pub use config::{JobConfig, SubstitutionJob};
