pub mod fs;
pub mod paths;

pub use fs::{DocumentStore, FsStore};
