use std::path::{Path, PathBuf};

use crate::error::{BlockPatchResult, ErrorExt};

/// Canonicalize a path, resolving all symlinks
pub fn canonicalize(path: impl AsRef<Path>) -> BlockPatchResult<PathBuf> {
    let path = path.as_ref();
    path.canonicalize().with_path(path)
}

/// Expand the tilde in a path to the home directory
pub fn expand_tilde(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();

    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Resolve `path` against `base` unless it is already absolute.
///
/// Tilde expansion happens first, so `~/x` is never joined onto `base`.
pub fn resolve_against(base: impl AsRef<Path>, path: impl AsRef<Path>) -> PathBuf {
    let path = expand_tilde(path);
    if path.is_absolute() {
        path
    } else {
        base.as_ref().join(path)
    }
}

/// Normalize a path, expanding tilde and resolving symlinks
pub fn normalize(path: impl AsRef<Path>) -> BlockPatchResult<PathBuf> {
    let path = expand_tilde(path);
    canonicalize(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        let path = expand_tilde("~/test.txt");
        assert_eq!(path, home.join("test.txt"));

        let path = expand_tilde("~");
        assert_eq!(path, home);

        let path = expand_tilde("/tmp/test.txt");
        assert_eq!(path, PathBuf::from("/tmp/test.txt"));

        let path = expand_tilde("~user/test.txt");
        assert_eq!(path, PathBuf::from("~user/test.txt"));
    }

    #[test]
    fn test_resolve_against() {
        let base = Path::new("/jobs");
        assert_eq!(
            resolve_against(base, "blocks/old.txt"),
            PathBuf::from("/jobs/blocks/old.txt")
        );
        assert_eq!(
            resolve_against(base, "/abs/old.txt"),
            PathBuf::from("/abs/old.txt")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_follows_symlinks() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("real.txt");
        let link = dir.path().join("link.txt");
        std::fs::write(&real, "").unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert_eq!(normalize(&link).unwrap(), canonicalize(&real).unwrap());
    }

    #[test]
    fn test_normalize_missing_path() {
        let dir = tempdir().unwrap();
        assert!(normalize(dir.path().join("missing")).is_err());
    }
}
