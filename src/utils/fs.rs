use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Seek, SeekFrom, Write};
use std::path::Path;

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{map_io_err, BlockPatchError, BlockPatchResult, ErrorExt};

/// Whole-document access to the target file.
///
/// The substitution engine never touches the filesystem directly; it reads
/// and writes through this trait so a failing writer can be injected.
pub trait DocumentStore {
    /// Read the full document as text
    fn read(&self, path: &Path) -> BlockPatchResult<String>;

    /// Replace the full document with `content`
    fn write(&self, path: &Path, content: &str) -> BlockPatchResult<()>;
}

/// Filesystem-backed store.
///
/// Writes are atomic and read back afterwards to confirm the file holds
/// exactly what was written.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStore;

impl FsStore {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentStore for FsStore {
    fn read(&self, path: &Path) -> BlockPatchResult<String> {
        read_text(path)
    }

    fn write(&self, path: &Path, content: &str) -> BlockPatchResult<()> {
        write_atomic(path, content)?;
        verify_written(path, content)
    }
}

/// Read a file and decode it strictly as UTF-8
pub fn read_text(path: impl AsRef<Path>) -> BlockPatchResult<String> {
    let path = path.as_ref();
    debug!("Reading file: {}", path.display());

    let bytes = fs::read(path).with_path(path)?;
    String::from_utf8(bytes).map_err(|e| BlockPatchError::decode_error(e, path))
}

/// Replace a file's content without ever exposing a half-written file.
///
/// The target must be writable by the caller; a read-only file is an `Io`
/// error even when its directory would allow a rename over it. The new
/// content goes to a temp file in the same directory, is synced, takes over
/// the original permissions and is then renamed over the target. When the
/// directory refuses the temp file the content is written in place through
/// the already opened target instead. On any failure before that point the
/// temp file is dropped (and removed) and the target is untouched.
pub fn write_atomic(path: impl AsRef<Path>, content: &str) -> BlockPatchResult<()> {
    let path = path.as_ref();
    debug!("Writing file atomically: {}", path.display());

    // Open without truncating, only to prove the target itself is writable
    let target = match OpenOptions::new().write(true).open(path) {
        Ok(file) => Some(file),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(BlockPatchError::io_error(e, Some(path))),
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = match (NamedTempFile::new_in(parent), target) {
        (Ok(temp), _) => temp,
        (Err(e), Some(target)) if e.kind() == ErrorKind::PermissionDenied => {
            warn!(
                "Directory {} is not writable, rewriting {} in place",
                parent.display(),
                path.display()
            );
            return write_in_place(target, path, content);
        }
        (Err(e), _) => return Err(BlockPatchError::io_error(e, Some(path))),
    };

    // Stage the full content and flush it to disk before the swap
    temp.write_all(content.as_bytes()).map_err(map_io_err(path))?;
    temp.as_file().sync_all().map_err(map_io_err(path))?;

    // Keep the mode of the file being replaced
    match fs::metadata(path) {
        Ok(metadata) => {
            fs::set_permissions(temp.path(), metadata.permissions())
                .map_err(map_io_err(path))?;
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(BlockPatchError::io_error(e, Some(path))),
    }

    // Rename over the target
    temp.persist(path)
        .map_err(|e| BlockPatchError::io_error(e.error, Some(path)))?;

    Ok(())
}

/// Truncate and rewrite an open file. Not atomic; only used when the
/// directory does not allow a temp file next to the target.
fn write_in_place(mut file: File, path: &Path, content: &str) -> BlockPatchResult<()> {
    file.set_len(0).with_path(path)?;
    file.seek(SeekFrom::Start(0)).with_path(path)?;
    file.write_all(content.as_bytes()).with_path(path)?;
    file.sync_all().with_path(path)
}

fn verify_written(path: &Path, content: &str) -> BlockPatchResult<()> {
    let on_disk = fs::read(path).with_path(path)?;
    if calculate_hash(&on_disk) != calculate_string_hash(content) {
        warn!(
            "File hash after write doesn't match expected: {}",
            path.display()
        );
        return Err(BlockPatchError::write_verification(path));
    }
    Ok(())
}

/// Hex SHA-256 of raw bytes
pub fn calculate_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Hex SHA-256 of a string's UTF-8 bytes
pub fn calculate_string_hash(content: &str) -> String {
    calculate_hash(content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_write_round_trip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.txt");
        fs::write(&file_path, "old").unwrap();

        let store = FsStore::new();
        store.write(&file_path, "Hello, world!\r\nçé\n").unwrap();
        assert!(file_path.is_file());
        assert_eq!(store.read(&file_path).unwrap(), "Hello, world!\r\nçé\n");
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.txt");
        fs::write(&file_path, "before").unwrap();

        write_atomic(&file_path, "after").unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "after");
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.txt");

        match read_text(&missing) {
            Err(BlockPatchError::Io { source, path }) => {
                assert_eq!(source.kind(), ErrorKind::NotFound);
                assert_eq!(path, Some(missing));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_read_invalid_utf8() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("latin1.txt");
        fs::write(&file_path, [b'M', 0xe9, b'd', b'i', b'a']).unwrap();

        assert!(matches!(
            read_text(&file_path),
            Err(BlockPatchError::Decode { .. })
        ));
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("nope").join("test.txt");

        assert!(matches!(
            write_atomic(&file_path, "content"),
            Err(BlockPatchError::Io { .. })
        ));
        assert!(!file_path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let file_path = dir.path().join("script.sh");
        fs::write(&file_path, "#!/bin/sh\necho old\n").unwrap();
        fs::set_permissions(&file_path, fs::Permissions::from_mode(0o755)).unwrap();

        write_atomic(&file_path, "#!/bin/sh\necho new\n").unwrap();

        let mode = fs::metadata(&file_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    /// True when the current user can write to a file despite its mode
    /// (running as root), in which case permission tests have nothing to show.
    #[cfg(unix)]
    fn mode_is_bypassed(path: &Path) -> bool {
        OpenOptions::new().write(true).open(path).is_ok()
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_target_is_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let file_path = dir.path().join("locked.txt");
        fs::write(&file_path, "old").unwrap();
        fs::set_permissions(&file_path, fs::Permissions::from_mode(0o444)).unwrap();
        if mode_is_bypassed(&file_path) {
            return;
        }

        match write_atomic(&file_path, "new") {
            Err(BlockPatchError::Io { source, path }) => {
                assert_eq!(source.kind(), ErrorKind::PermissionDenied);
                assert_eq!(path, Some(file_path.clone()));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "old");
        let mode = fs::metadata(&file_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o444);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_writable_target_in_read_only_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let locked_dir = dir.path().join("locked");
        fs::create_dir(&locked_dir).unwrap();
        let file_path = locked_dir.join("notes.txt");
        fs::write(&file_path, "old").unwrap();
        fs::set_permissions(&file_path, fs::Permissions::from_mode(0o666)).unwrap();
        fs::set_permissions(&locked_dir, fs::Permissions::from_mode(0o555)).unwrap();

        let result = FsStore::new().write(&file_path, "new");

        let content = fs::read_to_string(&file_path).unwrap();
        let entries = fs::read_dir(&locked_dir).unwrap().count();
        fs::set_permissions(&locked_dir, fs::Permissions::from_mode(0o755)).unwrap();

        result.unwrap();
        assert_eq!(content, "new");
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_temp_file_error_names_target() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("nope").join("test.txt");

        match write_atomic(&file_path, "content") {
            Err(BlockPatchError::Io { path, .. }) => assert_eq!(path, Some(file_path)),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_string_hash_matches_bytes_hash() {
        assert_eq!(
            calculate_string_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(calculate_hash(b"abc"), calculate_string_hash("abc"));
    }
}
