//! Small persisted state that outlives a session, and the atomic file write it relies on.

pub mod prefs;

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

pub use prefs::{Prefs, PrefsStore};

pub type Result<T> = anyhow::Result<T>;

/// Replace `target` with `bytes` through a temp file in the same directory.
///
/// Missing parent directories are created. Readers see either the old file or the new one.
pub fn write_atomic(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    match temp.persist(target) {
        Ok(_) => Ok(()),
        Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
            match fs::remove_file(target) {
                Ok(()) => {}
                Err(remove_err) if remove_err.kind() == io::ErrorKind::NotFound => {}
                Err(remove_err) => return Err(remove_err),
            }
            err.file.persist(target).map(|_| ()).map_err(|persist_err| persist_err.error)
        }
        Err(err) => Err(err.error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_creates_parents_and_replaces_in_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("a").join("b").join("file.bin");

        write_atomic(&target, b"first").unwrap();
        write_atomic(&target, b"second").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"second");
        let parent = target.parent().unwrap();
        assert_eq!(fs::read_dir(parent).unwrap().count(), 1);
    }
}
