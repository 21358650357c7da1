use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::HUB_DIR;
use crate::error::Error;

const LOCK_FILE: &str = "lock";

/// Exclusive hold on a hub root for the duration of a mutating command.
///
/// The lock file is created with `create_new` and removed on drop. A stale
/// file left by a killed process has to be deleted by hand.
#[derive(Debug)]
pub struct WorkspaceLock {
    path: PathBuf,
}

impl WorkspaceLock {
    pub fn acquire(root: &Path) -> Result<Self, Error> {
        let path = root.join(HUB_DIR).join(LOCK_FILE);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| Error::Lock {
                path: path.clone(),
                source,
            })?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::Locked { path })
            }
            Err(source) => return Err(Error::Lock { path, source }),
        };
        record_owner(&mut file, &path);

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Informational only; nothing reads the pid back, so a failed write keeps the lock.
fn record_owner(file: &mut impl Write, path: &Path) {
    if let Err(e) = writeln!(file, "{}", std::process::id()) {
        tracing::debug!(path = %path.display(), "failed to write pid to lock file: {e}");
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), "failed to remove lock file: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_first_is_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        let lock = WorkspaceLock::acquire(tmp.path()).expect("first lock");
        assert!(lock.path().exists());

        let err = WorkspaceLock::acquire(tmp.path()).expect_err("already locked");
        assert!(matches!(err, Error::Locked { .. }));

        drop(lock);
        assert!(WorkspaceLock::acquire(tmp.path()).is_ok());
    }

    #[test]
    fn lock_file_names_the_owning_process() {
        let tmp = tempfile::tempdir().unwrap();
        let lock = WorkspaceLock::acquire(tmp.path()).expect("lock");

        let contents = std::fs::read_to_string(lock.path()).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("no space left"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_pid_write_is_not_fatal() {
        record_owner(&mut FullDisk, Path::new(".decg/lock"));
    }
}
