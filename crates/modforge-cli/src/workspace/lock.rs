use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};

use tracing::info;

use super::{WorkspacePaths, WorkspaceResult};

/// Exclusive advisory lock on `.modforge/workspace.lock`.
///
/// Held for a whole job so that separate `modforge` processes working on
/// the same project run one after another. The operating system drops the
/// lock when the holder exits, so a crashed process never leaves it behind.
#[derive(Debug)]
pub struct WorkspaceLock {
    file: File,
    path: PathBuf,
}

impl WorkspaceLock {
    /// Block until the lock is free.
    pub fn acquire(paths: &WorkspacePaths) -> WorkspaceResult<Self> {
        let path = paths.lock_path();
        let file = open(&path)?;
        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                info!(event = "workspace_lock_waiting", path = %path.display());
                file.lock()?;
            }
            Err(TryLockError::Error(err)) => return Err(err.into()),
        }
        Ok(Self { file, path })
    }

    /// Take the lock if no one holds it.
    pub fn try_acquire(paths: &WorkspacePaths) -> WorkspaceResult<Option<Self>> {
        let path = paths.lock_path();
        let file = open(&path)?;
        match file.try_lock() {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(TryLockError::WouldBlock) => Ok(None),
            Err(TryLockError::Error(err)) => Err(err.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn open(path: &Path) -> WorkspaceResult<File> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_holder_waits_for_release() {
        let root = std::env::temp_dir().join(format!("modforge_lock_{}", uuid::Uuid::new_v4()));
        let paths = WorkspacePaths::new(root);
        paths.ensure_dirs().expect("dirs");

        let held = WorkspaceLock::acquire(&paths).expect("first lock");
        assert!(held.path().ends_with("workspace.lock"));
        assert!(WorkspaceLock::try_acquire(&paths).expect("try").is_none());

        drop(held);
        assert!(WorkspaceLock::try_acquire(&paths).expect("try").is_some());
    }
}
