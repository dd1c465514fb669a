//! Staged multi-file writes.
//!
//! A [`ChangeSet`] collects every file a generation run wants to write. Reads
//! go through the staged contents first so later steps see earlier ones.
//! Nothing touches disk until [`ChangeSet::commit`], which writes temp files,
//! swaps them in with renames and puts the previous files back if a rename
//! fails.

use std::collections::BTreeMap;
use std::fs::{OpenOptions, create_dir_all};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{GenerateError, Result};
use crate::registry::{RegistryEntry, insert_entry};

#[derive(Debug)]
pub struct ChangeSet {
    root: PathBuf,
    staged: BTreeMap<PathBuf, String>,
}

impl ChangeSet {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            staged: BTreeMap::new(),
        }
    }

    /// Stage `contents` for `relative`, replacing an earlier staged version.
    pub fn stage(&mut self, relative: impl Into<PathBuf>, contents: String) {
        self.staged.insert(relative.into(), contents);
    }

    /// Staged contents, else what is on disk, else `None`.
    pub fn read(&self, relative: &Path) -> Result<Option<String>> {
        if let Some(contents) = self.staged.get(relative) {
            return Ok(Some(contents.clone()));
        }
        match std::fs::read_to_string(self.root.join(relative)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Stage a registry insertion. A missing registry starts from `scaffold`.
    ///
    /// Returns whether the entry was new.
    pub fn stage_registry(
        &mut self,
        relative: &Path,
        scaffold: &str,
        entry: &RegistryEntry,
    ) -> Result<bool> {
        let current = self
            .read(relative)?
            .unwrap_or_else(|| scaffold.to_string());
        match insert_entry(&self.root.join(relative), &current, entry)? {
            Some(updated) => {
                self.stage(relative, updated);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn is_staged(&self, relative: &Path) -> bool {
        self.staged.contains_key(relative)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.staged.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Write every staged file whose contents differ from disk.
    ///
    /// Returns the relative paths that changed.
    pub fn commit(self) -> Result<Vec<PathBuf>> {
        let mut pending = Vec::new();
        for (relative, contents) in self.staged {
            let path = self.root.join(&relative);
            match std::fs::read_to_string(&path) {
                Ok(existing) if existing == contents => continue,
                _ => pending.push((relative, path, contents)),
            }
        }

        let token = uuid::Uuid::new_v4().simple().to_string();
        let mut prepared: Vec<PreparedWrite> = Vec::with_capacity(pending.len());
        for (relative, path, contents) in pending {
            match prepare(&path, &contents, &token) {
                Ok(temp) => prepared.push(PreparedWrite {
                    relative,
                    path,
                    temp,
                    backup: None,
                }),
                Err(source) => {
                    discard(&prepared);
                    return Err(GenerateError::Commit { path, source });
                }
            }
        }

        for idx in 0..prepared.len() {
            if let Err(source) = swap_in(&mut prepared[idx], &token) {
                let path = prepared[idx].path.clone();
                restore(&prepared[..idx]);
                discard(&prepared[idx..]);
                return Err(GenerateError::Commit { path, source });
            }
        }

        let mut written = Vec::with_capacity(prepared.len());
        for write in prepared {
            if let Some(backup) = &write.backup
                && let Err(err) = std::fs::remove_file(backup)
            {
                warn!(path = %backup.display(), error = %err, "backup cleanup failed");
            }
            if let Some(parent) = write.path.parent() {
                sync_dir(parent)?;
            }
            debug!(path = %write.relative.display(), "file committed");
            written.push(write.relative);
        }
        Ok(written)
    }
}

#[derive(Debug)]
struct PreparedWrite {
    relative: PathBuf,
    path: PathBuf,
    temp: PathBuf,
    backup: Option<PathBuf>,
}

fn prepare(path: &Path, contents: &str, token: &str) -> io::Result<PathBuf> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent)?;
    }

    let temp = sibling(path, "tmp", token)?;
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&temp)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    Ok(temp)
}

fn swap_in(write: &mut PreparedWrite, token: &str) -> io::Result<()> {
    if write.path.exists() {
        let backup = sibling(&write.path, "bak", token)?;
        std::fs::rename(&write.path, &backup)?;
        write.backup = Some(backup);
    }
    std::fs::rename(&write.temp, &write.path)
}

fn restore(done: &[PreparedWrite]) {
    for write in done.iter().rev() {
        let result = match &write.backup {
            Some(backup) => std::fs::rename(backup, &write.path),
            None => std::fs::remove_file(&write.path),
        };
        if let Err(err) = result {
            warn!(path = %write.path.display(), error = %err, "restore failed");
        }
    }
}

fn discard(writes: &[PreparedWrite]) {
    for write in writes {
        if let Some(backup) = &write.backup
            && !write.path.exists()
        {
            let _ = std::fs::rename(backup, &write.path);
        }
        let _ = std::fs::remove_file(&write.temp);
    }
}

fn sibling(path: &Path, suffix: &str, token: &str) -> io::Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "invalid path for staged write")
    })?;
    Ok(path.with_file_name(format!(
        ".{}.modforge-{suffix}-{token}",
        file_name.to_string_lossy()
    )))
}

fn sync_dir(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    let dir = OpenOptions::new().read(true).open(path)?;
    dir.sync_all()?;
    Ok(())
}
