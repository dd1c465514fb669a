use std::path::{Path, PathBuf};

use super::{WorkspaceError, WorkspaceResult};

pub const SETTINGS_FILE: &str = "modforge.toml";
pub const STATE_DIR: &str = ".modforge";

/// Locations modforge reads and writes inside a project.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub jobs_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: PathBuf) -> Self {
        let state_dir = root.join(STATE_DIR);
        let jobs_dir = state_dir.join("jobs");
        let logs_dir = state_dir.join("logs");
        Self {
            root,
            state_dir,
            jobs_dir,
            logs_dir,
        }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.logs_dir.join("modforge.ndjson")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("workspace.lock")
    }

    pub fn job_path(&self, id: &str) -> PathBuf {
        self.jobs_dir.join(format!("{id}.json"))
    }

    pub fn ensure_dirs(&self) -> WorkspaceResult<()> {
        create_if_missing(&self.root)?;
        create_if_missing(&self.state_dir)?;
        create_if_missing(&self.jobs_dir)?;
        create_if_missing(&self.logs_dir)?;
        Ok(())
    }
}

fn create_if_missing(path: &Path) -> WorkspaceResult<()> {
    if path.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(path).map_err(WorkspaceError::from)
}
