//! Session persistence.
//!
//! The CLI runs one step per invocation, so the workflow state is carried
//! between invocations in a JSON file. The loading/error signal is not
//! saved.
//!
//! Two invocations may overlap, e.g. a slow summary in one terminal while
//! notes are edited in another. Each one saves with [`SessionFile::update`],
//! which rebases its changes onto whatever the file holds by then.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::storage::{write_atomic, FileLock};
use crate::workflow::WorkflowState;

/// Saved workflow state on disk.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved state. A missing file is an empty session.
    pub fn load(&self) -> anyhow::Result<WorkflowState> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(WorkflowState::default())
            }
            Err(e) => return Err(e.into()),
        };

        let state = serde_json::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Session file {} is corrupt: {e}", self.path.display())
        })?;
        Ok(state)
    }

    /// Save `state`, which was loaded as `base`.
    ///
    /// Under the session lock, the file is reloaded and only the changes
    /// made since `base` are applied to it. Returns what was written.
    pub fn update(&self, base: &WorkflowState, state: &WorkflowState) -> anyhow::Result<WorkflowState> {
        let _lock = FileLock::exclusive(&self.path)?;
        let latest = self.load()?;
        let merged = if latest == *base { state.clone() } else { state.rebase(base, &latest) };

        write_atomic(&self.path, serde_json::to_string_pretty(&merged)?.as_bytes())?;
        tracing::debug!(path = %self.path.display(), rebased = latest != *base, "Session saved");
        Ok(merged)
    }

    /// Forget the saved session.
    pub fn reset(&self) -> anyhow::Result<()> {
        let _lock = FileLock::exclusive(&self.path)?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
