use std::path::{Path, PathBuf};

use super::{WorkspaceError, WorkspaceResult};

/// Files kept under the settings directory.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join("tablefill.toml")
    }

    /// Extracted schema, written by `--analyse`.
    pub fn schema_path(&self) -> PathBuf {
        self.root.join("schema.json")
    }

    /// Hand-edited override document.
    pub fn custom_schema_path(&self) -> PathBuf {
        self.root.join("custom_schema.jsonc")
    }

    pub fn ensure_dirs(&self) -> WorkspaceResult<()> {
        create_if_missing(&self.root)
    }
}

fn create_if_missing(path: &Path) -> WorkspaceResult<()> {
    if path.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(path).map_err(WorkspaceError::from)
}
