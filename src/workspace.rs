// src/workspace.rs
use std::path::{Path, PathBuf};

use crate::config::Profile;

pub const STEPS_DIR: &str = "Pasos";
pub const FILES_DIR: &str = "Archivos";

/// First of `start` and its ancestors that holds both a `Pasos` and an
/// `Archivos` directory. Falls back to `start` itself.
pub fn find_base(start: &Path) -> PathBuf {
    start
        .ancestors()
        .find(|base| base.join(STEPS_DIR).is_dir() && base.join(FILES_DIR).is_dir())
        .unwrap_or(start)
        .to_path_buf()
}

/// Paths of one batch inside a workspace base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    base: PathBuf,
}

impl Workspace {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn steps_dir(&self) -> PathBuf {
        self.base.join(STEPS_DIR)
    }

    pub fn files_dir(&self) -> PathBuf {
        self.base.join(FILES_DIR)
    }

    pub fn input_path(&self, profile: &Profile) -> PathBuf {
        self.files_dir().join(&profile.input_file)
    }

    pub fn staging_path(&self, profile: &Profile) -> PathBuf {
        self.files_dir().join(&profile.staging_file)
    }
}
