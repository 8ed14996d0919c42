// src/scripts.rs
use std::{fs, io, path::PathBuf};
use tracing::debug;

use crate::config::Profile;
use crate::error::{PipelineError, Result};

/// Logical transformation steps, in execution order.
pub const STEPS: [u8; 4] = [1, 2, 3, 4];

/// Source of the opaque transformation statements.
pub trait ScriptStore {
    fn get(&self, step: u8) -> Result<String>;
}

/// Scripts read from `<dir>/paso{n}_{profile}.sql` at the moment they are
/// needed, so a missing late step does not stop the earlier ones.
#[derive(Debug, Clone)]
pub struct DirScriptStore {
    dir: PathBuf,
    profile: Profile,
}

impl DirScriptStore {
    pub fn new(dir: impl Into<PathBuf>, profile: &Profile) -> Self {
        Self {
            dir: dir.into(),
            profile: profile.clone(),
        }
    }

    pub fn path_for(&self, step: u8) -> PathBuf {
        self.dir.join(self.profile.script_file_name(step))
    }
}

impl ScriptStore for DirScriptStore {
    fn get(&self, step: u8) -> Result<String> {
        let path = self.path_for(step);
        if !STEPS.contains(&step) {
            return Err(PipelineError::MissingScript {
                step,
                path,
                source: io::Error::new(io::ErrorKind::InvalidInput, "steps run from 1 to 4"),
            });
        }
        let sql = fs::read_to_string(&path).map_err(|source| PipelineError::MissingScript {
            step,
            path: path.clone(),
            source,
        })?;
        debug!(step, path = %path.display(), bytes = sql.len(), "loaded script");
        Ok(sql)
    }
}
