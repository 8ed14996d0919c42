//! In-memory session and script store used by the pipeline tests.

use std::{cell::RefCell, collections::BTreeMap, io, path::Path, path::PathBuf, rc::Rc};

use super::{DbError, Session};
use crate::error::{PipelineError, Result};
use crate::scripts::ScriptStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Execute(String),
    Load { sql: String, path: PathBuf },
    Commit,
    Discard,
    Close,
}

impl Call {
    pub fn sql(&self) -> Option<&str> {
        match self {
            Call::Execute(sql) | Call::Load { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    commit_attempts: usize,
    commits: usize,
}

/// Records every call. Clones share one log, so a test can keep a handle
/// while the pipeline owns another.
#[derive(Clone, Default)]
pub struct RecordingSession {
    state: Rc<RefCell<State>>,
    fail_sql: Option<String>,
    fail_commit: Option<usize>,
    fail_teardown: bool,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any statement whose text contains `needle`.
    pub fn failing_on_sql(mut self, needle: &str) -> Self {
        self.fail_sql = Some(needle.to_string());
        self
    }

    /// Fail the `n`th commit (1-based).
    pub fn failing_on_commit(mut self, n: usize) -> Self {
        self.fail_commit = Some(n);
        self
    }

    pub fn failing_teardown(mut self) -> Self {
        self.fail_teardown = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Successful commits only.
    pub fn commits(&self) -> usize {
        self.state.borrow().commits
    }

    pub fn executed(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.sql().map(str::to_string))
            .collect()
    }

    fn record(&mut self, call: Call) -> Result<(), DbError> {
        let fails = match (&call, &self.fail_sql) {
            (Call::Execute(sql), Some(needle)) | (Call::Load { sql, .. }, Some(needle)) => {
                sql.contains(needle.as_str())
            }
            _ => false,
        };
        self.state.borrow_mut().calls.push(call);
        if fails {
            return Err(DbError::Session("statement rejected".into()));
        }
        Ok(())
    }
}

impl Session for RecordingSession {
    fn execute(&mut self, sql: &str) -> Result<(), DbError> {
        self.record(Call::Execute(sql.to_string()))
    }

    fn load_local_file(&mut self, sql: &str, path: &Path) -> Result<(), DbError> {
        self.record(Call::Load {
            sql: sql.to_string(),
            path: path.to_path_buf(),
        })
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.record(Call::Commit)?;
        let mut state = self.state.borrow_mut();
        state.commit_attempts += 1;
        if self.fail_commit == Some(state.commit_attempts) {
            return Err(DbError::Session("commit failed".into()));
        }
        state.commits += 1;
        Ok(())
    }

    fn discard_uncommitted(&mut self) -> Result<(), DbError> {
        self.record(Call::Discard)?;
        if self.fail_teardown {
            return Err(DbError::Session("rollback failed".into()));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), DbError> {
        self.record(Call::Close)?;
        if self.fail_teardown {
            return Err(DbError::Session("close failed".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapScripts {
    scripts: BTreeMap<u8, String>,
}

impl MapScripts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, step: u8, sql: &str) -> Self {
        self.scripts.insert(step, sql.to_string());
        self
    }
}

impl ScriptStore for MapScripts {
    fn get(&self, step: u8) -> Result<String> {
        self.scripts
            .get(&step)
            .cloned()
            .ok_or_else(|| PipelineError::MissingScript {
                step,
                path: PathBuf::from(format!("paso{step}.sql")),
                source: io::Error::new(io::ErrorKind::NotFound, "not in map"),
            })
    }
}
