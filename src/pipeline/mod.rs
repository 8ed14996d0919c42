// src/pipeline/mod.rs
use std::{
    fmt,
    ops::{Deref, DerefMut},
    path::Path,
};
use tracing::{debug, info, warn};

use crate::db::{DbError, Session};
use crate::error::{PipelineError, Result};
use crate::scripts::ScriptStore;

pub mod staging;

use self::staging::{load_staging, StagingTable};

/// Progress of one run. Every stage after `Start` is a commit boundary: once
/// reached, its work is durable even if a later stage fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Start,
    Step1Executed,
    Loaded,
    Step2Executed,
    Step3Executed,
    Step4Executed,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::Step1Executed => "step 1",
            Stage::Loaded => "staging load",
            Stage::Step2Executed => "step 2",
            Stage::Step3Executed => "step 3",
            Stage::Step4Executed => "step 4",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs script 1, the staging load, then scripts 2–4 over one session.
///
/// There is no all-or-nothing transaction across stages: a failure stops the
/// run where it is and leaves earlier commits in place. The next run starts
/// again from step 1.
pub struct Pipeline<T: ScriptStore> {
    scripts: T,
    table: StagingTable,
    reached: Stage,
}

impl<T: ScriptStore> Pipeline<T> {
    pub fn new(scripts: T, table: StagingTable) -> Self {
        Self {
            scripts,
            table,
            reached: Stage::Start,
        }
    }

    /// Last commit boundary reached by the most recent `run`.
    pub fn reached(&self) -> Stage {
        self.reached
    }

    /// Open a session with `connect`, push `staging_file` through every stage
    /// and close the session, whatever the outcome.
    #[tracing::instrument(level = "info", skip_all, fields(file = %staging_file.display()))]
    pub fn run<S, C>(&mut self, connect: C, staging_file: &Path) -> Result<Stage>
    where
        S: Session,
        C: FnOnce() -> std::result::Result<S, DbError>,
    {
        self.reached = Stage::Start;
        info!("connecting");
        let session = connect().map_err(|source| PipelineError::Database {
            stage: Stage::Start,
            source,
        })?;

        let mut session = Teardown(session);
        self.run_stages(&mut *session, staging_file)?;
        Ok(self.reached)
    }

    fn run_stages<S: Session>(&mut self, session: &mut S, staging_file: &Path) -> Result<()> {
        self.run_script(session, 1, Stage::Step1Executed)?;

        info!("loading staging file");
        load_staging(session, &self.table, staging_file).map_err(|source| {
            PipelineError::Database {
                stage: Stage::Loaded,
                source,
            }
        })?;
        self.mark(Stage::Loaded);

        self.run_script(session, 2, Stage::Step2Executed)?;
        self.run_script(session, 3, Stage::Step3Executed)?;
        self.run_script(session, 4, Stage::Step4Executed)?;
        self.mark(Stage::Done);
        Ok(())
    }

    fn run_script<S: Session>(&mut self, session: &mut S, step: u8, target: Stage) -> Result<()> {
        let sql = self.scripts.get(step)?;
        info!(step, "executing");
        let db_err = |source| PipelineError::Database {
            stage: target,
            source,
        };
        session.execute(&sql).map_err(db_err)?;
        session.commit().map_err(db_err)?;
        self.mark(target);
        Ok(())
    }

    fn mark(&mut self, stage: Stage) {
        debug!(stage = %stage, "committed");
        self.reached = stage;
    }
}

/// Owns the session for the length of a run. Dropping it discards anything
/// not yet committed and then closes the connection; failures there are
/// logged, never returned, so they cannot replace the error that ended the run.
struct Teardown<S: Session>(S);

impl<S: Session> Deref for Teardown<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.0
    }
}

impl<S: Session> DerefMut for Teardown<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.0
    }
}

impl<S: Session> Drop for Teardown<S> {
    fn drop(&mut self) {
        info!("closing connection");
        if let Err(e) = self.0.discard_uncommitted() {
            warn!(error = %e, "discarding uncommitted work failed");
        }
        if let Err(e) = self.0.close() {
            warn!(error = %e, "closing connection failed");
        }
    }
}
