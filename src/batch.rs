// src/batch.rs
use tracing::info;

use crate::cleanup::{self, CleanupReport};
use crate::config::Profile;
use crate::db::{DbError, Session};
use crate::error::Result;
use crate::pipeline::{staging::StagingTable, Pipeline, Stage};
use crate::process::normalize::normalize_file;
use crate::scripts::ScriptStore;
use crate::workspace::Workspace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub rows: usize,
    pub stage: Stage,
    /// `None` when reconciliation was skipped on request.
    pub cleanup: Option<CleanupReport>,
}

/// One batch end to end: spreadsheet → staging file → database → clean
/// workspace.
///
/// The database is only contacted once the staging file exists, and the
/// workspace is only cleaned after every stage committed; after a failure
/// the input and staging files stay in place for inspection.
pub fn run_batch<T, S, C>(
    workspace: &Workspace,
    profile: &Profile,
    scripts: T,
    connect: C,
    keep_files: bool,
) -> Result<RunSummary>
where
    T: ScriptStore,
    S: Session,
    C: FnOnce() -> std::result::Result<S, DbError>,
{
    let input = workspace.input_path(profile);
    let staging_file = workspace.staging_path(profile);

    info!(input = %input.display(), "normalizing spreadsheet");
    let normalized = normalize_file(&input, &staging_file)?;

    let table = StagingTable::new(
        profile.staging_schema.as_deref(),
        &profile.staging_table,
        &profile.currency,
    );
    let mut pipeline = Pipeline::new(scripts, table);
    let stage = pipeline.run(connect, &staging_file)?;
    info!(profile = %profile.name, rows = normalized.rows, "batch committed");

    let cleanup = if keep_files {
        info!("keeping workspace files");
        None
    } else {
        Some(cleanup::reconcile(&workspace.files_dir(), &profile.marker_file)?)
    };

    Ok(RunSummary {
        rows: normalized.rows,
        stage,
        cleanup,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::recording::{Call, MapScripts, RecordingSession};
    use crate::error::PipelineError;
    use crate::scripts::DirScriptStore;
    use anyhow::Result;
    use std::{cell::Cell, fs, path::Path};
    use tempfile::{tempdir, TempDir};

    const HEADER: &str = "c0;c1;c2;c3;c4;c5;c6;c7;c8;c9;c10;c11;c12;c13;c14;c15";

    fn profile() -> Profile {
        Profile {
            input_file: "rj_allegro_pl_export.csv".into(),
            ..Profile::default()
        }
    }

    fn workspace(dates: &[&str]) -> Result<(TempDir, Workspace)> {
        let tmp = tempdir()?;
        let ws = Workspace::new(tmp.path());
        fs::create_dir_all(ws.steps_dir())?;
        fs::create_dir_all(ws.files_dir())?;
        fs::write(ws.files_dir().join(".gitkeep"), "")?;

        let mut text = format!("{HEADER}\n");
        for (i, d) in dates.iter().enumerate() {
            text.push_str(&format!(
                "Kampania {i};AG;10.5;1;100;5;0;0.2;5;1;2;1;20;{d};x;y\n"
            ));
        }
        fs::write(ws.input_path(&profile()), text)?;
        Ok((tmp, ws))
    }

    fn write_steps(dir: &Path, steps: &[u8]) -> Result<()> {
        for step in steps {
            fs::write(
                dir.join(profile().script_file_name(*step)),
                format!("CALL merge_step_{step}();"),
            )?;
        }
        Ok(())
    }

    fn file_names(dir: &Path) -> Result<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(dir)?
            .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<std::io::Result<_>>()?;
        names.sort();
        Ok(names)
    }

    #[test]
    fn test_successful_batch_cleans_workspace() -> Result<()> {
        let (_tmp, ws) = workspace(&["01-06-2024", "31-12-2023"])?;
        write_steps(&ws.steps_dir(), &[1, 2, 3, 4])?;
        let session = RecordingSession::new();
        let handle = session.clone();

        let summary = run_batch(
            &ws,
            &profile(),
            DirScriptStore::new(ws.steps_dir(), &profile()),
            move || Ok(session),
            false,
        )?;

        assert_eq!(summary.rows, 2);
        assert_eq!(summary.stage, Stage::Done);
        let cleanup = summary.cleanup.unwrap();
        assert_eq!(cleanup.removed, 2);
        assert_eq!(cleanup.kept, 1);
        assert_eq!(file_names(&ws.files_dir())?, vec![".gitkeep"]);

        assert_eq!(handle.commits(), 5);
        assert!(handle
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Load { path, .. } if *path == ws.staging_path(&profile()))));
        Ok(())
    }

    #[test]
    fn test_keep_files_skips_cleanup() -> Result<()> {
        let (_tmp, ws) = workspace(&["01-06-2024"])?;
        let scripts = MapScripts::new()
            .with(1, "s1")
            .with(2, "s2")
            .with(3, "s3")
            .with(4, "s4");

        let summary = run_batch(&ws, &profile(), scripts, || Ok(RecordingSession::new()), true)?;
        assert!(summary.cleanup.is_none());
        assert_eq!(
            file_names(&ws.files_dir())?,
            vec![".gitkeep", "rj_allegro_pl.csv", "rj_allegro_pl_export.csv"]
        );
        Ok(())
    }

    #[test]
    fn test_bad_date_never_connects() -> Result<()> {
        let (_tmp, ws) = workspace(&["01-06-2024", "2024/06/02"])?;
        write_steps(&ws.steps_dir(), &[1, 2, 3, 4])?;
        let connected = Cell::new(false);

        let err = run_batch(
            &ws,
            &profile(),
            DirScriptStore::new(ws.steps_dir(), &profile()),
            || {
                connected.set(true);
                Ok(RecordingSession::new())
            },
            false,
        )
        .unwrap_err();

        assert!(matches!(err, PipelineError::Format { .. }));
        assert!(!connected.get());
        assert_eq!(
            file_names(&ws.files_dir())?,
            vec![".gitkeep", "rj_allegro_pl_export.csv"]
        );
        Ok(())
    }

    #[test]
    fn test_missing_step_three_skips_cleanup() -> Result<()> {
        let (_tmp, ws) = workspace(&["01-06-2024", "31-12-2023"])?;
        write_steps(&ws.steps_dir(), &[1, 2, 4])?;
        let session = RecordingSession::new();
        let handle = session.clone();

        let err = run_batch(
            &ws,
            &profile(),
            DirScriptStore::new(ws.steps_dir(), &profile()),
            move || Ok(session),
            false,
        )
        .unwrap_err();

        assert!(matches!(err, PipelineError::MissingScript { step: 3, .. }));
        // step 1, the staging load and step 2 stay committed
        assert_eq!(handle.commits(), 3);
        assert_eq!(handle.calls().last(), Some(&Call::Close));
        // failed-run artifacts are left for diagnosis
        assert_eq!(
            file_names(&ws.files_dir())?,
            vec![".gitkeep", "rj_allegro_pl.csv", "rj_allegro_pl_export.csv"]
        );
        Ok(())
    }
}
