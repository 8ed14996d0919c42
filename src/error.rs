use std::{io, path::PathBuf};

use thiserror::Error;

use crate::db::DbError;
use crate::pipeline::Stage;

/// Everything that can stop a batch. Cleanup problems are not here: they are
/// reported through [`crate::cleanup::CleanupReport`] and never fail a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A source value could not be read as a `dd-mm-yyyy` date, or the sheet
    /// is too narrow to have a date column at all.
    #[error("{path}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("transformation script for step {step} unavailable at {path}")]
    MissingScript {
        step: u8,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `stage` is the transition that was being attempted when the driver failed.
    #[error("database error while reaching {stage}")]
    Database {
        stage: Stage,
        #[source]
        source: DbError,
    },

    #[error("reading spreadsheet {path}")]
    Sheet {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        PipelineError::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
