pub mod batch;
pub mod cleanup;
pub mod config;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod scripts;
pub mod workspace;

pub use batch::{run_batch, RunSummary};
pub use error::{PipelineError, Result};
