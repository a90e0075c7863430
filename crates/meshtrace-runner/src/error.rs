use meshtrace_common::NodeIdError;
use meshtrace_core::{ArenaError, ReconstructError};
use meshtrace_dem::DemError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the runner. All of them end the run.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("node list row {row}: invalid identifier {id:?}: {source}")]
    NodeId {
        row: usize,
        id: String,
        #[source]
        source: NodeIdError,
    },

    #[error("DEM error: {0}")]
    Dem(#[from] DemError),

    #[error(transparent)]
    Reconstruct(#[from] ReconstructError),

    #[error("scenario generation failed: {0}")]
    Synth(#[from] ArenaError),
}

impl RunnerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RunnerError::Io {
            path: path.into(),
            source,
        }
    }
}
