//! Harness errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: invalid fixture json: {source}")]
    FixtureJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("bad argument {spec:?}: {reason}")]
    BadArg { spec: String, reason: String },
    #[error("case {case}: {reason}")]
    BadCase { case: String, reason: String },
    #[error("no fixture files found in {0}")]
    NoFixtures(PathBuf),
    #[error("element size must be non-zero")]
    ZeroElementSize,
    #[error("report json: {0}")]
    ReportJson(#[source] serde_json::Error),
    #[error(transparent)]
    Config(#[from] rtmem_core::ConfigError),
}

impl HarnessError {
    pub(crate) fn bad_arg(spec: &str, reason: impl Into<String>) -> Self {
        Self::BadArg {
            spec: spec.to_owned(),
            reason: reason.into(),
        }
    }
}
