use crate::model::RunReference;
use thiserror::Error;

/// Failure classes for retrieving a run manifest.
///
/// All of them are fatal for the invocation: without a manifest there is no
/// plan to build.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("results service unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("no completed regression run found for {run}: {detail}")]
    RunNotFound { run: RunReference, detail: String },

    #[error("invalid manifest for {run}: {detail}")]
    InvalidManifest { run: RunReference, detail: String },
}
