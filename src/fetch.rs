//! Manifest retrieval from the results-reporting service.
//!
//! One blocking round trip per invocation. Nothing is retried here and no
//! timeout is imposed beyond what the transport does; the operator re-runs the
//! tool on transient failures.
use crate::config::OkifyConfig;
use crate::error::FetchError;
use crate::model::{file_name, ManifestEntry, OkifyOp, RunReference};
use serde::Deserialize;
use std::time::Instant;

/// Source of failing-test manifests for a regression run.
pub trait ManifestSource {
    fn fetch_manifest(&self, run: &RunReference) -> Result<Vec<ManifestEntry>, FetchError>;
}

const COMPLETED_STATUS: &str = "completed";
const DEFAULT_TEST_NAME: &str = "test_name";

#[derive(Debug, Deserialize)]
struct RunFailures {
    status: String,
    #[serde(default)]
    failures: Vec<FailureRecord>,
}

#[derive(Debug, Deserialize)]
struct FailureRecord {
    #[serde(default)]
    test_name: Option<String>,
    output: String,
    remote_results_path: String,
    truth_remote: String,
    #[serde(default)]
    okify_op: Option<String>,
    #[serde(default)]
    traceback: Option<String>,
}

/// Results service reached over HTTP.
pub struct HttpManifestSource {
    agent: ureq::Agent,
    results_url: String,
}

impl HttpManifestSource {
    pub fn new(results_url: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            results_url: results_url.into(),
        }
    }

    pub fn from_config(config: &OkifyConfig) -> Self {
        Self::new(config.results_url.clone())
    }

    pub fn manifest_url(&self, run: &RunReference) -> String {
        format!(
            "{}/api/regtests/{}/runs/{}/failures",
            self.results_url.trim_end_matches('/'),
            run.observatory,
            run.run_number
        )
    }
}

impl ManifestSource for HttpManifestSource {
    fn fetch_manifest(&self, run: &RunReference) -> Result<Vec<ManifestEntry>, FetchError> {
        let url = self.manifest_url(run);
        let start = Instant::now();
        let mut response = match self
            .agent
            .get(&url)
            .header("Accept", "application/json")
            .call()
        {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(404)) => {
                return Err(FetchError::RunNotFound {
                    run: *run,
                    detail: format!("{url} returned 404"),
                })
            }
            Err(ureq::Error::StatusCode(code)) => {
                return Err(FetchError::RemoteUnavailable(format!(
                    "{url} returned {code}"
                )))
            }
            Err(err) => return Err(FetchError::RemoteUnavailable(format!("{url}: {err}"))),
        };
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|err| FetchError::RemoteUnavailable(format!("read {url}: {err}")))?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            response_bytes = body.len(),
            run_number = run.run_number,
            "manifest fetch complete"
        );

        decode_manifest(run, &body)
    }
}

/// Decode a results-service response into manifest entries.
pub fn decode_manifest(run: &RunReference, body: &str) -> Result<Vec<ManifestEntry>, FetchError> {
    let parsed: RunFailures =
        serde_json::from_str(body).map_err(|err| FetchError::InvalidManifest {
            run: *run,
            detail: err.to_string(),
        })?;
    if parsed.status != COMPLETED_STATUS {
        return Err(FetchError::RunNotFound {
            run: *run,
            detail: format!("run status is {:?}", parsed.status),
        });
    }

    parsed
        .failures
        .into_iter()
        .map(|record| entry_from_record(run, record))
        .collect()
}

fn entry_from_record(run: &RunReference, record: FailureRecord) -> Result<ManifestEntry, FetchError> {
    let okify_op = if run.observatory.records_okify_op() {
        match record.okify_op.as_deref() {
            None => OkifyOp::Default,
            Some(raw) => OkifyOp::parse(raw).ok_or_else(|| FetchError::InvalidManifest {
                run: *run,
                detail: format!("unsupported okify_op {raw:?} for {}", record.truth_remote),
            })?,
        }
    } else {
        OkifyOp::Default
    };

    let truth_prefix = format!("{}/", run.observatory.truth_repository());
    if !record.truth_remote.starts_with(&truth_prefix) {
        tracing::warn!(
            truth = %record.truth_remote,
            repository = run.observatory.truth_repository(),
            "truth file outside the observatory truth repository"
        );
    }

    if !record
        .remote_results_path
        .starts_with(run.observatory.runs_directory())
    {
        tracing::debug!(
            results = %record.remote_results_path,
            runs_directory = run.observatory.runs_directory(),
            "results path outside the runs directory"
        );
    }

    let local_artifact_path = format!(
        "{}/{}",
        record.remote_results_path.trim_end_matches('/'),
        file_name(&record.output)
    );
    let test_identifier = record
        .test_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TEST_NAME.to_string());

    Ok(ManifestEntry {
        test_identifier,
        local_artifact_path,
        remote_truth_path: record.truth_remote,
        okify_op,
        traceback: record.traceback,
    })
}
