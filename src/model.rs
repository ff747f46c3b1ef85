//! Core records shared by the fetch, plan, prompt, and execute stages.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Observatory whose regression runs and truth files are being reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Observatory {
    Jwst,
    Roman,
}

impl Observatory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Observatory::Jwst => "jwst",
            Observatory::Roman => "roman",
        }
    }

    /// Repository path where run results are stored.
    pub fn runs_directory(&self) -> &'static str {
        match self {
            Observatory::Jwst => "jwst-pipeline-results/",
            Observatory::Roman => "roman-pipeline-results/regression-tests/runs/",
        }
    }

    /// Repository holding the truth files that okify overwrites.
    pub fn truth_repository(&self) -> &'static str {
        match self {
            Observatory::Jwst => "jwst-pipeline",
            Observatory::Roman => "roman-pipeline",
        }
    }

    /// Roman runs do not record a meaningful okify op; everything is a plain copy.
    pub fn records_okify_op(&self) -> bool {
        matches!(self, Observatory::Jwst)
    }
}

impl fmt::Display for Observatory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies the regression run that every other record derives from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReference {
    pub observatory: Observatory,
    pub run_number: u64,
}

impl fmt::Display for RunReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} run {}", self.observatory, self.run_number)
    }
}

/// How a truth file gets replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OkifyOp {
    /// Overwrite the truth file with the per-test output.
    Default,
    /// Overwrite the truth file with the same-named file from the shared pool.
    SdpPoolCopy,
}

impl OkifyOp {
    pub const ALL: [OkifyOp; 2] = [OkifyOp::Default, OkifyOp::SdpPoolCopy];

    pub fn as_str(&self) -> &'static str {
        match self {
            OkifyOp::Default => "file_copy",
            OkifyOp::SdpPoolCopy => "sdp_pool_copy",
        }
    }

    /// Menu key used when the operator must pick an op explicitly.
    pub fn key(&self) -> char {
        match self {
            OkifyOp::Default => 'f',
            OkifyOp::SdpPoolCopy => 'p',
        }
    }

    /// Parse the op name recorded by a regression run.
    pub fn parse(raw: &str) -> Option<OkifyOp> {
        match raw.trim() {
            "file_copy" | "default" => Some(OkifyOp::Default),
            "sdp_pool_copy" => Some(OkifyOp::SdpPoolCopy),
            _ => None,
        }
    }
}

impl fmt::Display for OkifyOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failing-test record as reported by the results service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub test_identifier: String,
    /// Remote location of the new output produced by the failing run.
    pub local_artifact_path: String,
    pub remote_truth_path: String,
    pub okify_op: OkifyOp,
    pub traceback: Option<String>,
}

/// Last path segment of a slash-separated repository path.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
