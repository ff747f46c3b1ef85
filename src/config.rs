//! Okify configuration.
//!
//! The service locations and the remote tool invocation are collected into a
//! single explicit struct that is handed to the fetcher, the artifact store, and
//! the copier. Values come from built-in defaults, then an optional JSON file
//! named by `OKIFY_CONFIG`, then individual environment overrides.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

pub const CONFIG_PATH_ENV: &str = "OKIFY_CONFIG";
pub const RESULTS_URL_ENV: &str = "OKIFY_RESULTS_URL";
pub const ARTIFACT_URL_ENV: &str = "OKIFY_ARTIFACT_URL";
pub const SDP_POOL_ROOT_ENV: &str = "OKIFY_SDP_POOL_ROOT";
pub const REMOTE_COMMAND_ENV: &str = "OKIFY_REMOTE_COMMAND";

const DEFAULT_SERVICE_URL: &str = "https://bytesalad.stsci.edu/artifactory";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OkifyConfig {
    pub schema_version: u32,
    /// Base URL of the results-reporting service.
    pub results_url: String,
    /// Base URL artifacts are downloaded from.
    pub artifact_url: String,
    /// Repository folder holding the shared pool used by `sdp_pool_copy`.
    pub sdp_pool_root: String,
    /// Remote tool program plus leading arguments, shell-quoted.
    pub remote_command: String,
    /// Arguments selecting the tool's copy operation.
    pub copy_args: Vec<String>,
}

impl Default for OkifyConfig {
    fn default() -> Self {
        default_config()
    }
}

pub fn default_config() -> OkifyConfig {
    OkifyConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        results_url: DEFAULT_SERVICE_URL.to_string(),
        artifact_url: DEFAULT_SERVICE_URL.to_string(),
        sdp_pool_root: "jwst-pipeline/dev/sdp_pool".to_string(),
        remote_command: "jfrog".to_string(),
        copy_args: vec![
            "rt".to_string(),
            "upload".to_string(),
            "--flat=true".to_string(),
        ],
    }
}

/// Resolve the effective config from the process environment.
pub fn load_config() -> Result<OkifyConfig> {
    load_config_with(|key| std::env::var(key).ok())
}

/// Resolve the effective config using `lookup` for environment values.
pub fn load_config_with<F>(lookup: F) -> Result<OkifyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match lookup(CONFIG_PATH_ENV).filter(|value| !value.trim().is_empty()) {
        Some(path) => read_config_file(Path::new(&path))?,
        None => default_config(),
    };
    apply_env_overrides(&mut config, &lookup);
    validate_config(&config)?;
    Ok(config)
}

pub fn read_config_file(path: &Path) -> Result<OkifyConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: OkifyConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    Ok(config)
}

fn apply_env_overrides<F>(config: &mut OkifyConfig, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    let overrides: [(&str, &mut String); 4] = [
        (RESULTS_URL_ENV, &mut config.results_url),
        (ARTIFACT_URL_ENV, &mut config.artifact_url),
        (SDP_POOL_ROOT_ENV, &mut config.sdp_pool_root),
        (REMOTE_COMMAND_ENV, &mut config.remote_command),
    ];
    for (key, field) in overrides {
        if let Some(value) = lookup(key).filter(|value| !value.trim().is_empty()) {
            *field = value.trim().to_string();
        }
    }
}

pub fn validate_config(config: &OkifyConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported okify config schema_version {}",
            config.schema_version
        ));
    }
    for (label, url) in [
        ("results_url", &config.results_url),
        ("artifact_url", &config.artifact_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow!("{label} must be an http(s) URL, got {url:?}"));
        }
    }
    if config.sdp_pool_root.trim().is_empty() {
        return Err(anyhow!("sdp_pool_root must not be empty"));
    }
    remote_command_argv(config)?;
    if config.copy_args.is_empty() {
        return Err(anyhow!("copy_args must not be empty"));
    }
    Ok(())
}

/// Split `remote_command` into program and leading arguments.
pub fn remote_command_argv(config: &OkifyConfig) -> Result<Vec<String>> {
    let argv = shell_words::split(&config.remote_command)
        .with_context(|| format!("parse remote command: {}", config.remote_command))?;
    if argv.is_empty() {
        return Err(anyhow!("remote command is empty"));
    }
    Ok(argv)
}
