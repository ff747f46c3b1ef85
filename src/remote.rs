//! Remote collaborators: the artifact store that outputs are downloaded from
//! and the command-line tool that overwrites truth files.
use crate::config::{remote_command_argv, OkifyConfig};
use crate::model::file_name;
use crate::util::first_line;
use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

const STDERR_DETAIL_BYTES: usize = 400;

pub trait ArtifactStore {
    /// Download `remote_path` into `dest_dir`, returning the staged file.
    fn download(&self, remote_path: &str, dest_dir: &Path) -> Result<PathBuf>;
}

pub trait RemoteCopier {
    /// Overwrite `destination` with the content of `source`.
    ///
    /// With `dry_run` the tool is told not to change anything remotely.
    fn copy(&self, source: &Path, destination: &str, dry_run: bool) -> Result<String>;
}

pub struct HttpArtifactStore {
    agent: ureq::Agent,
    artifact_url: String,
}

impl HttpArtifactStore {
    pub fn from_config(config: &OkifyConfig) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            artifact_url: config.artifact_url.clone(),
        }
    }

    fn artifact_location(&self, remote_path: &str) -> String {
        format!(
            "{}/{}",
            self.artifact_url.trim_end_matches('/'),
            remote_path.trim_start_matches('/')
        )
    }
}

impl ArtifactStore for HttpArtifactStore {
    fn download(&self, remote_path: &str, dest_dir: &Path) -> Result<PathBuf> {
        let url = self.artifact_location(remote_path);
        let start = Instant::now();
        let mut response = self
            .agent
            .get(&url)
            .call()
            .with_context(|| format!("download {url}"))?;

        let staged = dest_dir.join(file_name(remote_path));
        let mut file =
            File::create(&staged).with_context(|| format!("create {}", staged.display()))?;
        let bytes = io::copy(&mut response.body_mut().as_reader(), &mut file)
            .with_context(|| format!("write {}", staged.display()))?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            bytes,
            artifact = remote_path,
            "artifact download complete"
        );
        Ok(staged)
    }
}

/// Truth-file copy through an external CLI such as the JFrog CLI.
///
/// Invoked as `<program> <leading args> <copy args> [--dry-run] <source> <destination>`.
pub struct CliCopier {
    program: PathBuf,
    leading_args: Vec<String>,
    copy_args: Vec<String>,
}

impl CliCopier {
    /// Build the copier, failing when the configured program cannot be found.
    pub fn from_config(config: &OkifyConfig) -> Result<Self> {
        let mut argv = remote_command_argv(config)?;
        let leading_args = argv.split_off(1);
        let program = which::which(&argv[0])
            .with_context(|| format!("remote tool {:?} not found", argv[0]))?;
        Ok(Self {
            program,
            leading_args,
            copy_args: config.copy_args.clone(),
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command_args(&self, source: &Path, destination: &str, dry_run: bool) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.extend(self.copy_args.iter().cloned());
        if dry_run {
            args.push("--dry-run".to_string());
        }
        args.push(source.display().to_string());
        args.push(destination.to_string());
        args
    }
}

impl RemoteCopier for CliCopier {
    fn copy(&self, source: &Path, destination: &str, dry_run: bool) -> Result<String> {
        let args = self.command_args(source, destination, dry_run);
        let start = Instant::now();
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .with_context(|| format!("run {}", self.program.display()))?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            dry_run,
            destination,
            status = %output.status,
            "remote copy complete"
        );

        if !output.status.success() {
            let stderr = first_line(&output.stderr, STDERR_DETAIL_BYTES);
            let detail = if stderr.is_empty() {
                format!("status {}", output.status)
            } else {
                stderr
            };
            return Err(anyhow!(
                "{} failed: {detail}",
                self.program.display()
            ));
        }
        Ok(first_line(&output.stdout, STDERR_DETAIL_BYTES))
    }
}
