//! Shared test infrastructure for integration tests.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use tempfile::TempDir;

/// Result of one okify_regtests invocation.
#[derive(Debug)]
pub struct RunOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<Output> for RunOutput {
    fn from(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Isolated workspace for driving the binary: a staging directory, a fake
/// remote copy tool, and the environment pointing at the test services.
pub struct OkifyFixture {
    pub temp_dir: TempDir,
    pub results_url: String,
    pub artifact_url: String,
    pub remote_command: String,
}

impl OkifyFixture {
    /// Fixture whose services live at `base_url`; the remote tool is
    /// replaced by [`OkifyFixture::install_fake_tool`] where needed.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
            results_url: base_url.to_string(),
            artifact_url: format!("{base_url}/artifactory"),
            remote_command: "sh -c true okify".to_string(),
        })
    }

    pub fn dlpath(&self) -> anyhow::Result<PathBuf> {
        let dir = self.temp_dir.path().join("downloads");
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn tool_log(&self) -> PathBuf {
        self.temp_dir.path().join("remote-tool.log")
    }

    /// Lines the fake remote tool recorded, one per invocation.
    pub fn tool_calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.tool_log())
            .map(|content| content.lines().map(String::from).collect())
            .unwrap_or_default()
    }

    /// Install a shell script standing in for the remote copy tool.
    ///
    /// It records its argv, fails for any destination containing `FAIL`, and
    /// takes two seconds for any destination containing `SLOW`.
    #[cfg(unix)]
    pub fn install_fake_tool(&mut self) -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let script = self.temp_dir.path().join("fake-remote-tool");
        let body = format!(
            "#!/bin/sh\n\
             echo \"$*\" >> '{log}'\n\
             for arg in \"$@\"; do last=\"$arg\"; done\n\
             case \"$last\" in\n\
             *FAIL*) echo \"permission denied for $last\" >&2; exit 1;;\n\
             *SLOW*) sleep 2;;\n\
             esac\n\
             echo \"uploaded $last\"\n",
            log = self.tool_log().display()
        );
        std::fs::write(&script, body)?;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;
        self.remote_command = script.display().to_string();
        Ok(())
    }

    /// Run okify_regtests with `args`, feeding `keys` on stdin.
    pub fn run(&self, args: &[&str], keys: &str) -> anyhow::Result<RunOutput> {
        Ok(self.spawn(args, keys)?.wait_with_output()?.into())
    }

    /// Start okify_regtests without waiting for it.
    pub fn spawn(&self, args: &[&str], keys: &str) -> anyhow::Result<Child> {
        let mut child = Command::new(bin())
            .args(args)
            .env("OKIFY_RESULTS_URL", &self.results_url)
            .env("OKIFY_ARTIFACT_URL", &self.artifact_url)
            .env("OKIFY_REMOTE_COMMAND", &self.remote_command)
            .env_remove("OKIFY_CONFIG")
            .env_remove("OKIFY_SDP_POOL_ROOT")
            .env_remove("RUST_LOG")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            // The binary may exit before reading its keys (usage errors).
            if let Err(err) = stdin.write_all(keys.as_bytes()) {
                if err.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(err.into());
                }
            }
        }
        Ok(child)
    }
}

pub fn bin() -> &'static Path {
    Path::new(env!("CARGO_BIN_EXE_okify_regtests"))
}

/// One failure record as the results service reports it.
pub fn failure(test: &str, output: &str, truth: &str, op: &str) -> serde_json::Value {
    serde_json::json!({
        "test_name": test,
        "output": output,
        "remote_results_path": format!("jwst-pipeline-results/run-586/{test}"),
        "truth_remote": truth,
        "okify_op": op,
        "traceback": format!("AssertionError: {output} differs from truth"),
    })
}

pub fn manifest(failures: Vec<serde_json::Value>) -> String {
    serde_json::json!({
        "run_number": 586,
        "status": "completed",
        "failures": failures,
    })
    .to_string()
}
