//! Build smoke test: create a throwaway project, give it two registry
//! dependencies and build it with the configured toolchain.
//!
//! Each build tool invocation is bounded by the build timeout. Stderr goes to
//! an anonymous temp file rather than a pipe so a chatty build cannot block on
//! a full pipe while we wait on it.

use std::fmt;
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use wait_timeout::ChildExt;

use crate::config::HarnessConfig;
use crate::error::{excerpt, ProbeError};

/// Dependencies added to the generated manifest.
pub const SMOKE_DEPENDENCIES: [(&str, &str); 2] = [("rand", "0.8"), ("serde", "1.0")];

/// Characters of build tool stderr kept on failure.
const STDERR_LIMIT: usize = 500;

/// How a smoke test ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmokeOutcome {
    Passed,
    /// The build tool exited non-zero (`code` is `None` when killed by a signal).
    Failed { code: Option<i32>, stderr: String },
    /// The build tool ran past the deadline and was killed.
    TimedOut(Duration),
    /// The test could not be set up or the tool could not be started.
    Error(String),
}

impl SmokeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SmokeOutcome::Passed)
    }
}

impl fmt::Display for SmokeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmokeOutcome::Passed => f.write_str("build succeeded"),
            SmokeOutcome::Failed { code: Some(c), .. } => write!(f, "build failed (exit code {c})"),
            SmokeOutcome::Failed { code: None, .. } => f.write_str("build failed (terminated by signal)"),
            SmokeOutcome::TimedOut(d) => write!(f, "build timed out after {}s", d.as_secs()),
            SmokeOutcome::Error(e) => write!(f, "smoke test error: {e}"),
        }
    }
}

/// Parameters for one smoke test run.
#[derive(Debug, Clone)]
pub struct SmokeTest {
    program: String,
    prefix_args: Vec<String>,
    project_dir: PathBuf,
    timeout: Duration,
}

impl SmokeTest {
    pub fn new(program: impl Into<String>, project_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
            project_dir: project_dir.into(),
            timeout,
        }
    }

    pub fn from_config(cfg: &HarnessConfig) -> Self {
        Self::new(cfg.build_tool.clone(), cfg.smoke_dir.clone(), cfg.build_timeout())
            .with_prefix_args(cfg.build_tool_args.clone())
    }

    /// Arguments placed before each subcommand (e.g. `+nightly`).
    pub fn with_prefix_args(mut self, args: Vec<String>) -> Self {
        self.prefix_args = args;
        self
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Runs the smoke test. Failures are reported in the outcome, never raised.
    pub fn run(&self) -> SmokeOutcome {
        match self.try_run() {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!("smoke test aborted: {}", err);
                SmokeOutcome::Error(err.to_string())
            }
        }
    }

    fn try_run(&self) -> Result<SmokeOutcome, ProbeError> {
        remove_existing(&self.project_dir)?;

        let mut new = self.command();
        new.args(["new", "--vcs", "none"]).arg(&self.project_dir);
        let created = self.run_bounded(&mut new)?;
        if !created.is_success() {
            return Ok(created);
        }

        let manifest = self.project_dir.join("Cargo.toml");
        add_dependencies(&manifest)?;

        let mut build = self.command();
        build.arg("build").arg("--manifest-path").arg(&manifest);
        let outcome = self.run_bounded(&mut build)?;
        tracing::info!(project = %self.project_dir.display(), "smoke test: {}", outcome);
        Ok(outcome)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args);
        cmd
    }

    fn run_bounded(&self, cmd: &mut Command) -> Result<SmokeOutcome, ProbeError> {
        let program = cmd.get_program().to_string_lossy().into_owned();
        let mut stderr_file = tempfile::tempfile()
            .map_err(|e| ProbeError::Subprocess(format!("stderr capture: {e}")))?;
        let stderr = stderr_file
            .try_clone()
            .map_err(|e| ProbeError::Subprocess(format!("stderr capture: {e}")))?;

        tracing::debug!(?cmd, "spawning build tool");
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| ProbeError::Subprocess(format!("failed to start {program}: {e}")))?;

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!(program = %program, timeout = ?self.timeout, "build tool timed out");
                return Ok(SmokeOutcome::TimedOut(self.timeout));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProbeError::Subprocess(format!("waiting on {program}: {e}")));
            }
        };

        if status.success() {
            return Ok(SmokeOutcome::Passed);
        }
        let mut captured = Vec::new();
        if stderr_file.seek(SeekFrom::Start(0)).is_ok() {
            let _ = stderr_file.read_to_end(&mut captured);
        }
        let text = String::from_utf8_lossy(&captured);
        Ok(SmokeOutcome::Failed {
            code: status.code(),
            stderr: excerpt(text.trim(), STDERR_LIMIT),
        })
    }
}

fn remove_existing(dir: &Path) -> Result<(), ProbeError> {
    if dir.is_dir() {
        tracing::debug!(path = %dir.display(), "removing previous smoke project");
        fs::remove_dir_all(dir).map_err(|e| ProbeError::fs(dir, e))?;
    } else if dir.exists() {
        fs::remove_file(dir).map_err(|e| ProbeError::fs(dir, e))?;
    }
    Ok(())
}

/// Adds [`SMOKE_DEPENDENCIES`] to the manifest's `[dependencies]` table.
fn add_dependencies(manifest: &Path) -> Result<(), ProbeError> {
    let text = fs::read_to_string(manifest).map_err(|e| ProbeError::fs(manifest, e))?;
    let mut doc: toml::Table = text
        .parse()
        .map_err(|e: toml::de::Error| ProbeError::Parse(format!("{}: {e}", manifest.display())))?;

    let deps = doc
        .entry("dependencies")
        .or_insert(toml::Value::Table(toml::Table::new()));
    let toml::Value::Table(deps) = deps else {
        return Err(ProbeError::Parse(format!(
            "{}: [dependencies] is not a table",
            manifest.display()
        )));
    };
    for (name, version) in SMOKE_DEPENDENCIES {
        deps.insert(name.to_string(), toml::Value::String(version.to_string()));
    }

    let out = toml::to_string(&doc).map_err(|e| ProbeError::Parse(e.to_string()))?;
    fs::write(manifest, out).map_err(|e| ProbeError::fs(manifest, e))
}
