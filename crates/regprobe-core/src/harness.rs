//! The verification sequence.
//!
//! Steps run one after another on the calling thread. A failed step never
//! aborts the run; steps that depend on it are recorded as skipped. Nothing
//! is retried.

use std::io::Write;
use std::path::PathBuf;

use crate::cache::{self, CacheCheck};
use crate::cargo_config;
use crate::config::HarnessConfig;
use crate::download::{self, ProbeResult};
use crate::error::ProbeError;
use crate::metadata::{self, MetadataResult};
use crate::report::Reporter;
use crate::routing::{OriginRoute, Routing, VersionSpec};
use crate::smoke::{SmokeOutcome, SmokeTest};

pub const STEP_CONFIGURE: &str = "configure-client";
pub const STEP_DIRECT: &str = "direct-download";
pub const STEP_LOCAL_COLD: &str = "local-download";
pub const STEP_INTEGRITY: &str = "artifact-integrity";
pub const STEP_CACHE: &str = "local-cache";
pub const STEP_LOCAL_WARM: &str = "local-download-repeat";
pub const STEP_CACHE_TIMING: &str = "cache-timing";
pub const STEP_METADATA: &str = "metadata";
pub const STEP_SMOKE: &str = "build-smoke";

/// What to run, as chosen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub crate_name: String,
    pub version: VersionSpec,
    pub origin_route: OriginRoute,
    pub configure_client: bool,
    pub check_metadata: bool,
    pub build_smoke: bool,
}

impl Default for RunPlan {
    fn default() -> Self {
        Self {
            crate_name: "rand".to_string(),
            version: VersionSpec::Latest,
            origin_route: OriginRoute::Direct,
            configure_client: false,
            check_metadata: true,
            build_smoke: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
    /// Informational only; never counts as a failure.
    Advisory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub name: &'static str,
    pub status: StepStatus,
    pub detail: String,
}

/// Ordered record of every step of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    steps: Vec<StepRecord>,
}

impl RunSummary {
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn failed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .count()
    }

    /// False iff any executed step failed; skipped and advisory steps do not count.
    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }

    fn record(&mut self, name: &'static str, status: StepStatus, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::info!(step = name, ?status, "{}", detail);
        self.steps.push(StepRecord {
            name,
            status,
            detail,
        });
    }

    fn record_download(&mut self, name: &'static str, r: &ProbeResult) {
        if r.success {
            let detail = format!(
                "HTTP 200, {} bytes in {:.2}s",
                r.bytes,
                r.elapsed_secs()
            );
            self.record(name, StepStatus::Passed, detail);
        } else {
            let detail = r.error.clone().unwrap_or_else(|| "download failed".to_string());
            self.record(name, StepStatus::Failed, detail);
        }
    }
}

/// The harness: configuration plus the operations it exposes.
#[derive(Debug, Clone)]
pub struct Harness {
    cfg: HarnessConfig,
    client_config_path: Option<PathBuf>,
}

impl Harness {
    pub fn new(cfg: HarnessConfig) -> Self {
        Self {
            cfg,
            client_config_path: None,
        }
    }

    /// Write the client configuration here instead of the per-user default.
    pub fn with_client_config_path(mut self, path: PathBuf) -> Self {
        self.client_config_path = Some(path);
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.cfg
    }

    pub fn probe_download(
        &self,
        crate_name: &str,
        version: &VersionSpec,
        routing: &Routing,
    ) -> ProbeResult {
        download::probe_download(&self.cfg, crate_name, version, routing)
    }

    pub fn probe_metadata(&self, crate_name: &str, routing: &Routing) -> MetadataResult {
        metadata::probe_metadata(&self.cfg, crate_name, routing)
    }

    pub fn check_local_cache(&self, crate_name: &str) -> CacheCheck {
        cache::check_local_cache(&self.cfg.cache_root, crate_name)
    }

    /// Points the package manager at the local endpoint. Returns false (after
    /// logging) if the file could not be written.
    pub fn configure_local_client(&self) -> bool {
        match self.try_configure_local_client() {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("client configuration failed: {}", e);
                false
            }
        }
    }

    fn try_configure_local_client(&self) -> Result<PathBuf, ProbeError> {
        let path = match &self.client_config_path {
            Some(p) => p.clone(),
            None => cargo_config::default_path()?,
        };
        cargo_config::write_client_config(&path, &self.cfg.local_endpoint)?;
        Ok(path)
    }

    pub fn run_build_smoke_test(&self) -> SmokeOutcome {
        SmokeTest::from_config(&self.cfg).run()
    }

    /// Runs the full sequence, printing progress to `report`.
    pub fn run<W: Write>(&self, plan: &RunPlan, report: &mut Reporter<W>) -> RunSummary {
        let mut summary = RunSummary::default();
        let name = plan.crate_name.as_str();
        report.header(plan, &self.cfg);

        if plan.configure_client {
            report.section("Configure local client", None);
            let outcome = self.try_configure_local_client();
            report.configure(&outcome);
            match outcome {
                Ok(path) => summary.record(
                    STEP_CONFIGURE,
                    StepStatus::Passed,
                    path.display().to_string(),
                ),
                Err(e) => summary.record(STEP_CONFIGURE, StepStatus::Failed, e.to_string()),
            }
        }

        let origin = self.cfg.origin_routing(plan.origin_route);
        report.section("Download from origin", Some(&origin));
        let direct = self.probe_download(name, &plan.version, &origin);
        report.download(&direct);
        summary.record_download(STEP_DIRECT, &direct);

        if direct.success {
            self.run_local_steps(plan, &direct, report, &mut summary);
        } else {
            let reason = "origin download failed";
            for step in [
                STEP_LOCAL_COLD,
                STEP_INTEGRITY,
                STEP_CACHE,
                STEP_LOCAL_WARM,
                STEP_CACHE_TIMING,
            ] {
                summary.record(step, StepStatus::Skipped, reason);
            }
            report.skipped("local proxy checks", reason);
            if plan.check_metadata {
                summary.record(STEP_METADATA, StepStatus::Skipped, reason);
            }
        }

        if plan.build_smoke {
            report.section("Build smoke test", None);
            let outcome = self.run_build_smoke_test();
            report.smoke(&outcome);
            let status = if outcome.is_success() {
                StepStatus::Passed
            } else {
                StepStatus::Failed
            };
            summary.record(STEP_SMOKE, status, outcome.to_string());
        }

        report.summary(&summary);
        summary
    }

    fn run_local_steps<W: Write>(
        &self,
        plan: &RunPlan,
        direct: &ProbeResult,
        report: &mut Reporter<W>,
        summary: &mut RunSummary,
    ) {
        let name = plan.crate_name.as_str();
        let local = self.cfg.local_routing();
        // Same version as the origin download, so archives and timings compare.
        let pinned = direct
            .version
            .clone()
            .map(VersionSpec::Exact)
            .unwrap_or_else(|| plan.version.clone());

        report.section("Download through local proxy", Some(&local));
        let cold = self.probe_download(name, &pinned, &local);
        report.download(&cold);
        summary.record_download(STEP_LOCAL_COLD, &cold);

        if cold.success {
            report.section("Compare archives", None);
            report.integrity(direct, &cold);
            if direct.sha256 == cold.sha256 {
                summary.record(STEP_INTEGRITY, StepStatus::Passed, "identical to origin");
            } else {
                summary.record(
                    STEP_INTEGRITY,
                    StepStatus::Failed,
                    format!(
                        "digest mismatch ({} vs {} bytes)",
                        cold.bytes, direct.bytes
                    ),
                );
            }

            report.section("Check local cache", None);
            let check = self.check_local_cache(name);
            report.cache(&check, &self.cfg.cache_root);
            let detail = if check.exists {
                format!("{} cached file(s)", check.file_count)
            } else {
                "no cache directory".to_string()
            };
            summary.record(STEP_CACHE, StepStatus::Advisory, detail);

            report.section("Repeat download through local proxy", Some(&local));
            let warm = self.probe_download(name, &pinned, &local);
            report.download(&warm);
            summary.record_download(STEP_LOCAL_WARM, &warm);

            if warm.success {
                let verdict = cache::compare_cache_timing(cold.elapsed, warm.elapsed);
                report.verdict(&verdict);
                let detail = match verdict {
                    cache::CacheVerdict::Faster { .. } => "repeat fetch faster",
                    cache::CacheVerdict::Inconclusive { .. } => "fetch times comparable",
                };
                summary.record(STEP_CACHE_TIMING, StepStatus::Advisory, detail);
            } else {
                summary.record(STEP_CACHE_TIMING, StepStatus::Skipped, "repeat download failed");
            }
        } else {
            let reason = "local proxy download failed";
            for step in [STEP_INTEGRITY, STEP_CACHE, STEP_LOCAL_WARM, STEP_CACHE_TIMING] {
                summary.record(step, StepStatus::Skipped, reason);
            }
            report.skipped("cache checks", reason);
        }

        if plan.check_metadata {
            report.section("Fetch metadata through local proxy", Some(&local));
            let meta = self.probe_metadata(name, &local);
            report.metadata(&meta);
            if meta.success {
                let detail = format!(
                    "latest {}",
                    meta.latest_version.as_deref().unwrap_or("-")
                );
                summary.record(STEP_METADATA, StepStatus::Passed, detail);
            } else {
                let detail = meta.error.unwrap_or_else(|| "metadata lookup failed".to_string());
                summary.record(STEP_METADATA, StepStatus::Failed, detail);
            }
        }
    }
}
