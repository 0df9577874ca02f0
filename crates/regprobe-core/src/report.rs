//! Human-readable console report.
//!
//! Probes only log; everything the user reads on the console goes through
//! [`Reporter`]. Write errors are ignored (a closed stdout must not abort a run).

use std::io::Write;
use std::path::Path;

use crate::cache::{CacheCheck, CacheVerdict};
use crate::config::HarnessConfig;
use crate::download::ProbeResult;
use crate::error::ProbeError;
use crate::harness::{RunPlan, RunSummary, StepStatus};
use crate::metadata::MetadataResult;
use crate::routing::Routing;
use crate::smoke::SmokeOutcome;

const RULE_WIDTH: usize = 50;

pub struct Reporter<W: Write> {
    out: W,
    section: usize,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out, section: 0 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, line: &str) {
        let _ = writeln!(self.out, "{line}");
    }

    pub fn header(&mut self, plan: &RunPlan, cfg: &HarnessConfig) {
        self.emit("=== Crate registry proxy verification ===");
        self.emit(&format!("crate:       {} ({})", plan.crate_name, plan.version));
        self.emit(&format!(
            "origin:      {}",
            cfg.origin_routing(plan.origin_route)
        ));
        self.emit(&format!("local proxy: {}", cfg.local_endpoint));
    }

    /// Numbered section heading; `routing` is appended when the step talks to a server.
    pub fn section(&mut self, title: &str, routing: Option<&Routing>) {
        self.section += 1;
        self.emit("");
        match routing {
            Some(r) => self.emit(&format!("{}. {} ({})", self.section, title, r)),
            None => self.emit(&format!("{}. {}", self.section, title)),
        }
        self.emit(&"-".repeat(RULE_WIDTH));
    }

    pub fn configure(&mut self, outcome: &Result<std::path::PathBuf, ProbeError>) {
        match outcome {
            Ok(path) => self.emit(&format!("✅ client configuration written: {}", path.display())),
            Err(e) => self.emit(&format!("❌ could not write client configuration: {e}")),
        }
    }

    pub fn download(&mut self, r: &ProbeResult) {
        if r.success {
            self.emit("✅ download succeeded");
        } else {
            self.emit("❌ download failed");
        }
        if let Some(v) = &r.version {
            self.emit(&format!("   version:  {v}"));
        }
        if let Some(code) = r.status {
            self.emit(&format!("   status:   {code}"));
        }
        if r.success {
            self.emit(&format!("   size:     {} bytes", r.bytes));
            self.emit(&format!("   time:     {:.2} s", r.elapsed_secs()));
        }
        if let Some(sha) = &r.sha256 {
            self.emit(&format!("   sha256:   {sha}"));
        }
        if let Some(path) = &r.artifact {
            self.emit(&format!("   saved to: {}", path.display()));
        }
        if let Some(err) = &r.error {
            self.emit(&format!("   error:    {err}"));
        }
    }

    pub fn integrity(&mut self, origin: &ProbeResult, proxied: &ProbeResult) {
        if origin.sha256 == proxied.sha256 {
            self.emit("✅ proxied archive is identical to the origin archive");
        } else {
            self.emit("❌ proxied archive differs from the origin archive");
            self.emit(&format!(
                "   origin:  {} bytes, sha256 {}",
                origin.bytes,
                origin.sha256.as_deref().unwrap_or("-")
            ));
            self.emit(&format!(
                "   proxied: {} bytes, sha256 {}",
                proxied.bytes,
                proxied.sha256.as_deref().unwrap_or("-")
            ));
        }
    }

    pub fn cache(&mut self, check: &CacheCheck, cache_root: &Path) {
        let dir = cache_root.join(&check.crate_name);
        if !check.exists {
            self.emit(&format!("❌ crate cache directory missing: {}", dir.display()));
            return;
        }
        self.emit(&format!("✅ crate cache directory exists: {}", dir.display()));
        self.emit(&format!("   cached files: {}", check.file_count));
        for path in &check.sample_files {
            self.emit(&format!("   - {}", path.display()));
        }
        if check.remaining() > 0 {
            self.emit(&format!("   ... and {} more", check.remaining()));
        }
    }

    pub fn verdict(&mut self, verdict: &CacheVerdict) {
        match verdict {
            CacheVerdict::Faster { cold, warm } => self.emit(&format!(
                "✅ cache effective: second fetch faster ({:.2}s vs {:.2}s)",
                warm.as_secs_f64(),
                cold.as_secs_f64()
            )),
            CacheVerdict::Inconclusive { cold, warm } => self.emit(&format!(
                "⚠️  fetch times comparable ({:.2}s vs {:.2}s)",
                warm.as_secs_f64(),
                cold.as_secs_f64()
            )),
        }
    }

    pub fn metadata(&mut self, m: &MetadataResult) {
        if m.success {
            self.emit("✅ metadata fetched");
            if let Some(v) = &m.latest_version {
                self.emit(&format!("   latest version: {v}"));
            }
            if let Some(d) = &m.description {
                self.emit(&format!("   description:    {d}"));
            }
        } else {
            self.emit("❌ metadata lookup failed");
            if let Some(err) = &m.error {
                self.emit(&format!("   error: {err}"));
            }
        }
    }

    pub fn smoke(&mut self, outcome: &SmokeOutcome) {
        let mark = if outcome.is_success() { "✅" } else { "❌" };
        self.emit(&format!("{mark} {outcome}"));
        if let SmokeOutcome::Failed { stderr, .. } = outcome {
            if !stderr.is_empty() {
                self.emit(&format!("   stderr: {stderr}"));
            }
        }
    }

    pub fn skipped(&mut self, title: &str, reason: &str) {
        self.emit(&format!("⏭  {title} skipped: {reason}"));
    }

    pub fn summary(&mut self, summary: &RunSummary) {
        self.emit("");
        self.emit("=== Summary ===");
        let width = summary
            .steps()
            .iter()
            .map(|s| s.name.len())
            .max()
            .unwrap_or(0);
        for step in summary.steps() {
            let tag = match step.status {
                StepStatus::Passed => "PASS",
                StepStatus::Failed => "FAIL",
                StepStatus::Skipped => "SKIP",
                StepStatus::Advisory => "INFO",
            };
            self.emit(&format!(
                "  {tag}  {:<width$}  {}",
                step.name,
                step.detail,
                width = width
            ));
        }
        let failed = summary.failed_count();
        if failed == 0 {
            self.emit("result: all checks passed");
        } else {
            self.emit(&format!("result: {failed} check(s) failed"));
        }
    }
}
