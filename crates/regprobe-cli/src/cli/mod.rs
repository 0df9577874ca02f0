//! CLI for the regprobe registry proxy verifier.

use anyhow::{Context, Result};
use clap::Parser;
use regprobe_core::config::{self, HarnessConfig};
use regprobe_core::harness::{Harness, RunPlan};
use regprobe_core::report::Reporter;
use regprobe_core::routing::{OriginRoute, VersionSpec};
use std::path::PathBuf;

/// Verify that a local crate-registry proxy serves the same crates as the origin.
#[derive(Debug, Parser)]
#[command(name = "regprobe", disable_version_flag = true)]
#[command(about = "regprobe: crate registry proxy verifier", long_about = None)]
pub struct Cli {
    /// Crate to fetch.
    #[arg(long = "crate", default_value = "rand", value_name = "NAME")]
    pub crate_name: String,

    /// Exact version to fetch (default: latest published).
    #[arg(long, value_name = "VERSION")]
    pub version: Option<String>,

    /// HTTP proxy for the origin download (overrides config).
    #[arg(long, value_name = "URL")]
    pub http_proxy: Option<String>,

    /// SOCKS5 proxy for the origin download (overrides config).
    #[arg(long, value_name = "URL")]
    pub socks5_proxy: Option<String>,

    /// How the origin is reached: direct, http-proxy or socks5-proxy.
    #[arg(long, default_value = "direct", value_name = "ROUTE")]
    pub via: OriginRoute,

    /// Local proxy endpoint (overrides config).
    #[arg(long, value_name = "URL")]
    pub local_endpoint: Option<String>,

    /// Point the package manager's default source at the local endpoint first.
    #[arg(long)]
    pub configure_cargo: bool,

    /// Build a throwaway project through the package manager at the end.
    #[arg(long)]
    pub test_cargo: bool,

    /// Skip the metadata lookup through the local endpoint.
    #[arg(long)]
    pub no_metadata: bool,

    /// Load configuration from this file instead of the per-user one.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Parses arguments, runs the harness and returns whether every executed step passed.
    pub fn run_from_args() -> Result<bool> {
        Cli::parse().run()
    }

    pub fn run(self) -> Result<bool> {
        let mut cfg = match &self.config {
            Some(path) => config::load_from(path)?,
            None => config::load_or_init()?,
        };
        self.apply_overrides(&mut cfg);
        cfg.validate().context("invalid configuration")?;
        tracing::debug!("effective config: {:?}", cfg);

        let plan = self.plan();
        let stdout = std::io::stdout();
        let mut reporter = Reporter::new(stdout.lock());
        let summary = Harness::new(cfg).run(&plan, &mut reporter);
        Ok(summary.all_passed())
    }

    fn apply_overrides(&self, cfg: &mut HarnessConfig) {
        if let Some(p) = &self.http_proxy {
            cfg.http_proxy = p.clone();
        }
        if let Some(p) = &self.socks5_proxy {
            cfg.socks5_proxy = p.clone();
        }
        if let Some(e) = &self.local_endpoint {
            cfg.local_endpoint = e.clone();
        }
    }

    fn plan(&self) -> RunPlan {
        RunPlan {
            crate_name: self.crate_name.trim().to_string(),
            version: VersionSpec::parse(self.version.as_deref()),
            origin_route: self.via,
            configure_client: self.configure_cargo,
            check_metadata: !self.no_metadata,
            build_smoke: self.test_cargo,
        }
    }
}

#[cfg(test)]
mod tests;
