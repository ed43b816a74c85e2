//! shaperd.toml configuration.
//!
//! Every field has a default, so an empty file is a valid config. Only
//! `controller.resource_id` must be supplied, here or on the command line.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use serde::{Deserialize, Serialize};

use shaper_controller::ControllerConfig;
use shaper_core::parse_duration;
use shaper_estimator::EstimatorConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShaperConfig {
    pub controller: ControllerSection,
    pub estimator: EstimatorConfig,
    pub metrics: MetricsSection,
    pub applier: ApplierSection,
    pub status: StatusSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerSection {
    /// Instance whose CPU is governed.
    pub resource_id: String,
    pub interval: String,
    pub tick_timeout: String,
    pub degraded_threshold: u32,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            resource_id: String::new(),
            interval: "30s".to_string(),
            tick_timeout: "10s".to_string(),
            degraded_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsSection {
    /// HTTP JSON backend, e.g. `http://127.0.0.1:9100/p95`. Empty leaves
    /// the source uninitialized and every tick reports it.
    pub endpoint: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplierKind {
    /// Log the target only.
    #[default]
    Log,
    /// Write cgroup v2 `cpu.max`.
    Cgroup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApplierSection {
    pub kind: ApplierKind,
    /// Cgroup directory holding `cpu.max`. Required for `kind = "cgroup"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cgroup_dir: Option<PathBuf>,
    /// CFS period in microseconds.
    pub period_us: u64,
}

impl Default for ApplierSection {
    fn default() -> Self {
        Self {
            kind: ApplierKind::Log,
            cgroup_dir: None,
            period_us: crate::applier::DEFAULT_PERIOD_US,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatusSection {
    pub listen: String,
}

impl Default for StatusSection {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:9470".to_string(),
        }
    }
}

impl ShaperConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        content
            .parse()
            .with_context(|| format!("parse config {}", path.display()))
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loop settings with durations parsed and checked.
    pub fn controller_config(&self) -> anyhow::Result<ControllerConfig> {
        let c = &self.controller;
        let config = ControllerConfig {
            interval: duration_field("controller.interval", &c.interval)?,
            tick_timeout: duration_field("controller.tick_timeout", &c.tick_timeout)?,
            degraded_threshold: c.degraded_threshold,
        };
        config.validate().context("[controller]")?;
        Ok(config)
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        self.status
            .listen
            .parse()
            .with_context(|| format!("status.listen: invalid address {:?}", self.status.listen))
    }

    /// Check everything `run` will need, without side effects.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.controller.resource_id.trim().is_empty() {
            bail!("controller.resource_id is required (or pass --resource-id)");
        }
        self.controller_config()?;
        self.estimator.validate().context("[estimator]")?;
        self.listen_addr()?;
        if self.applier.kind == ApplierKind::Cgroup && self.applier.cgroup_dir.is_none() {
            bail!("applier.cgroup_dir is required when applier.kind = \"cgroup\"");
        }
        if self.applier.period_us < crate::applier::MIN_QUOTA_US {
            bail!(
                "applier.period_us must be at least {}",
                crate::applier::MIN_QUOTA_US
            );
        }
        Ok(())
    }
}

impl std::str::FromStr for ShaperConfig {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

fn duration_field(field: &str, raw: &str) -> anyhow::Result<Duration> {
    parse_duration(raw).ok_or_else(|| anyhow!("{field}: invalid duration {raw:?}"))
}
