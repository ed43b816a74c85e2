//! Quota appliers shipped with the daemon.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use shaper_controller::{ApplyError, ApplyFuture, QuotaApplier};
use shaper_core::{CallContext, TargetAllocation};

use crate::config::{ApplierKind, ApplierSection};

/// Default CFS period, in microseconds.
pub const DEFAULT_PERIOD_US: u64 = 100_000;

/// Smallest quota the kernel accepts, in microseconds.
pub const MIN_QUOTA_US: u64 = 1_000;

/// Render a `cpu.max` line for `cores` over `period_us`.
pub fn cpu_max_line(cores: f64, period_us: u64) -> String {
    let quota = (cores * period_us as f64).round().max(MIN_QUOTA_US as f64) as u64;
    format!("{quota} {period_us}\n")
}

/// Writes the target to a cgroup v2 `cpu.max` file.
#[derive(Debug, Clone)]
pub struct CgroupApplier {
    cpu_max: PathBuf,
    period_us: u64,
}

impl CgroupApplier {
    pub fn new(cgroup_dir: &Path, period_us: u64) -> Self {
        Self {
            cpu_max: cgroup_dir.join("cpu.max"),
            period_us,
        }
    }

    pub fn path(&self) -> &Path {
        &self.cpu_max
    }
}

impl QuotaApplier for CgroupApplier {
    fn apply<'a>(&'a self, _ctx: &'a CallContext, target: &'a TargetAllocation) -> ApplyFuture<'a> {
        Box::pin(async move {
            let line = cpu_max_line(target.cores, self.period_us);
            tokio::fs::write(&self.cpu_max, &line)
                .await
                .map_err(|source| ApplyError::Io {
                    path: self.cpu_max.display().to_string(),
                    source,
                })?;
            debug!(path = %self.cpu_max.display(), line = line.trim_end(), "cpu.max written");
            Ok(())
        })
    }
}

/// Dry-run applier: logs what would be applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogApplier;

impl QuotaApplier for LogApplier {
    fn apply<'a>(&'a self, _ctx: &'a CallContext, target: &'a TargetAllocation) -> ApplyFuture<'a> {
        info!(
            cores = target.cores,
            millicores = target.millicores(),
            clamped = ?target.clamped,
            reissued = target.reissued,
            "target allocation (dry run)"
        );
        Box::pin(async { Ok(()) })
    }
}

/// Build the applier the config asks for.
pub fn build_applier(section: &ApplierSection) -> anyhow::Result<Box<dyn QuotaApplier>> {
    match section.kind {
        ApplierKind::Log => Ok(Box::new(LogApplier)),
        ApplierKind::Cgroup => {
            let dir = section
                .cgroup_dir
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("applier.cgroup_dir is required for cgroup applier"))?;
            Ok(Box::new(CgroupApplier::new(dir, section.period_us)))
        }
    }
}
