//! The controller: drives the sample → estimate → apply loop.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use shaper_core::{CallContext, ConfigError, ResourceId, TargetAllocation, UtilizationSample};
use shaper_estimator::Estimator;
use shaper_metrics::{MetricsError, MetricsSource};

use crate::applier::{ApplyError, QuotaApplier};
use crate::status::{ControllerHandle, ControllerStatus, PipelineError, StatusSnapshot};
use crate::tracker::{FailureTracker, TickOutcome};

/// Loop cadence and failure policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Time between tick starts.
    pub interval: Duration,
    /// Bound on one tick's metrics query plus apply. Must be shorter than
    /// `interval` so a slow backend cannot stack ticks.
    pub tick_timeout: Duration,
    /// Consecutive failed ticks before `Degraded`.
    pub degraded_threshold: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            tick_timeout: Duration::from_secs(10),
            degraded_threshold: 3,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::new("interval", "must be positive"));
        }
        if self.tick_timeout.is_zero() || self.tick_timeout >= self.interval {
            return Err(ConfigError::new(
                "tick_timeout",
                format!("must be positive and shorter than interval ({:?})", self.interval),
            ));
        }
        if self.degraded_threshold == 0 {
            return Err(ConfigError::new("degraded_threshold", "must be at least 1"));
        }
        Ok(())
    }
}

/// Owns the sampling loop for one resource.
pub struct Controller<S, A> {
    resource: ResourceId,
    source: S,
    estimator: Estimator,
    applier: A,
    config: ControllerConfig,
    tracker: FailureTracker,
    handle: ControllerHandle,
    last_applied: Option<TargetAllocation>,
}

impl<S: MetricsSource, A: QuotaApplier> Controller<S, A> {
    pub fn new(
        resource: ResourceId,
        source: S,
        estimator: Estimator,
        applier: A,
        config: ControllerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            resource,
            source,
            estimator,
            applier,
            tracker: FailureTracker::new(config.degraded_threshold),
            config,
            handle: ControllerHandle::default(),
            last_applied: None,
        })
    }

    /// Read-only handle for status readers.
    pub fn handle(&self) -> ControllerHandle {
        self.handle.clone()
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    /// Run one full tick under `ctx` and publish its outcome.
    pub async fn tick(&mut self, ctx: &CallContext) -> StatusSnapshot {
        let tick_ctx = ctx.child_with_timeout(self.config.tick_timeout);

        let (last_error, last_estimator_error) = match self.sample(&tick_ctx).await {
            Err(e) => (Some(e), None),
            Ok(sample) => (None, self.estimate_and_apply(&tick_ctx, sample).await.err()),
        };

        self.record(last_error, last_estimator_error)
    }

    async fn sample(&self, ctx: &CallContext) -> Result<UtilizationSample, MetricsError> {
        let sample = ctx
            .run(self.source.query_p95_cpu(ctx, &self.resource))
            .await??;
        debug!(resource = %self.resource, %sample, "sampled p95 cpu");
        Ok(sample)
    }

    async fn estimate_and_apply(
        &mut self,
        ctx: &CallContext,
        sample: UtilizationSample,
    ) -> Result<TargetAllocation, PipelineError> {
        let target = self.estimator.estimate(sample)?;

        ctx.run(self.applier.apply(ctx, &target))
            .await
            .map_err(ApplyError::from)??;

        self.estimator.commit(&target);
        self.last_applied = Some(target);
        debug!(
            resource = %self.resource,
            cores = target.cores,
            smoothed = target.smoothed,
            clamped = ?target.clamped,
            reissued = target.reissued,
            "allocation applied"
        );
        Ok(target)
    }

    fn record(
        &mut self,
        last_error: Option<MetricsError>,
        last_estimator_error: Option<PipelineError>,
    ) -> StatusSnapshot {
        let outcome = match (&last_error, &last_estimator_error) {
            (Some(e), _) if e.is_no_data() => TickOutcome::NoData,
            (None, None) => TickOutcome::Clean,
            _ => TickOutcome::Failed,
        };

        match &last_error {
            Some(e) if e.is_no_data() => debug!(resource = %self.resource, "no metrics data yet"),
            Some(e) => warn!(resource = %self.resource, error = %e, "metrics query failed"),
            None => {}
        }
        if let Some(e) = &last_estimator_error {
            warn!(resource = %self.resource, error = %e, "allocation pipeline failed");
        }

        let state = self.tracker.record(outcome);
        let snapshot = StatusSnapshot {
            state,
            last_error: last_error.map(Arc::new),
            last_estimator_error: last_estimator_error.map(Arc::new),
            last_applied: self.last_applied,
            consecutive_failures: self.tracker.consecutive_failures(),
        };
        self.handle.publish(snapshot.clone());
        snapshot
    }

    /// Run ticks on the configured cadence until `true` is sent on
    /// `shutdown`.
    ///
    /// The first tick runs immediately. Sending `false` or dropping the
    /// sender does not stop the loop. On return the published state is
    /// `Stopped`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let ctx = CallContext::with_shutdown(shutdown.clone());
        let stopped = async move {
            // A dropped sender can never stop us.
            let closed = shutdown.wait_for(|stop| *stop).await.is_err();
            if closed {
                pending::<()>().await;
            }
        };
        tokio::pin!(stopped);
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            resource = %self.resource,
            interval_ms = self.config.interval.as_millis() as u64,
            tick_timeout_ms = self.config.tick_timeout.as_millis() as u64,
            degraded_threshold = self.config.degraded_threshold,
            "controller started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if ctx.is_cancelled() {
                        break;
                    }
                    let snapshot = self.tick(&ctx).await;
                    debug!(
                        state = %snapshot.state,
                        failures = snapshot.consecutive_failures,
                        "tick complete"
                    );
                }
                _ = &mut stopped => {
                    break;
                }
            }
        }

        self.stop();
    }

    fn stop(&mut self) {
        let state = self.tracker.stop();
        let mut snapshot = self.handle.snapshot();
        snapshot.state = state;
        self.handle.publish(snapshot);
        info!(resource = %self.resource, "controller stopped");
    }
}
